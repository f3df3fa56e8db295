//! Upkeep チェックの結果
//!
//! エンジン自身は中身を解釈せず、[`Encoder`](crate::ports::Encoder) に渡すだけ。

use serde::{Deserialize, Serialize};

use super::key::{BlockKey, UpkeepKey};

/// 実行不可の理由コード（`0` は失敗なし、それ以外は registry 依存）
pub type FailureReason = u8;

/// 1 件のチェック結果
///
/// # シリアライズ形式
/// `{"state": "ELIGIBLE", ...}` / `{"state": "NOT_ELIGIBLE", ...}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckOutcome {
    /// 条件成立。perform 時に `perform_data` を送る
    Eligible {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        perform_data: Vec<u8>,
        gas_used: u64,
    },

    /// 条件不成立（またはオンチェーンでのチェック失敗）
    NotEligible { failure_reason: FailureReason },
}

/// [`UpkeepKey`] 1 件分の結果
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpkeepResult {
    pub key: UpkeepKey,

    #[serde(flatten)]
    pub outcome: CheckOutcome,

    /// 評価したブロック
    pub check_block: BlockKey,

    /// perform 時のガス上限
    #[serde(default)]
    pub execute_gas: u32,
}

impl UpkeepResult {
    pub fn eligible(key: UpkeepKey, check_block: BlockKey, perform_data: Vec<u8>) -> Self {
        Self {
            key,
            outcome: CheckOutcome::Eligible {
                perform_data,
                gas_used: 0,
            },
            check_block,
            execute_gas: 0,
        }
    }

    pub fn not_eligible(key: UpkeepKey, check_block: BlockKey, reason: FailureReason) -> Self {
        Self {
            key,
            outcome: CheckOutcome::NotEligible {
                failure_reason: reason,
            },
            check_block,
            execute_gas: 0,
        }
    }

    pub fn with_execute_gas(mut self, gas: u32) -> Self {
        self.execute_gas = gas;
        self
    }

    pub fn with_gas_used(mut self, gas: u64) -> Self {
        if let CheckOutcome::Eligible { gas_used, .. } = &mut self.outcome {
            *gas_used = gas;
        }
        self
    }

    pub fn is_eligible(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Eligible { .. })
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self.outcome {
            CheckOutcome::Eligible { .. } => None,
            CheckOutcome::NotEligible { failure_reason } => Some(failure_reason),
        }
    }
}
