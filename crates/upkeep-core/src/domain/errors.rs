//! エラー型
//!
//! # 二層構造
//! - [`BatchError`]: バッチ単位の失敗。Runner が吸収する
//! - [`RunnerError`]: 呼び出し元に返る唯一のエラー

use thiserror::Error;

use super::key::UpkeepKey;
use crate::pool::PoolError;
use crate::ports::RegistryError;

/// 1 バッチ分の registry 呼び出しが失敗した
///
/// 診断用にバッチのキーを保持する。
#[derive(Debug, Clone, Error)]
#[error("{source}: failed to check upkeep keys: {}", fmt_keys(.keys))]
pub struct BatchError {
    pub keys: Vec<UpkeepKey>,
    #[source]
    pub source: RegistryError,
}

impl BatchError {
    pub fn new(keys: Vec<UpkeepKey>, source: RegistryError) -> Self {
        Self { keys, source }
    }
}

fn fmt_keys(keys: &[UpkeepKey]) -> String {
    let joined: Vec<&str> = keys.iter().map(UpkeepKey::as_str).collect();
    format!("[{}]", joined.join(" "))
}

/// チェック呼び出しの失敗
#[derive(Debug, Error)]
pub enum RunnerError {
    /// 投入した全バッチが失敗した。最後のバッチエラーのメッセージを包む
    #[error("too many errors in parallel worker process: last error: {0}")]
    TooManyErrors(String),

    #[error("check cancelled")]
    Cancelled,

    #[error("worker pool: {0}")]
    Pool(#[from] PoolError),
}
