//! SimulatedRegistry - 開発用の Registry
//!
//! # 学習ポイント
//! - `select!` でレイテンシ中のキャンセルを監視
//! - parking_lot の RwLock で失敗注入を管理
//!
//! eligible は upkeep id から決まるので、同じキーなら何度実行しても同じ答えになる。

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::domain::{BlockKey, KEY_SEPARATOR, UpkeepKey, UpkeepResult};
use crate::ports::{Registry, RegistryError};

/// 実行不可と判定した upkeep の理由コード
pub const SIMULATED_FAILURE_REASON: u8 = 1;

const DEFAULT_EXECUTE_GAS: u32 = 5_000_000;

/// 任意の遅延の後、メモリ上で答える Registry
///
/// # 判定
/// - 数値 id が `eligible_every` の倍数なら eligible（数値でない id は常に不可）
/// - [`fail_keys`](Self::fail_keys) で登録したキーを含むバッチは丸ごと失敗
pub struct SimulatedRegistry {
    latency: Duration,
    eligible_every: u64,
    failing: RwLock<HashSet<UpkeepKey>>,
    calls: AtomicUsize,
}

impl SimulatedRegistry {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            eligible_every: 3,
            failing: RwLock::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// 全呼び出しに掛ける遅延
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_eligible_every(mut self, every: u64) -> Self {
        self.eligible_every = every.max(1);
        self
    }

    /// `keys` のどれかを含むバッチを失敗させる
    pub fn fail_keys<I>(&self, keys: I)
    where
        I: IntoIterator<Item = UpkeepKey>,
    {
        self.failing.write().extend(keys);
    }

    pub fn clear_failures(&self) {
        self.failing.write().clear();
    }

    /// これまでの `check_upkeep` 呼び出し回数（失敗・キャンセルを含む）
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn evaluate(&self, key: &UpkeepKey) -> UpkeepResult {
        let (block, id) = key
            .as_str()
            .split_once(KEY_SEPARATOR)
            .unwrap_or(("0", key.as_str()));
        let block = BlockKey::new(block);

        match id.parse::<u64>() {
            Ok(n) if n % self.eligible_every == 0 => {
                UpkeepResult::eligible(key.clone(), block, id.as_bytes().to_vec())
                    .with_execute_gas(DEFAULT_EXECUTE_GAS)
                    .with_gas_used(21_000 + n)
            }
            _ => UpkeepResult::not_eligible(key.clone(), block, SIMULATED_FAILURE_REASON),
        }
    }
}

impl Default for SimulatedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Registry for SimulatedRegistry {
    async fn check_upkeep(
        &self,
        cancel: &CancellationToken,
        _mercury_enabled: bool,
        keys: &[UpkeepKey],
    ) -> Result<Vec<UpkeepResult>, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Err(RegistryError::Cancelled),
                _ = tokio::time::sleep(self.latency) => {}
            }
        } else if cancel.is_cancelled() {
            return Err(RegistryError::Cancelled);
        }

        {
            let failing = self.failing.read();
            if let Some(bad) = keys.iter().find(|k| failing.contains(*k)) {
                return Err(RegistryError::Rpc(format!("simulated failure at {bad}")));
            }
        }

        Ok(keys.iter().map(|k| self.evaluate(k)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(ids: std::ops::Range<u64>) -> Vec<UpkeepKey> {
        ids.map(|i| UpkeepKey::new(format!("7|{i}"))).collect()
    }

    #[tokio::test]
    async fn one_result_per_key_in_order() {
        let reg = SimulatedRegistry::new();
        let input = keys(0..6);
        let out = reg
            .check_upkeep(&CancellationToken::new(), false, &input)
            .await
            .unwrap();

        assert_eq!(out.iter().map(|r| r.key.clone()).collect::<Vec<_>>(), input);
        let eligible: Vec<bool> = out.iter().map(UpkeepResult::is_eligible).collect();
        assert_eq!(eligible, vec![true, false, false, true, false, false]);
        assert_eq!(out[0].check_block.as_str(), "7");
        assert_eq!(out[1].failure_reason(), Some(SIMULATED_FAILURE_REASON));
        assert_eq!(reg.calls(), 1);
    }

    #[tokio::test]
    async fn injected_failure_fails_whole_batch() {
        let reg = SimulatedRegistry::new();
        reg.fail_keys([UpkeepKey::new("7|2")]);

        let err = reg
            .check_upkeep(&CancellationToken::new(), false, &keys(0..4))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Rpc(_)));

        // キーを含まないバッチは影響なし
        assert!(reg
            .check_upkeep(&CancellationToken::new(), false, &keys(3..6))
            .await
            .is_ok());

        reg.clear_failures();
        assert!(reg
            .check_upkeep(&CancellationToken::new(), false, &keys(0..4))
            .await
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_latency() {
        let reg = SimulatedRegistry::new().with_latency(Duration::from_secs(60));
        let cancel = CancellationToken::new();

        let c = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            c.cancel();
        });

        let err = reg.check_upkeep(&cancel, false, &keys(0..1)).await.unwrap_err();
        assert_eq!(err, RegistryError::Cancelled);
    }

    #[tokio::test]
    async fn non_numeric_ids_are_not_eligible() {
        let reg = SimulatedRegistry::new().with_eligible_every(1);
        let out = reg
            .check_upkeep(
                &CancellationToken::new(),
                true,
                &[UpkeepKey::new("1|abc"), UpkeepKey::new("1|4")],
            )
            .await
            .unwrap();
        assert!(!out[0].is_eligible());
        assert!(out[1].is_eligible());
    }
}
