//! Registry port - バッチ単位のリモートチェック
//!
//! RPC プロトコルと 1 回の呼び出し内のリトライは registry 側の責務。
//! エンジンは `check_upkeep` を不透明な往復 1 回として扱う。

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::{UpkeepKey, UpkeepResult};

/// registry 呼び出しの失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("rpc call failed: {0}")]
    Rpc(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),

    #[error("registry call cancelled")]
    Cancelled,

    #[error("registry call panicked: {0}")]
    Panicked(String),
}

/// Registry は upkeep のバッチをチェーンに対して評価する
///
/// # 契約
/// - 評価できたキーごとに 1 件、キー順で返す
/// - `cancel` を監視し、発火したら速やかに [`RegistryError::Cancelled`] を返す
/// - `mercury_enabled` はそのまま渡す
#[async_trait]
pub trait Registry: Send + Sync {
    async fn check_upkeep(
        &self,
        cancel: &CancellationToken,
        mercury_enabled: bool,
        keys: &[UpkeepKey],
    ) -> Result<Vec<UpkeepResult>, RegistryError>;
}
