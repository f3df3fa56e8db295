//! Encoder port - 不透明な結果とキーの解釈

use thiserror::Error;

use crate::domain::{BlockKey, UpkeepId, UpkeepKey, UpkeepResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncoderError {
    #[error("malformed upkeep key: {0}")]
    MalformedKey(String),

    #[error("undecodable upkeep result for key {key}: {reason}")]
    Undecodable { key: UpkeepKey, reason: String },
}

/// Encoder は結果を分類し、キーを分解する
///
/// 実装は純粋関数であること。ワーカーから並行に呼ばれる。
pub trait Encoder: Send + Sync {
    /// perform すべきか
    fn eligible(&self, result: &UpkeepResult) -> Result<bool, EncoderError>;

    /// 正規化したキーとガス上限
    fn detail(&self, result: &UpkeepResult) -> Result<(UpkeepKey, u32), EncoderError>;

    fn split_upkeep_key(&self, key: &UpkeepKey) -> Result<(BlockKey, UpkeepId), EncoderError>;
}
