//! KeyEncoder - `block|id` キー用の Encoder

use crate::domain::{BlockKey, KEY_SEPARATOR, UpkeepId, UpkeepKey, UpkeepResult};
use crate::ports::{Encoder, EncoderError};

/// `block|id` 形式のキーを解釈し、eligible は結果からそのまま読む
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyEncoder;

impl Encoder for KeyEncoder {
    fn eligible(&self, result: &UpkeepResult) -> Result<bool, EncoderError> {
        // 分解できないキーの結果は報告もできない
        self.split_upkeep_key(&result.key)
            .map_err(|err| EncoderError::Undecodable {
                key: result.key.clone(),
                reason: err.to_string(),
            })?;
        Ok(result.is_eligible())
    }

    fn detail(&self, result: &UpkeepResult) -> Result<(UpkeepKey, u32), EncoderError> {
        let (block, id) = self.split_upkeep_key(&result.key)?;
        Ok((UpkeepKey::from_parts(&block, &id), result.execute_gas))
    }

    fn split_upkeep_key(&self, key: &UpkeepKey) -> Result<(BlockKey, UpkeepId), EncoderError> {
        match key.as_str().split_once(KEY_SEPARATOR) {
            Some((block, id)) if !block.is_empty() && !id.is_empty() => {
                Ok((BlockKey::new(block), UpkeepId::new(id)))
            }
            _ => Err(EncoderError::MalformedKey(key.to_string())),
        }
    }
}
