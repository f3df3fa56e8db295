//! RunnerConfig - Runner の設定

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_QUEUE_LENGTH: usize = 1000;
/// 20 分。
pub const DEFAULT_CACHE_EXPIRE_SECS: u64 = 20 * 60;
pub const DEFAULT_CACHE_CLEAN_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_BATCH_LIMIT: usize = 10;
/// 30 日。
pub const MAX_CACHE_EXPIRE_SECS: u64 = 30 * 24 * 60 * 60;
/// 1 日。
pub const MAX_CACHE_CLEAN_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("workers must be greater than zero")]
    ZeroWorkers,

    #[error("queue_length must be greater than zero")]
    ZeroQueueLength,

    #[error("batch_limit must be greater than zero")]
    ZeroBatchLimit,

    #[error("cache_expire_secs must be greater than zero")]
    ZeroCacheExpire,

    #[error("cache_clean_interval_secs must be greater than zero")]
    ZeroCleanInterval,

    #[error("cache_expire_secs must be at most {max}, got {got}")]
    CacheExpireTooLarge { got: u64, max: u64 },

    #[error("cache_clean_interval_secs must be at most {max}, got {got}")]
    CleanIntervalTooLarge { got: u64, max: u64 },
}

/// [`Runner`](super::Runner) の固定パラメータ（構築時に一度だけ設定）
///
/// 設定ファイルで省略したフィールドは上のデフォルト値になる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// 同時実行数
    pub workers: usize,

    /// ワーカー前段のジョブキュー容量
    pub queue_length: usize,

    /// キャッシュした結果の TTL
    pub cache_expire_secs: u64,

    pub cache_clean_interval_secs: u64,

    /// registry 呼び出し 1 回あたりの最大キー数
    pub batch_limit: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_length: DEFAULT_QUEUE_LENGTH,
            cache_expire_secs: DEFAULT_CACHE_EXPIRE_SECS,
            cache_clean_interval_secs: DEFAULT_CACHE_CLEAN_INTERVAL_SECS,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

impl RunnerConfig {
    pub fn cache_expire(&self) -> Duration {
        Duration::from_secs(self.cache_expire_secs)
    }

    pub fn cache_clean_interval(&self) -> Duration {
        Duration::from_secs(self.cache_clean_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.queue_length == 0 {
            return Err(ConfigError::ZeroQueueLength);
        }
        if self.batch_limit == 0 {
            return Err(ConfigError::ZeroBatchLimit);
        }
        if self.cache_expire_secs == 0 {
            return Err(ConfigError::ZeroCacheExpire);
        }
        if self.cache_clean_interval_secs == 0 {
            return Err(ConfigError::ZeroCleanInterval);
        }
        if self.cache_expire_secs > MAX_CACHE_EXPIRE_SECS {
            return Err(ConfigError::CacheExpireTooLarge {
                got: self.cache_expire_secs,
                max: MAX_CACHE_EXPIRE_SECS,
            });
        }
        if self.cache_clean_interval_secs > MAX_CACHE_CLEAN_INTERVAL_SECS {
            return Err(ConfigError::CleanIntervalTooLarge {
                got: self.cache_clean_interval_secs,
                max: MAX_CACHE_CLEAN_INTERVAL_SECS,
            });
        }
        Ok(())
    }
}
