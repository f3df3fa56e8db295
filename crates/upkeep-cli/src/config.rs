//! CLI 設定 - JSON 設定ファイル（任意）にコマンドライン引数を上書きする

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use upkeep_core::RunnerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 設定ファイルの内容（全フィールド省略可）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub runner: RunnerConfig,
    pub mercury_enabled: bool,
    /// SimulatedRegistry の呼び出しごとの遅延
    pub latency_ms: u64,
    /// この値で割り切れる upkeep id を eligible とする
    pub eligible_every: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            runner: RunnerConfig::default(),
            mercury_enabled: false,
            latency_ms: 0,
            eligible_every: 3,
        }
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// コマンドライン引数（設定ファイルより優先）
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub workers: Option<usize>,
    pub queue_length: Option<usize>,
    pub batch_limit: Option<usize>,
    pub cache_expire_secs: Option<u64>,
    pub latency_ms: Option<u64>,
    pub mercury_enabled: bool,
}

impl FileConfig {
    pub fn apply(mut self, o: &Overrides) -> Self {
        if let Some(v) = o.workers {
            self.runner.workers = v;
        }
        if let Some(v) = o.queue_length {
            self.runner.queue_length = v;
        }
        if let Some(v) = o.batch_limit {
            self.runner.batch_limit = v;
        }
        if let Some(v) = o.cache_expire_secs {
            self.runner.cache_expire_secs = v;
        }
        if let Some(v) = o.latency_ms {
            self.latency_ms = v;
        }
        self.mercury_enabled |= o.mercury_enabled;
        self
    }
}
