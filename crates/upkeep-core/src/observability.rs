use serde::{Deserialize, Serialize};

/// 1 回のチェック呼び出しのバッチ集計スナップショット
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub successes: usize,
    pub failures: usize,
    pub success_rate: f64,
    pub failure_rate: f64,
    /// キャッシュヒットを含む結果件数
    pub values: usize,
    pub cache_hits: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl RunStats {
    pub fn total(&self) -> usize {
        self.successes + self.failures
    }
}
