//! RunnerBuilder - Runner の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）

use std::sync::Arc;

use super::config::{ConfigError, RunnerConfig};
use super::runner::Runner;
use crate::ports::{Clock, Encoder, Registry, SystemClock};

/// [`RunnerBuilder::build`] のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no registry configured")]
    MissingRegistry,

    #[error("no encoder configured")]
    MissingEncoder,

    #[error("invalid runner config: {0}")]
    Config(#[from] ConfigError),
}

/// [`Runner`] を構築
///
/// # 使用例
/// ```ignore
/// let runner = RunnerBuilder::new()
///     .config(RunnerConfig { workers: 4, ..Default::default() })
///     .registry(Arc::new(my_registry))
///     .encoder(Arc::new(KeyEncoder))
///     .build()?;
/// runner.start();
/// ```
///
/// # Fail-fast 設計
/// - build() は何かを spawn する前に設定と Registry / Encoder の有無を検証する
/// - ワーカープールを起動するので tokio ランタイム内で呼ぶこと
pub struct RunnerBuilder {
    config: RunnerConfig,
    registry: Option<Arc<dyn Registry>>,
    encoder: Option<Arc<dyn Encoder>>,
    clock: Arc<dyn Clock>,
}

impl RunnerBuilder {
    pub fn new() -> Self {
        Self {
            config: RunnerConfig::default(),
            registry: None,
            encoder: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// キャッシュの期限判定に使う Clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<Runner, BuildError> {
        self.config.validate()?;
        let registry = self.registry.ok_or(BuildError::MissingRegistry)?;
        let encoder = self.encoder.ok_or(BuildError::MissingEncoder)?;
        Ok(Runner::new(self.config, registry, encoder, self.clock))
    }
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{KeyEncoder, SimulatedRegistry};

    #[tokio::test]
    async fn build_success() {
        let runner = RunnerBuilder::new()
            .registry(Arc::new(SimulatedRegistry::new()))
            .encoder(Arc::new(KeyEncoder))
            .build();
        assert!(runner.is_ok());
    }

    #[tokio::test]
    async fn build_missing_registry() {
        let runner = RunnerBuilder::new().encoder(Arc::new(KeyEncoder)).build();
        assert!(matches!(runner, Err(BuildError::MissingRegistry)));
    }

    #[tokio::test]
    async fn build_missing_encoder() {
        let runner = RunnerBuilder::new()
            .registry(Arc::new(SimulatedRegistry::new()))
            .build();
        assert!(matches!(runner, Err(BuildError::MissingEncoder)));
    }

    #[tokio::test]
    async fn build_rejects_invalid_config() {
        let runner = RunnerBuilder::new()
            .config(RunnerConfig {
                workers: 0,
                ..Default::default()
            })
            .registry(Arc::new(SimulatedRegistry::new()))
            .encoder(Arc::new(KeyEncoder))
            .build();
        assert!(matches!(
            runner,
            Err(BuildError::Config(ConfigError::ZeroWorkers))
        ));
    }

    #[tokio::test]
    async fn build_rejects_ttl_beyond_instant_range() {
        let runner = RunnerBuilder::new()
            .config(RunnerConfig {
                cache_expire_secs: u64::MAX,
                ..Default::default()
            })
            .registry(Arc::new(SimulatedRegistry::new()))
            .encoder(Arc::new(KeyEncoder))
            .build();
        assert!(matches!(
            runner,
            Err(BuildError::Config(ConfigError::CacheExpireTooLarge { .. }))
        ));
    }
}
