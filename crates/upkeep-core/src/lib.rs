//! upkeep-core
//!
//! upkeep の並列チェックエンジン。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（key, result, errors）
//! - **ports**: 抽象化レイヤー（Registry, Encoder, Clock）
//! - **pool**: 有界ワーカープールと `run_jobs`
//! - **cache**: TTL キャッシュとバックグラウンドのクリーナー
//! - **app**: Runner, RunnerBuilder, RunnerConfig, ResultAggregator
//! - **impls**: 実装（KeyEncoder, SimulatedRegistry）
//! - **observability**: チェック呼び出しごとの統計

pub mod app;
pub mod cache;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod pool;
pub mod ports;

pub use app::{CheckReport, Runner, RunnerBuilder, RunnerConfig};
pub use domain::{RunnerError, UpkeepKey, UpkeepResult};
pub use observability::RunStats;
pub use ports::{Encoder, Registry};
