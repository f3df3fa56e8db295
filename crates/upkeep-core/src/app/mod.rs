//! App - アプリケーションロジック
//!
//! # 主要コンポーネント
//! - **RunnerBuilder**: ワイヤリングと起動時検証
//! - **RunnerConfig**: 固定パラメータ（ワーカー数、キュー長、TTL、バッチ上限）
//! - **Runner**: キャッシュ照会 → バッチ分割 → 投入 → 集計 → エスカレーション
//! - **ResultAggregator**: 呼び出しごとのカウンタと結果

pub mod builder;
pub mod config;
pub mod result;
pub mod runner;

pub use self::builder::{BuildError, RunnerBuilder};
pub use self::config::{ConfigError, RunnerConfig};
pub use self::result::ResultAggregator;
pub use self::runner::{CheckReport, Runner};
