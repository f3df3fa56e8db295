//! Impls - 実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **KeyEncoder**: `block|id` 形式のキーを扱う Encoder
//! - **SimulatedRegistry**: メモリ上で答える Registry
//!
//! # 本番用実装
//! 実際の Registry / Encoder はチェーンクライアント側に置く。

pub mod key_encoder;
pub mod simulated_registry;

pub use self::key_encoder::KeyEncoder;
pub use self::simulated_registry::{SIMULATED_FAILURE_REASON, SimulatedRegistry};
