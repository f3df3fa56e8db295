//! Domain - ドメインモデル（key, result, errors）

pub mod errors;
pub mod key;
pub mod result;

pub use errors::{BatchError, RunnerError};
pub use key::{BlockKey, UpkeepId, UpkeepKey, KEY_SEPARATOR};
pub use result::{CheckOutcome, FailureReason, UpkeepResult};
