//! Ports - 抽象化レイヤー
//!
//! Registry（RPC）、Encoder（結果の解釈）、Clock をトレイトオブジェクトとして Runner に注入する。
//! エンジンはどれのライフサイクルも所有しない。

pub mod clock;
pub mod encoder;
pub mod registry;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::encoder::{Encoder, EncoderError};
pub use self::registry::{Registry, RegistryError};
