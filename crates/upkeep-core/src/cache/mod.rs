//! Cache - 結果キャッシュ（TTL ストア + クリーナー）

mod cleaner;
mod ttl;

pub use cleaner::CacheCleaner;
pub use ttl::{Expiration, TtlCache};
