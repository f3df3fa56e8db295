//! TtlCache - エントリごとに期限を持つキャッシュ
//!
//! # 実装詳細
//! - `RwLock<HashMap<K, CacheEntry<V>>>` で管理
//! - 期限切れの判定は読み出し時に行う
//! - [`CacheCleaner`](super::CacheCleaner) はメモリを回収するだけで、正しさには関与しない

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::ports::{Clock, SystemClock};

/// 書き込んだエントリの有効期間
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// キャッシュのデフォルト TTL
    Default,

    /// 無期限
    Never,

    /// 指定時間後に失効
    After(Duration),
}

impl From<Duration> for Expiration {
    fn from(ttl: Duration) -> Self {
        Expiration::After(ttl)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// `None` は無期限
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// エントリ単位で期限を持つ並行 KV ストア
///
/// 読み出しは共有ロック、書き込みと掃除は排他ロック。値は clone して返す。
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            clock,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 有効なエントリを取得
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            _ => None,
        }
    }

    /// 挿入または上書き（期限はリセット）
    pub fn set(&self, key: K, value: V, expiration: Expiration) {
        // Instant に収まらない TTL は無期限として扱う
        let expires_at = match expiration {
            Expiration::Default => self.clock.now().checked_add(self.default_ttl),
            Expiration::Never => None,
            Expiration::After(ttl) => self.clock.now().checked_add(ttl),
        };
        self.entries
            .write()
            .insert(key, CacheEntry { value, expires_at });
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().remove(key).map(|entry| entry.value)
    }

    /// 期限切れを全削除し、削除件数を返す
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// 有効なエントリのキー
    pub fn keys(&self) -> Vec<K> {
        let now = self.clock.now();
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// 未掃除の期限切れも含む件数
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
