//! CacheCleaner - [`TtlCache`] のバックグラウンド掃除
//!
//! # 学習ポイント
//! - CancellationToken による停止
//! - `biased` な `select!` で停止を優先する

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::TtlCache;

struct Running {
    shutdown: CancellationToken,
    join: JoinHandle<()>,
}

/// 期限切れエントリを定期的に削除する
///
/// `start` / `stop` はどちらも冪等。stop 後の再 start も可能。
pub struct CacheCleaner {
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl CacheCleaner {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 現在の tokio ランタイムで掃除ループを起動（起動中なら何もしない）
    pub fn start<K, V>(&self, cache: Arc<TtlCache<K, V>>)
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.join.is_finished()) {
            return;
        }

        let shutdown = CancellationToken::new();
        let join = tokio::spawn(sweep_loop(cache, self.interval, shutdown.clone()));
        *running = Some(Running { shutdown, join });
    }

    /// 掃除ループを止める（停止中なら何もしない）
    pub fn stop(&self) {
        if let Some(running) = self.running.lock().take() {
            running.shutdown.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.join.is_finished())
    }
}

impl Drop for CacheCleaner {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweep_loop<K, V>(cache: Arc<TtlCache<K, V>>, every: Duration, shutdown: CancellationToken)
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    info!(interval_ms = every.as_millis() as u64, "cache cleaner started");

    let mut ticker = tokio::time::interval(every);
    // 最初の tick は即時に発火する
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("cache cleaner stopped");
                break;
            }

            _ = ticker.tick() => {
                let removed = cache.clear_expired();
                if removed > 0 {
                    debug!(removed, remaining = cache.len(), "swept expired cache entries");
                }
            }
        }
    }
}
