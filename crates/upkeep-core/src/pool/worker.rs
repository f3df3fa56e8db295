//! WorkerPool - 有界キュー付きワーカープール
//!
//! # 学習ポイント
//! - `Arc<tokio::sync::Mutex<Receiver>>` で 1 本のキューを複数ワーカーが共有
//! - 有界 mpsc によるバックプレッシャー
//! - ジョブを別タスクで動かしてパニックを隔離

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::PoolError;

pub(crate) type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// 固定数のワーカーが有界キューからジョブを取り出す
///
/// - 同時に動くジョブは最大 `workers` 個
/// - キューが満杯なら `submit` は待つ
/// - `stop` は受付を閉じるだけで、キュー内と実行中のジョブは最後まで動く
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    joins: Mutex<Vec<JoinHandle<()>>>,
    workers: usize,
    queue_length: usize,
}

impl WorkerPool {
    /// 現在の tokio ランタイムに `workers` 個のワーカーを起動
    pub fn new(workers: usize, queue_length: usize) -> Self {
        let workers = workers.max(1);
        let queue_length = queue_length.max(1);
        let (tx, rx) = mpsc::channel::<Job>(queue_length);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let mut joins = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let rx = Arc::clone(&rx);
            joins.push(tokio::spawn(worker_loop(worker_id, rx)));
        }
        debug!(workers, queue_length, "worker pool started");

        Self {
            sender: Mutex::new(Some(tx)),
            joins: Mutex::new(joins),
            workers,
            queue_length,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn queue_length(&self) -> usize {
        self.queue_length
    }

    pub fn is_stopped(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// ジョブを投入（満杯なら空くまで待つ）
    pub async fn submit<F>(&self, cancel: &CancellationToken, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // await をまたいでロックを持たないよう clone して取り出す
        let Some(sender) = self.sender.lock().clone() else {
            return Err(PoolError::Stopped);
        };

        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(PoolError::Cancelled),
            sent = sender.send(Box::pin(job)) => sent.map_err(|_| PoolError::Stopped),
        }
    }

    /// 受付を閉じる（冪等）
    pub fn stop(&self) {
        if self.sender.lock().take().is_some() {
            debug!("worker pool intake closed");
        }
    }

    /// 停止し、全ワーカーの終了を待つ
    pub async fn shutdown_and_join(&self) {
        self.stop();
        let joins: Vec<_> = self.joins.lock().drain(..).collect();
        for join in joins {
            let _ = join.await;
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn worker_loop(worker_id: usize, jobs: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>) {
    loop {
        // recv を待つのは 1 ワーカーだけ、残りはロック待ち
        let job = {
            let mut rx = jobs.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            break;
        };

        // 別タスクで実行し、パニックでワーカーが落ちないようにする
        if let Err(err) = tokio::spawn(job).await {
            warn!(worker = worker_id, error = %err, "job panicked");
        }
    }
    debug!(worker = worker_id, "worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn submitted_jobs_run() {
        let pool = WorkerPool::new(2, 4);
        let cancel = CancellationToken::new();
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let ran = Arc::clone(&ran);
            pool.submit(&cancel, async move {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }

        pool.shutdown_and_join().await;
        assert_eq!(ran.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn submit_after_stop_fails() {
        let pool = WorkerPool::new(1, 1);
        pool.stop();
        pool.stop();
        assert!(pool.is_stopped());

        let err = pool
            .submit(&CancellationToken::new(), async {})
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_blocks_until_cancelled() {
        let pool = WorkerPool::new(1, 1);
        let cancel = CancellationToken::new();
        let gate = CancellationToken::new();

        // 唯一のワーカーを占有
        let g = gate.clone();
        pool.submit(&cancel, async move { g.cancelled().await }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        // キューを埋める
        pool.submit(&cancel, async {}).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(100), pool.submit(&cancel, async {}))
            .await;
        assert!(blocked.is_err(), "submit should wait on a full queue");

        let c = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            c.cancel();
        });
        let err = pool.submit(&cancel, async {}).await.unwrap_err();
        assert!(matches!(err, PoolError::Cancelled));

        gate.cancel();
        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(1, 2);
        let cancel = CancellationToken::new();
        let ran = Arc::new(AtomicUsize::new(0));

        pool.submit(&cancel, async { panic!("boom") }).await.unwrap();
        let r = Arc::clone(&ran);
        pool.submit(&cancel, async move {
            r.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

        pool.shutdown_and_join().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
