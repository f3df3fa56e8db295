//! Pool - ワーカープールと scatter/gather
//!
//! # 主要コンポーネント
//! - **WorkerPool**: 有界キュー付きワーカー
//! - **run_jobs**: 入力ごとに 1 ジョブを投入し、全完了まで待つ
//! - **batches**: 順序を保った分割

mod worker;

pub use worker::WorkerPool;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("worker pool stopped")]
    Stopped,

    #[error("context cancelled")]
    Cancelled,
}

/// `work` がパニックしたジョブ。出力の代わりに `on_done` へ渡る
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPanicked<K> {
    /// ジョブの入力
    pub input: K,
    pub message: String,
}

/// `items` を最大 `limit` 件の連続したチャンクに分割（順序は保つ）
pub fn batches<T: Clone>(items: &[T], limit: usize) -> Vec<Vec<T>> {
    items.chunks(limit.max(1)).map(<[T]>::to_vec).collect()
}

/// 入力ごとに 1 ジョブを `pool` に投入し、全ジョブの完了まで待つ
///
/// # 実行
/// - `work` はワーカー上で動き、`on_done` はその結果で必ず 1 回呼ばれる
/// - `on_done` は複数ワーカーから並行に呼ばれうる
/// - `work` のパニックは [`JobPanicked`] として `on_done` に届く
///
/// # キャンセル・停止
/// - `cancel` が発火したら [`PoolError::Cancelled`] で即座に戻る
/// - 完了済みジョブの効果は残る。未開始のジョブは `work` も `on_done` も呼ばない
/// - 投入中にプールが止まったら、投入済みの完了を待って [`PoolError::Stopped`]
pub async fn run_jobs<K, T, W, Fut, D>(
    cancel: &CancellationToken,
    pool: &WorkerPool,
    jobs: Vec<K>,
    work: W,
    on_done: D,
) -> Result<(), PoolError>
where
    K: Clone + Send + 'static,
    T: Send + 'static,
    W: Fn(CancellationToken, K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
    D: Fn(Result<T, JobPanicked<K>>) + Send + Sync + 'static,
{
    let work = Arc::new(work);
    let on_done = Arc::new(on_done);
    let tracker = TaskTracker::new();
    let mut submitted = Ok(());

    for input in jobs {
        let work = Arc::clone(&work);
        let on_done = Arc::clone(&on_done);
        let token = cancel.clone();

        let job = tracker.track_future(async move {
            if token.is_cancelled() {
                return;
            }
            let retained = input.clone();
            // work は別タスクで実行し、パニックも on_done まで届ける
            let out = match tokio::spawn(async move { work(token, input).await }).await {
                Ok(out) => Ok(out),
                Err(err) => Err(JobPanicked {
                    input: retained,
                    message: panic_message(err),
                }),
            };
            on_done(out);
        });

        if let Err(err) = pool.submit(cancel, job).await {
            submitted = Err(err);
            break;
        }
    }
    tracker.close();

    if let Err(PoolError::Cancelled) = submitted {
        return submitted;
    }

    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(PoolError::Cancelled),
        _ = tracker.wait() => submitted,
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "job task cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[rstest]
    #[case::exact(20, 10, vec![10, 10])]
    #[case::remainder(25, 10, vec![10, 10, 5])]
    #[case::smaller_than_limit(3, 10, vec![3])]
    #[case::empty(0, 10, vec![])]
    #[case::one_each(3, 1, vec![1, 1, 1])]
    fn batches_preserve_order_and_bound(
        #[case] n: usize,
        #[case] limit: usize,
        #[case] sizes: Vec<usize>,
    ) {
        let items: Vec<usize> = (0..n).collect();
        let out = batches(&items, limit);

        assert_eq!(out.iter().map(Vec::len).collect::<Vec<_>>(), sizes);
        assert_eq!(out.len(), n.div_ceil(limit));
        let flat: Vec<usize> = out.into_iter().flatten().collect();
        assert_eq!(flat, items);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn on_done_called_once_per_job() {
        let pool = WorkerPool::new(3, 2);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        run_jobs(
            &CancellationToken::new(),
            &pool,
            (0..20).collect(),
            |_, i: u32| async move { i * 2 },
            move |v| {
                if let Ok(v) = v {
                    s.lock().push(v);
                }
            },
        )
        .await
        .unwrap();

        let mut seen = seen.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_worker_count() {
        let pool = WorkerPool::new(2, 1);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        run_jobs(
            &CancellationToken::new(),
            &pool,
            (0..12).collect::<Vec<u32>>(),
            move |_, _| {
                let (a, p) = (Arc::clone(&a), Arc::clone(&p));
                async move {
                    let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    a.fetch_sub(1, Ordering::SeqCst);
                }
            },
            |_| {},
        )
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_work_still_reaches_on_done() {
        let pool = WorkerPool::new(2, 4);
        let outcomes = Arc::new(Mutex::new(Vec::new()));

        let o = Arc::clone(&outcomes);
        run_jobs(
            &CancellationToken::new(),
            &pool,
            vec![1u32, 2, 3, 4],
            |_, i| async move {
                if i % 2 == 0 {
                    panic!("bad input {i}");
                }
                i
            },
            move |r| o.lock().push(r),
        )
        .await
        .unwrap();

        let mut outcomes = outcomes.lock().clone();
        assert_eq!(outcomes.len(), 4);
        outcomes.sort_by_key(|r| match r {
            Ok(v) => *v,
            Err(p) => p.input,
        });
        assert_eq!(outcomes[0], Ok(1));
        assert_eq!(outcomes[2], Ok(3));
        let Err(panicked) = &outcomes[1] else {
            panic!("expected job 2 to panic");
        };
        assert_eq!(panicked.input, 2);
        assert_eq!(panicked.message, "bad input 2");
        assert!(matches!(&outcomes[3], Err(p) if p.input == 4));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_returns_early() {
        let pool = WorkerPool::new(1, 4);
        let cancel = CancellationToken::new();
        let done = Arc::new(AtomicUsize::new(0));

        let c = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            c.cancel();
        });

        let d = Arc::clone(&done);
        let res = run_jobs(
            &cancel,
            &pool,
            vec![100u64, 100, 100, 100],
            |token, ms| async move {
                tokio::select! {
                    _ = token.cancelled() => Err(()),
                    _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
                }
            },
            move |r| {
                if matches!(r, Ok(Ok(()))) {
                    d.fetch_add(1, Ordering::SeqCst);
                }
            },
        )
        .await;

        assert!(matches!(res, Err(PoolError::Cancelled)));
        // 1 件目はキャンセル前に完了、2 件目は中断
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stopped_pool_reports_stopped() {
        let pool = WorkerPool::new(1, 1);
        pool.stop();
        let res = run_jobs(
            &CancellationToken::new(),
            &pool,
            vec![1u8],
            |_, v| async move { v },
            |_| {},
        )
        .await;
        assert!(matches!(res, Err(PoolError::Stopped)));
    }

    #[tokio::test]
    async fn empty_job_list_returns_immediately() {
        let pool = WorkerPool::new(1, 1);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        run_jobs(
            &CancellationToken::new(),
            &pool,
            Vec::<u8>::new(),
            |_, v| async move { v },
            move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
