//! Runner - 並列チェックと集計
//!
//! # 1 回のチェックの流れ
//! 1. 全キーでキャッシュを引く。ヒットはそのまま出力へ
//! 2. ミスしたキーを `batch_limit` 件以下のバッチに分割
//! 3. バッチごとに registry 呼び出しをワーカープールへ投入
//! 4. 集計: 成功バッチはキャッシュと出力へ、失敗バッチは数えるだけ
//! 5. 投入した全バッチが失敗したときだけエスカレーション
//!
//! # 学習ポイント
//! - `Arc<dyn Trait>` で注入した port をクロージャに閉じ込める
//! - 部分失敗は吸収し、全失敗だけを呼び出し元に返す

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::builder::RunnerBuilder;
use super::config::RunnerConfig;
use super::result::ResultAggregator;
use crate::cache::{CacheCleaner, Expiration, TtlCache};
use crate::domain::{BatchError, RunnerError, UpkeepKey, UpkeepResult};
use crate::observability::RunStats;
use crate::pool::{JobPanicked, PoolError, WorkerPool, batches, run_jobs};
use crate::ports::{Clock, Encoder, Registry, RegistryError};

type CheckAggregate = ResultAggregator<UpkeepResult, BatchError>;
type BatchOutcome = Result<Vec<UpkeepResult>, BatchError>;

/// 1 回のチェックの結果とバッチ集計
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub values: Vec<UpkeepResult>,
    pub stats: RunStats,
}

/// どの upkeep を今 perform すべきかを判定する
///
/// キャッシュ、クリーナー、ワーカープールを生涯保持する。それ以外は呼び出しをまたいで残らない。
pub struct Runner {
    config: RunnerConfig,
    registry: Arc<dyn Registry>,
    encoder: Arc<dyn Encoder>,
    cache: Arc<TtlCache<UpkeepKey, UpkeepResult>>,
    cleaner: CacheCleaner,
    pool: WorkerPool,
    started: AtomicBool,
    closed: AtomicBool,
}

impl Runner {
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::new()
    }

    pub(crate) fn new(
        config: RunnerConfig,
        registry: Arc<dyn Registry>,
        encoder: Arc<dyn Encoder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(TtlCache::with_clock(config.cache_expire(), clock));
        let cleaner = CacheCleaner::new(config.cache_clean_interval());
        let pool = WorkerPool::new(config.workers, config.queue_length);

        Self {
            config,
            registry,
            encoder,
            cache,
            cleaner,
            pool,
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// クリーナーを起動（初回のみ有効）
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cleaner.start(Arc::clone(&self.cache));
        info!(
            workers = self.config.workers,
            queue_length = self.config.queue_length,
            batch_limit = self.config.batch_limit,
            "runner started"
        );
    }

    /// クリーナーを止め、ワーカープールを排出（初回のみ有効）
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cleaner.stop();
        self.pool.shutdown_and_join().await;
        info!("runner closed");
    }

    /// `keys` をチェックし、キャッシュまたは新規の結果を返す
    ///
    /// 一部バッチの失敗は吸収する。エラーになるのは全バッチ失敗とキャンセルのときだけ。
    pub async fn check_upkeep(
        &self,
        cancel: &CancellationToken,
        mercury_enabled: bool,
        keys: &[UpkeepKey],
    ) -> Result<Vec<UpkeepResult>, RunnerError> {
        self.check_report(cancel, mercury_enabled, keys)
            .await
            .map(|report| report.values)
    }

    /// [`check_upkeep`](Self::check_upkeep) と同じ。呼び出しの [`RunStats`] も返す
    pub async fn check_report(
        &self,
        cancel: &CancellationToken,
        mercury_enabled: bool,
        keys: &[UpkeepKey],
    ) -> Result<CheckReport, RunnerError> {
        let result = Arc::new(CheckAggregate::new());
        let mut seen = HashSet::with_capacity(keys.len());
        let mut to_run = Vec::with_capacity(keys.len());
        let mut cache_hits = 0;

        for key in keys {
            if !seen.insert(key) {
                continue;
            }
            match self.cache.get(key) {
                Some(hit) => {
                    result.add(hit);
                    cache_hits += 1;
                }
                None => to_run.push(key.clone()),
            }
        }

        if to_run.is_empty() {
            return Ok(report(&result, cache_hits));
        }

        let jobs = batches(&to_run, self.config.batch_limit);
        debug!(
            keys = to_run.len(),
            cache_hits,
            batches = jobs.len(),
            "dispatching upkeep checks"
        );

        run_jobs(
            cancel,
            &self.pool,
            jobs,
            batch_worker(
                Arc::clone(&self.registry),
                Arc::clone(&self.encoder),
                mercury_enabled,
            ),
            aggregate_into(
                Arc::clone(&result),
                Arc::clone(&self.cache),
                Arc::clone(&self.encoder),
            ),
        )
        .await
        .map_err(|err| match err {
            PoolError::Cancelled => RunnerError::Cancelled,
            other => RunnerError::Pool(other),
        })?;

        if result.total() == 0 {
            info!("no network calls were made for this sampling set");
        } else {
            info!(
                success_rate = result.success_rate(),
                failure_rate = result.failure_rate(),
                total = result.total(),
                "worker call summary"
            );
        }

        // 全バッチ失敗: 使える結果がない
        if result.total() > 0
            && result.total() == result.failures()
            && let Some(err) = result.err()
        {
            return Err(RunnerError::TooManyErrors(err.to_string()));
        }

        Ok(report(&result, cache_hits))
    }
}

fn batch_worker(
    registry: Arc<dyn Registry>,
    encoder: Arc<dyn Encoder>,
    mercury_enabled: bool,
) -> impl Fn(CancellationToken, Vec<UpkeepKey>) -> BatchFuture + Send + Sync + 'static {
    move |cancel: CancellationToken, keys: Vec<UpkeepKey>| -> BatchFuture {
        let registry = Arc::clone(&registry);
        let encoder = Arc::clone(&encoder);
        Box::pin(async move {
            check_batch(
                registry.as_ref(),
                encoder.as_ref(),
                &cancel,
                mercury_enabled,
                keys,
            )
            .await
        })
    }
}

/// 完了コールバック: 成功はキャッシュと出力へ、失敗は数える
///
/// パニックしたバッチは失敗として数える。
fn aggregate_into(
    result: Arc<CheckAggregate>,
    cache: Arc<TtlCache<UpkeepKey, UpkeepResult>>,
    encoder: Arc<dyn Encoder>,
) -> impl Fn(Result<BatchOutcome, JobPanicked<Vec<UpkeepKey>>>) + Send + Sync + 'static {
    move |out: Result<BatchOutcome, JobPanicked<Vec<UpkeepKey>>>| {
        let out = out.unwrap_or_else(|panicked| {
            Err(BatchError::new(
                panicked.input,
                RegistryError::Panicked(panicked.message),
            ))
        });
        match out {
            Ok(values) => {
                result.add_successes(1);
                for value in values {
                    match encoder.detail(&value) {
                        Ok((key, _gas_limit)) => cache.set(key, value.clone(), Expiration::Default),
                        Err(err) => {
                            warn!(key = %value.key, error = %err, "cannot derive cache key; result not cached")
                        }
                    }
                    result.add(value);
                }
            }
            Err(err) => {
                warn!(error = %err, "error received from worker result");
                result.set_err(err);
                result.add_failures(1);
            }
        }
    }
}

type BatchFuture = std::pin::Pin<Box<dyn std::future::Future<Output = BatchOutcome> + Send>>;

/// 1 バッチ分の registry 往復と eligible 判定
///
/// Encoder が分類できない結果はログを出して捨てる。バッチの失敗にはしない。
async fn check_batch(
    registry: &dyn Registry,
    encoder: &dyn Encoder,
    cancel: &CancellationToken,
    mercury_enabled: bool,
    keys: Vec<UpkeepKey>,
) -> Result<Vec<UpkeepResult>, BatchError> {
    let started = Instant::now();
    let raw = match registry.check_upkeep(cancel, mercury_enabled, &keys).await {
        Ok(raw) => raw,
        Err(err) => return Err(BatchError::new(keys, err)),
    };
    debug!(
        keys = keys.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "checked upkeep batch"
    );

    let mut out = Vec::with_capacity(raw.len());
    for res in raw {
        let (block, upkeep_id) = match encoder.split_upkeep_key(&res.key) {
            Ok((block, id)) => (block.to_string(), id.to_string()),
            Err(_) => (String::new(), res.key.to_string()),
        };

        match encoder.eligible(&res) {
            Ok(true) => {
                debug!(%block, %upkeep_id, "upkeep ready to perform");
            }
            Ok(false) => {
                debug!(
                    %block,
                    %upkeep_id,
                    failure_reason = res.failure_reason().unwrap_or_default(),
                    "upkeep not eligible"
                );
            }
            Err(err) => {
                warn!(%block, %upkeep_id, error = %err, "error checking upkeep result");
                continue;
            }
        }
        out.push(res);
    }
    Ok(out)
}

fn report(result: &CheckAggregate, cache_hits: usize) -> CheckReport {
    let mut stats = result.stats();
    stats.cache_hits = cache_hits;
    CheckReport {
        values: result.take_values(),
        stats,
    }
}
