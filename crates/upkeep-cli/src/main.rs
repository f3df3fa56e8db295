//! upkeep - SimulatedRegistry に対してチェックエンジンを動かすデモ
//!
//! 各ラウンドで同じキー集合をチェックする。2 ラウンド目以降は、以前失敗したバッチを除いて
//! キャッシュから返る。ラウンドごとの統計を JSON 行で stdout に出す。

mod config;
mod logger;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use upkeep_core::app::BuildError;
use upkeep_core::domain::{BlockKey, UpkeepId};
use upkeep_core::impls::{KeyEncoder, SimulatedRegistry};
use upkeep_core::{RunStats, Runner, RunnerError, UpkeepKey};

use crate::config::{ConfigError, FileConfig, Overrides};
use crate::logger::{LoggerConfig, LoggerError, LoggerFormat, logger_init};

#[derive(Debug, Parser)]
#[command(name = "upkeep", version, about = "Run batched upkeep checks against a simulated registry")]
struct Cli {
    /// JSON config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of upkeeps to check.
    #[arg(long, default_value_t = 25)]
    keys: u64,

    /// Block the keys are checked at.
    #[arg(long, default_value_t = 1)]
    block: u64,

    #[arg(long, default_value_t = 2)]
    rounds: u32,

    /// Index of a batch whose registry call should fail.
    #[arg(long)]
    fail_batch: Option<usize>,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    queue_length: Option<usize>,

    #[arg(long)]
    batch_limit: Option<usize>,

    #[arg(long)]
    cache_expire_secs: Option<u64>,

    /// Simulated latency of each registry call.
    #[arg(long)]
    latency_ms: Option<u64>,

    #[arg(long)]
    mercury: bool,

    #[arg(long, default_value = "text")]
    log_format: LoggerFormat,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Logger(#[from] LoggerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("failed to encode stats: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct RoundLine<'a> {
    round: u32,
    eligible: usize,
    #[serde(flatten)]
    stats: &'a RunStats,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("upkeep: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    logger_init(&LoggerConfig {
        format: cli.log_format,
        level: cli.log_level.clone(),
        ..Default::default()
    })?;

    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let cfg = file.apply(&Overrides {
        workers: cli.workers,
        queue_length: cli.queue_length,
        batch_limit: cli.batch_limit,
        cache_expire_secs: cli.cache_expire_secs,
        latency_ms: cli.latency_ms,
        mercury_enabled: cli.mercury,
    });

    let block = BlockKey::from(cli.block);
    let keys: Vec<UpkeepKey> = (0..cli.keys)
        .map(|i| UpkeepKey::from_parts(&block, &UpkeepId::new(i.to_string())))
        .collect();

    let registry = Arc::new(
        SimulatedRegistry::new()
            .with_latency(Duration::from_millis(cfg.latency_ms))
            .with_eligible_every(cfg.eligible_every),
    );
    if let Some(idx) = cli.fail_batch
        && let Some(first) = first_key_of_batch(&keys, idx, cfg.runner.batch_limit)
    {
        registry.fail_keys([first.clone()]);
    }

    let runner = Runner::builder()
        .config(cfg.runner.clone())
        .registry(registry.clone())
        .encoder(Arc::new(KeyEncoder))
        .build()?;
    runner.start();

    info!(
        keys = keys.len(),
        rounds = cli.rounds,
        workers = cfg.runner.workers,
        batch_limit = cfg.runner.batch_limit,
        "starting upkeep checks"
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let outcome = rounds(&runner, &cancel, cfg.mercury_enabled, &keys, cli.rounds).await;

    runner.close().await;
    info!(registry_calls = registry.calls(), "upkeep checks finished");
    outcome
}

/// `idx` 番目のバッチの先頭キー（範囲外や桁あふれなら None）
fn first_key_of_batch(keys: &[UpkeepKey], idx: usize, batch_limit: usize) -> Option<&UpkeepKey> {
    idx.checked_mul(batch_limit.max(1))
        .and_then(|pos| keys.get(pos))
}

async fn rounds(
    runner: &Runner,
    cancel: &CancellationToken,
    mercury_enabled: bool,
    keys: &[UpkeepKey],
    rounds: u32,
) -> Result<(), CliError> {
    for round in 1..=rounds {
        match runner.check_report(cancel, mercury_enabled, keys).await {
            Ok(report) => {
                let line = RoundLine {
                    round,
                    eligible: report.values.iter().filter(|r| r.is_eligible()).count(),
                    stats: &report.stats,
                };
                println!("{}", serde_json::to_string(&line)?);
            }
            Err(RunnerError::Cancelled) => {
                warn!(round, "check cancelled");
                break;
            }
            Err(err) => error!(round, error = %err, "check failed"),
        }
    }
    Ok(())
}
