//! `statsync run` – run one update cycle for today.

use anyhow::Result;
use std::sync::Arc;

use statsync_core::api::HttpStatsClient;
use statsync_core::checkpoint::SqliteCheckpointStore;
use statsync_core::config::StatsyncConfig;
use statsync_core::model::CycleKey;
use statsync_core::processor::EntityProcessor;
use statsync_core::quota::QuotaGuard;
use statsync_core::ratelimit::RateLimiter;
use statsync_core::scheduler::{CycleOptions, CycleRunner};
use statsync_core::statsdb::StatsDb;

pub async fn run_cycle_cmd(
    cfg: &StatsyncConfig,
    db: &StatsDb,
    checkpoints: SqliteCheckpointStore,
    workers: Option<usize>,
    batch_size: Option<usize>,
) -> Result<()> {
    let mut cfg = cfg.clone();
    if let Some(n) = workers {
        cfg.max_workers = n;
    }
    if let Some(n) = batch_size {
        cfg.batch_size = n;
    }

    let tasks = db.list_active_entities().await?;
    if tasks.is_empty() {
        println!("No active entities; nothing to do.");
        return Ok(());
    }

    let cycle = CycleKey::today();
    let quota_cfg = cfg.quota();
    let quota = Arc::new(QuotaGuard::new(quota_cfg.daily_limit));
    let limiter = Arc::new(RateLimiter::new(cfg.min_request_interval()));
    let client = HttpStatsClient::new(
        &cfg.api,
        cfg.retry().attempt_timeout(),
        quota_cfg.cost_per_entity,
    );
    let processor = Arc::new(EntityProcessor::new(
        client,
        db.clone(),
        limiter,
        Arc::clone(&quota),
    ));

    let runner = CycleRunner::new(
        Arc::new(checkpoints),
        processor,
        Arc::clone(&quota),
        CycleOptions::from_config(&cfg),
    )
    .with_observer(|p| {
        println!(
            "batch {}/{}: {} processed ({} ok, {} failed), quota remaining {}",
            p.batches_done, p.batch_count, p.processed, p.success, p.errors, p.quota_remaining
        );
    });

    // Ctrl-C requests a graceful stop: in-flight entities drain and the
    // current batch is still checkpointed before we exit.
    let stop = runner.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("stop requested, finishing current batch...");
            stop.request_stop();
        }
    });

    println!("Running cycle {} over {} entities", cycle, tasks.len());
    let report = runner.run_cycle(cycle, tasks).await?;

    println!(
        "Cycle {}: {} total, {} ok, {} failed, {} skipped in {:.1}s",
        report.cycle,
        report.total,
        report.success,
        report.errors,
        report.skipped,
        report.duration.as_secs_f64()
    );
    println!(
        "Quota: {} used / {} ({} remaining)",
        quota.consumed(),
        quota_cfg.daily_limit,
        quota.remaining()
    );
    if report.quota_exhausted {
        println!("Stopped early: quota budget insufficient for the next batch.");
    }
    if report.stopped {
        println!("Stopped early by request; rerun to resume this cycle.");
    }
    Ok(())
}
