//! `statsync plan` – show the remaining work for today's cycle.

use anyhow::Result;
use statsync_core::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use statsync_core::config::StatsyncConfig;
use statsync_core::model::CycleKey;
use statsync_core::scheduler::{dedupe_tasks, partition_batches, remaining_tasks};
use statsync_core::statsdb::StatsDb;

pub async fn run_plan(
    cfg: &StatsyncConfig,
    db: &StatsDb,
    checkpoints: &SqliteCheckpointStore,
) -> Result<()> {
    let cycle = CycleKey::today();
    let tasks = dedupe_tasks(db.list_active_entities().await?);
    let record = checkpoints.load(&cycle).await?;
    let remaining = remaining_tasks(&tasks, &record);
    let batches = partition_batches(remaining, cfg.batch_size);

    println!(
        "Cycle {}: {} entities, {} already handled, {} remaining in {} batches",
        cycle,
        tasks.len(),
        tasks.len() - batches.iter().map(Vec::len).sum::<usize>(),
        batches.iter().map(Vec::len).sum::<usize>(),
        batches.len()
    );
    for (i, batch) in batches.iter().enumerate() {
        let ids: Vec<&str> = batch.iter().map(|t| t.id.as_str()).collect();
        println!("  batch {}: {}", i + 1, ids.join(", "));
    }
    Ok(())
}
