//! `statsync status` – show entities and a cycle's checkpoint summary.

use anyhow::Result;
use statsync_core::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use statsync_core::model::CycleKey;
use statsync_core::statsdb::StatsDb;

pub async fn run_status(
    db: &StatsDb,
    checkpoints: &SqliteCheckpointStore,
    cycle: Option<&str>,
) -> Result<()> {
    let entities = db.list_entities().await?;
    if entities.is_empty() {
        println!("No entities registered.");
    } else {
        println!("{:<28} {:<10} {:<8} {}", "ID", "PRIORITY", "ACTIVE", "LABEL");
        for e in &entities {
            println!(
                "{:<28} {:<10} {:<8} {}",
                e.id,
                e.priority,
                if e.active { "yes" } else { "no" },
                e.label.as_deref().unwrap_or("-")
            );
        }
    }

    let cycle = cycle
        .map(CycleKey::new)
        .unwrap_or_else(CycleKey::today);
    let record = checkpoints.load(&cycle).await?;
    println!();
    println!(
        "Cycle {}: {} handled ({} ok, {} failed), quota used {}",
        cycle,
        record.completed.len(),
        record.success,
        record.errors,
        record.quota_used
    );
    if !record.failures.is_empty() {
        println!("Failures:");
        for f in &record.failures {
            println!("  {} ({} attempts): {}", f.id, f.attempts, f.reason);
        }
    }
    Ok(())
}
