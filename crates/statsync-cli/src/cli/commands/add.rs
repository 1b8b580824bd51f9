//! `statsync add <id>` – register an entity for updates.

use anyhow::Result;
use statsync_core::statsdb::StatsDb;

pub async fn run_add(db: &StatsDb, id: &str, label: Option<&str>, priority: i64) -> Result<()> {
    db.add_entity(id, label, priority).await?;
    println!("Added entity {id} (priority {priority})");
    Ok(())
}
