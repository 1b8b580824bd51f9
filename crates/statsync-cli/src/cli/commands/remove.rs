//! `statsync remove <id>` – deactivate an entity.

use anyhow::Result;
use statsync_core::statsdb::StatsDb;

pub async fn run_remove(db: &StatsDb, id: &str) -> Result<()> {
    if db.remove_entity(id).await? {
        println!("Deactivated entity {id}");
    } else {
        println!("No entity {id} found");
    }
    Ok(())
}
