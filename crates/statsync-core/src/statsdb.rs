//! Local stats database (SQLite via sqlx).
//!
//! Holds the entity registry (the work-set provider) and the persisted
//! statistics: a latest-value row per entity plus an append-only history
//! table so each cycle leaves a daily trail.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

use crate::checkpoint::sqlite::path_to_sqlite_uri;
use crate::checkpoint::types::unix_timestamp;
use crate::error::ApiError;
use crate::model::{EntityTask, StatsPayload};
use crate::processor::StatsSink;

/// Summary row used by the CLI `status` command.
#[derive(Debug, Clone)]
pub struct EntityRow {
    pub id: String,
    pub label: Option<String>,
    pub priority: i64,
    pub active: bool,
}

/// Handle to the SQLite-backed stats database
/// (`~/.local/state/statsync/stats.db`).
#[derive(Clone)]
pub struct StatsDb {
    pool: Pool<Sqlite>,
}

impl StatsDb {
    /// Open (or create) the default stats database and run migrations.
    pub async fn open_default() -> anyhow::Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("statsync")?;
        let state_dir = xdg_dirs.get_state_home().join("statsync");
        let db_path = state_dir.join("stats.db");

        tokio::fs::create_dir_all(&state_dir).await?;

        let uri = path_to_sqlite_uri(&db_path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;

        let db = StatsDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open (or create) the database at a specific path (tests).
    pub async fn open_at(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        let db = StatsDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                entity_id TEXT PRIMARY KEY,
                label TEXT,
                priority INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1,
                added_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entity_stats (
                entity_id TEXT PRIMARY KEY,
                views INTEGER NOT NULL,
                subscribers INTEGER NOT NULL,
                item_count INTEGER NOT NULL,
                fetched_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entity_stats_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id TEXT NOT NULL,
                views INTEGER NOT NULL,
                subscribers INTEGER NOT NULL,
                item_count INTEGER NOT NULL,
                fetched_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Register an entity (or update its label/priority and re-activate it).
    pub async fn add_entity(
        &self,
        id: &str,
        label: Option<&str>,
        priority: i64,
    ) -> anyhow::Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO entities (entity_id, label, priority, active, added_at)
            VALUES (?1, ?2, ?3, 1, ?4)
            ON CONFLICT(entity_id) DO UPDATE SET
                label = excluded.label,
                priority = excluded.priority,
                active = 1
            "#,
        )
        .bind(id)
        .bind(label)
        .bind(priority)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deactivate an entity so future cycles skip it. Stats rows are kept.
    pub async fn remove_entity(&self, id: &str) -> anyhow::Result<bool> {
        let r = sqlx::query("UPDATE entities SET active = 0 WHERE entity_id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }

    /// The work set: active entities in priority order (stable: priority,
    /// then id), as consumed by the scheduler's planning phase.
    pub async fn list_active_entities(&self) -> anyhow::Result<Vec<EntityTask>> {
        let rows = sqlx::query(
            r#"
            SELECT entity_id, priority
            FROM entities
            WHERE active = 1
            ORDER BY priority ASC, entity_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| EntityTask {
                id: row.get("entity_id"),
                priority: row.get("priority"),
            })
            .collect())
    }

    /// All registered entities, for `status` output.
    pub async fn list_entities(&self) -> anyhow::Result<Vec<EntityRow>> {
        let rows = sqlx::query(
            r#"
            SELECT entity_id, label, priority, active
            FROM entities
            ORDER BY priority ASC, entity_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| EntityRow {
                id: row.get("entity_id"),
                label: row.get("label"),
                priority: row.get("priority"),
                active: row.get::<i64, _>("active") != 0,
            })
            .collect())
    }

    /// Latest persisted stats for one entity, if any.
    pub async fn latest_stats(&self, id: &str) -> anyhow::Result<Option<StatsPayload>> {
        let row = sqlx::query(
            r#"
            SELECT views, subscribers, item_count
            FROM entity_stats
            WHERE entity_id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| StatsPayload {
            views: row.get::<i64, _>("views") as u64,
            subscribers: row.get::<i64, _>("subscribers") as u64,
            item_count: row.get::<i64, _>("item_count") as u64,
        }))
    }

    async fn upsert_inner(&self, id: &str, payload: &StatsPayload) -> Result<(), sqlx::Error> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO entity_stats (entity_id, views, subscribers, item_count, fetched_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(entity_id) DO UPDATE SET
                views = excluded.views,
                subscribers = excluded.subscribers,
                item_count = excluded.item_count,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(id)
        .bind(payload.views as i64)
        .bind(payload.subscribers as i64)
        .bind(payload.item_count as i64)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            INSERT INTO entity_stats_history (entity_id, views, subscribers, item_count, fetched_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(id)
        .bind(payload.views as i64)
        .bind(payload.subscribers as i64)
        .bind(payload.item_count as i64)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl StatsSink for StatsDb {
    async fn upsert(&self, entity_id: &str, payload: &StatsPayload) -> Result<(), ApiError> {
        self.upsert_inner(entity_id, payload)
            .await
            .map_err(|e| ApiError::Upsert {
                message: e.to_string(),
                permanent: false,
            })
    }
}

#[cfg(test)]
pub(crate) async fn open_memory() -> anyhow::Result<StatsDb> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let db = StatsDb { pool };
    db.migrate().await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(views: u64) -> StatsPayload {
        StatsPayload {
            views,
            subscribers: 10,
            item_count: 3,
        }
    }

    #[tokio::test]
    async fn active_entities_in_stable_priority_order() {
        let db = open_memory().await.unwrap();
        db.add_entity("UC-b", None, 1).await.unwrap();
        db.add_entity("UC-a", None, 1).await.unwrap();
        db.add_entity("UC-z", Some("first"), 0).await.unwrap();
        db.add_entity("UC-gone", None, 0).await.unwrap();
        db.remove_entity("UC-gone").await.unwrap();

        let tasks = db.list_active_entities().await.unwrap();
        let ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["UC-z", "UC-a", "UC-b"]);
    }

    #[tokio::test]
    async fn remove_unknown_entity_reports_false() {
        let db = open_memory().await.unwrap();
        assert!(!db.remove_entity("UC-missing").await.unwrap());
    }

    #[tokio::test]
    async fn upsert_replaces_latest_and_appends_history() {
        let db = open_memory().await.unwrap();
        db.add_entity("UC1", None, 0).await.unwrap();
        db.upsert("UC1", &payload(100)).await.unwrap();
        db.upsert("UC1", &payload(250)).await.unwrap();

        let latest = db.latest_stats("UC1").await.unwrap().unwrap();
        assert_eq!(latest.views, 250);

        let history: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM entity_stats_history WHERE entity_id = 'UC1'")
                .fetch_one(&db.pool)
                .await
                .map(|row| row.get("n"))
                .unwrap();
        assert_eq!(history, 2);
    }

    #[tokio::test]
    async fn re_adding_reactivates() {
        let db = open_memory().await.unwrap();
        db.add_entity("UC1", None, 5).await.unwrap();
        db.remove_entity("UC1").await.unwrap();
        assert!(db.list_active_entities().await.unwrap().is_empty());
        db.add_entity("UC1", Some("back"), 2).await.unwrap();
        let tasks = db.list_active_entities().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].priority, 2);
    }
}
