//! SQLite-backed checkpoint store (sqlx).
//!
//! One row per cycle in `cycles`, one row per handled entity in
//! `cycle_outcomes` keyed on `(cycle_key, entity_id)`. Appends upsert, so
//! re-recording an outcome is idempotent and a changed outcome overwrites.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

use crate::error::StorageUnavailable;
use crate::model::{CycleKey, EntityId, Outcome};

use super::store::CheckpointStore;
use super::types::{unix_timestamp, CheckpointRecord, FailureRecord};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
pub(crate) fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the SQLite-backed checkpoint database.
///
/// The database file lives under the XDG state directory:
/// `~/.local/state/statsync/checkpoints.db`.
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    pool: Pool<Sqlite>,
}

impl SqliteCheckpointStore {
    /// Open (or create) the default checkpoint database and run migrations.
    pub async fn open_default() -> anyhow::Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("statsync")?;
        let state_dir = xdg_dirs.get_state_home().join("statsync");
        let db_path = state_dir.join("checkpoints.db");

        tokio::fs::create_dir_all(&state_dir).await?;

        let uri = path_to_sqlite_uri(&db_path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;

        let store = SqliteCheckpointStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open (or create) the database at a specific path. Creates parent dirs
    /// if needed. Intended for tests so the DB can live in a temp directory.
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
        let store = SqliteCheckpointStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cycles (
                cycle_key TEXT PRIMARY KEY,
                total INTEGER NOT NULL DEFAULT 0,
                quota_used INTEGER NOT NULL DEFAULT 0,
                started_at INTEGER NOT NULL,
                last_updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cycle_outcomes (
                cycle_key TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                status TEXT NOT NULL,
                reason TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (cycle_key, entity_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, cycle: &CycleKey) -> Result<CheckpointRecord, StorageUnavailable> {
        let mut record = CheckpointRecord::empty(cycle.clone());

        let meta = sqlx::query(
            r#"
            SELECT total, quota_used, started_at, last_updated_at
            FROM cycles
            WHERE cycle_key = ?1
            "#,
        )
        .bind(cycle.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = meta {
            record.total = row.get::<i64, _>("total") as u64;
            record.quota_used = row.get::<i64, _>("quota_used") as u64;
            record.started_at = row.get("started_at");
            record.last_updated_at = row.get("last_updated_at");
        }

        let rows = sqlx::query(
            r#"
            SELECT entity_id, status, reason, attempts, updated_at
            FROM cycle_outcomes
            WHERE cycle_key = ?1
            ORDER BY updated_at ASC, entity_id ASC
            "#,
        )
        .bind(cycle.as_str())
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let id: String = row.get("entity_id");
            let status: String = row.get("status");
            record.completed.insert(id.clone());
            if status == "success" {
                record.success += 1;
            } else {
                record.errors += 1;
                record.failures.push(FailureRecord {
                    id,
                    reason: row.get::<Option<String>, _>("reason").unwrap_or_default(),
                    attempts: row.get::<i64, _>("attempts") as u32,
                    timestamp: row.get("updated_at"),
                });
            }
        }

        Ok(record)
    }

    async fn append(
        &self,
        cycle: &CycleKey,
        entity: &EntityId,
        outcome: &Outcome,
    ) -> Result<(), StorageUnavailable> {
        let now = unix_timestamp();
        let (status, reason, attempts) = match outcome {
            Outcome::Success { attempts, .. } => ("success", None, *attempts),
            Outcome::Failure { reason, attempts } => ("failure", Some(reason.clone()), *attempts),
            // Skipped entities are already in the record.
            Outcome::Skipped => return Ok(()),
        };

        sqlx::query(
            r#"
            INSERT INTO cycle_outcomes (cycle_key, entity_id, status, reason, attempts, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(cycle_key, entity_id) DO UPDATE SET
                status = excluded.status,
                reason = excluded.reason,
                attempts = excluded.attempts,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(cycle.as_str())
        .bind(entity)
        .bind(status)
        .bind(reason)
        .bind(attempts as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_cycle_stats(
        &self,
        cycle: &CycleKey,
        total: u64,
        quota_used: u64,
    ) -> Result<(), StorageUnavailable> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO cycles (cycle_key, total, quota_used, started_at, last_updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(cycle_key) DO UPDATE SET
                total = excluded.total,
                quota_used = excluded.quota_used,
                last_updated_at = excluded.last_updated_at
            "#,
        )
        .bind(cycle.as_str())
        .bind(total as i64)
        .bind(quota_used as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn flush(&self, _cycle: &CycleKey) -> Result<(), StorageUnavailable> {
        // Appends auto-commit; the barrier just has to surface a store that
        // went away before the scheduler reports the batch durable.
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) async fn open_memory() -> anyhow::Result<SqliteCheckpointStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let store = SqliteCheckpointStore { pool };
    store.migrate().await?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatsPayload;

    fn payload() -> StatsPayload {
        StatsPayload {
            views: 100,
            subscribers: 10,
            item_count: 5,
        }
    }

    #[tokio::test]
    async fn load_missing_cycle_is_empty() {
        let store = open_memory().await.unwrap();
        let rec = store.load(&CycleKey::new("2026-08-27")).await.unwrap();
        assert!(rec.completed.is_empty());
        assert_eq!(rec.total, 0);
    }

    #[tokio::test]
    async fn append_and_reload() {
        let store = open_memory().await.unwrap();
        let cycle = CycleKey::new("2026-08-27");
        store
            .append(
                &cycle,
                &"UC1".to_string(),
                &Outcome::Success {
                    payload: payload(),
                    attempts: 1,
                },
            )
            .await
            .unwrap();
        store
            .append(
                &cycle,
                &"UC2".to_string(),
                &Outcome::Failure {
                    reason: "HTTP 404".into(),
                    attempts: 1,
                },
            )
            .await
            .unwrap();
        store.record_cycle_stats(&cycle, 5, 2).await.unwrap();
        store.flush(&cycle).await.unwrap();

        let rec = store.load(&cycle).await.unwrap();
        assert_eq!(rec.completed.len(), 2);
        assert!(rec.is_completed("UC1"));
        assert!(rec.is_completed("UC2"));
        assert_eq!(rec.success, 1);
        assert_eq!(rec.errors, 1);
        assert_eq!(rec.total, 5);
        assert_eq!(rec.quota_used, 2);
        assert_eq!(rec.failures.len(), 1);
        assert_eq!(rec.failures[0].id, "UC2");
        assert_eq!(rec.failures[0].reason, "HTTP 404");
    }

    #[tokio::test]
    async fn append_is_idempotent_and_last_write_wins() {
        let store = open_memory().await.unwrap();
        let cycle = CycleKey::new("2026-08-27");
        let id = "UC1".to_string();
        let fail = Outcome::Failure {
            reason: "HTTP 500".into(),
            attempts: 3,
        };
        store.append(&cycle, &id, &fail).await.unwrap();
        store.append(&cycle, &id, &fail).await.unwrap();
        let rec = store.load(&cycle).await.unwrap();
        assert_eq!(rec.completed.len(), 1);
        assert_eq!(rec.errors, 1);

        // A later success for the same entity overwrites the failure.
        store
            .append(
                &cycle,
                &id,
                &Outcome::Success {
                    payload: payload(),
                    attempts: 1,
                },
            )
            .await
            .unwrap();
        let rec = store.load(&cycle).await.unwrap();
        assert_eq!(rec.completed.len(), 1);
        assert_eq!(rec.success, 1);
        assert_eq!(rec.errors, 0);
        assert!(rec.failures.is_empty());
    }

    #[tokio::test]
    async fn skipped_outcomes_are_not_persisted() {
        let store = open_memory().await.unwrap();
        let cycle = CycleKey::new("2026-08-27");
        store
            .append(&cycle, &"UC1".to_string(), &Outcome::Skipped)
            .await
            .unwrap();
        let rec = store.load(&cycle).await.unwrap();
        assert!(rec.completed.is_empty());
    }

    #[tokio::test]
    async fn cycles_are_isolated_by_key() {
        let store = open_memory().await.unwrap();
        let day1 = CycleKey::new("2026-08-26");
        let day2 = CycleKey::new("2026-08-27");
        store
            .append(
                &day1,
                &"UC1".to_string(),
                &Outcome::Success {
                    payload: payload(),
                    attempts: 1,
                },
            )
            .await
            .unwrap();
        let rec = store.load(&day2).await.unwrap();
        assert!(rec.completed.is_empty());
    }

    #[tokio::test]
    async fn on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.db");
        let cycle = CycleKey::new("2026-08-27");
        {
            let store = SqliteCheckpointStore::open_at(&path).await.unwrap();
            store
                .append(
                    &cycle,
                    &"UC1".to_string(),
                    &Outcome::Success {
                        payload: payload(),
                        attempts: 2,
                    },
                )
                .await
                .unwrap();
            store.flush(&cycle).await.unwrap();
        }
        let store = SqliteCheckpointStore::open_at(&path).await.unwrap();
        let rec = store.load(&cycle).await.unwrap();
        assert!(rec.is_completed("UC1"));
        assert_eq!(rec.success, 1);
    }
}
