//! SQLite implementation of IActionLedger
//!
//! `try_start` is a single upsert whose `DO UPDATE` branch is guarded by
//! `status <> RUNNING`. When another run holds the row, the statement
//! changes nothing and the caller gets the holder's record back.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use pcsync_core::domain::{ActionRecord, ActionStatus, StartOutcome, DB_VERSION_KEY};
use pcsync_core::ports::IActionLedger;

use crate::now_secs;

const SELECT_COLUMNS: &str =
    "SELECT id, action, status, start_time, end_time, create_app, modify_app FROM pcs_action";

/// SQLite-based Action Ledger
pub struct SqliteActionLedger {
    pool: SqlitePool,
    app: String,
}

impl SqliteActionLedger {
    /// Creates a ledger that records `app` as creator and modifier
    pub fn new(pool: SqlitePool, app: impl Into<String>) -> Self {
        Self {
            pool,
            app: app.into(),
        }
    }
}

fn action_record_from_row(row: &SqliteRow) -> ActionRecord {
    ActionRecord {
        row_id: row.get("id"),
        action: row.get("action"),
        status: row.get("status"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        created_by_app: row.get("create_app"),
        modified_by_app: row.get("modify_app"),
    }
}

#[async_trait::async_trait]
impl IActionLedger for SqliteActionLedger {
    #[tracing::instrument(skip(self))]
    async fn try_start(&self, action: &str) -> anyhow::Result<StartOutcome> {
        let running = ActionStatus::Running.code();
        let result = sqlx::query(
            "INSERT INTO pcs_action (action, status, start_time, end_time, create_app, modify_app) \
             VALUES (?, ?, ?, 0, ?, ?) \
             ON CONFLICT(action) DO UPDATE SET \
                status = excluded.status, \
                start_time = excluded.start_time, \
                create_app = excluded.create_app, \
                modify_app = excluded.modify_app \
             WHERE pcs_action.status <> ?",
        )
        .bind(action)
        .bind(running)
        .bind(now_secs())
        .bind(&self.app)
        .bind(&self.app)
        .bind(running)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::debug!(action, app = %self.app, "Action started");
            return Ok(StartOutcome::Started);
        }

        let holder = self
            .get(action)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Action row vanished while starting: {action}"))?;
        tracing::debug!(action, holder = %holder.created_by_app, "Action busy");
        Ok(StartOutcome::Busy(holder))
    }

    #[tracing::instrument(skip(self))]
    async fn finish(&self, action: &str, status: ActionStatus) -> anyhow::Result<()> {
        let now = now_secs();
        let result = sqlx::query(
            "UPDATE pcs_action SET status = ?, end_time = ?, modify_app = ? WHERE action = ?",
        )
        .bind(status.code())
        .bind(now)
        .bind(&self.app)
        .bind(action)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO pcs_action (action, status, start_time, end_time, create_app, modify_app) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(action)
            .bind(status.code())
            .bind(now)
            .bind(now)
            .bind(&self.app)
            .bind(&self.app)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn get(&self, action: &str) -> anyhow::Result<Option<ActionRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE action = ?");
        let row = sqlx::query(&sql)
            .bind(action)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(action_record_from_row))
    }

    async fn remove(&self, action: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM pcs_action WHERE action = ?")
            .bind(action)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_all(&self) -> anyhow::Result<Vec<ActionRecord>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(action_record_from_row).collect())
    }

    async fn reset_running(&self) -> anyhow::Result<u64> {
        let result = sqlx::query("UPDATE pcs_action SET status = ? WHERE status = ? AND action <> ?")
            .bind(ActionStatus::Error.code())
            .bind(ActionStatus::Running.code())
            .bind(DB_VERSION_KEY)
            .execute(&self.pool)
            .await?;

        tracing::info!(rows = result.rows_affected(), "Reset running actions");
        Ok(result.rows_affected())
    }

    async fn schema_version(&self) -> anyhow::Result<i64> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT status FROM pcs_action WHERE action = ?")
                .bind(DB_VERSION_KEY)
                .fetch_optional(&self.pool)
                .await?;
        Ok(version.unwrap_or(0))
    }
}
