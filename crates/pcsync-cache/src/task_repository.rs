//! SQLite implementation of ITaskRepository

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use pcsync_core::domain::{Method, TaskRecord, TaskRun, TaskStatus};
use pcsync_core::ports::ITaskRepository;

use crate::CacheError;

const SELECT_COLUMNS: &str = "SELECT id, method, enabled, md5, last_run_time, next_run_time, \
     schedule, interval_secs, local_path, remote_path, status, result, start_time, end_time, \
     elapsed FROM pcs_task";

/// SQLite-based task table
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn task_record_from_row(row: &SqliteRow) -> Result<TaskRecord, CacheError> {
    let method_code: i64 = row.get("method");
    let method = Method::from_code(method_code)
        .map_err(|e| CacheError::CorruptRow(format!("pcs_task.method: {e}")))?;

    Ok(TaskRecord {
        id: row.get("id"),
        method,
        enabled: row.get::<i64, _>("enabled") != 0,
        md5_enabled: row.get::<i64, _>("md5") != 0,
        schedule_offset_secs: row.get("schedule"),
        interval_secs: row.get("interval_secs"),
        local_path: row.get("local_path"),
        remote_path: row.get("remote_path"),
        last_run_time: row.get("last_run_time"),
        next_run_time: row.get("next_run_time"),
        status: TaskStatus::from_code(row.get("status")),
        result: TaskStatus::from_code(row.get("result")),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        elapsed_secs: row.get("elapsed"),
    })
}

#[async_trait::async_trait]
impl ITaskRepository for SqliteTaskRepository {
    async fn find_by_signature(
        &self,
        method: Method,
        local_path: &str,
        remote_path: &str,
    ) -> anyhow::Result<Option<TaskRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE method = ? AND local_path = ? AND remote_path = ?");
        let row = sqlx::query(&sql)
            .bind(method.code())
            .bind(local_path)
            .bind(remote_path)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(task_record_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn rebuild(&self, tasks: &[TaskRecord]) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM pcs_task")
            .execute(&self.pool)
            .await?;

        for task in tasks {
            sqlx::query(
                "INSERT INTO pcs_task \
                 (id, method, enabled, md5, last_run_time, next_run_time, schedule, interval_secs, \
                  local_path, remote_path, status, result, start_time, end_time, elapsed) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(task.id)
            .bind(task.method.code())
            .bind(i64::from(task.enabled))
            .bind(i64::from(task.md5_enabled))
            .bind(task.last_run_time)
            .bind(task.next_run_time)
            .bind(task.schedule_offset_secs)
            .bind(task.interval_secs)
            .bind(&task.local_path)
            .bind(&task.remote_path)
            .bind(task.status.code())
            .bind(task.result.code())
            .bind(task.start_time)
            .bind(task.end_time)
            .bind(task.elapsed_secs)
            .execute(&self.pool)
            .await?;
        }

        tracing::debug!(count = tasks.len(), "Rebuilt task table");
        Ok(())
    }

    async fn mark_running(&self, id: i64, start_time: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE pcs_task SET status = ?, start_time = ? WHERE id = ?")
            .bind(TaskStatus::Running.code())
            .bind(start_time)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_run(&self, id: i64, run: &TaskRun) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE pcs_task SET enabled = ?, last_run_time = ?, next_run_time = ?, status = ?, \
             result = ?, start_time = ?, end_time = ?, elapsed = ? WHERE id = ?",
        )
        .bind(i64::from(run.enabled))
        .bind(run.last_run_time)
        .bind(run.next_run_time)
        .bind(run.result.code())
        .bind(run.result.code())
        .bind(run.start_time)
        .bind(run.end_time)
        .bind(run.end_time - run.start_time)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_all(&self) -> anyhow::Result<Vec<TaskRecord>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            tasks.push(task_record_from_row(row)?);
        }
        Ok(tasks)
    }
}
