//! SQLite implementation of ICacheRepository
//!
//! One row per remote path. Subtree queries use `path LIKE ? ESCAPE '\'`
//! with the pattern built by [`RemotePath::subtree_pattern`], which adds the
//! `/` boundary and escapes wildcards inside the path.
//!
//! ## Type Mapping
//!
//! | Domain Type  | SQL Type | Strategy                              |
//! |--------------|----------|---------------------------------------|
//! | RemotePath   | TEXT     | `.as_str()` / `RemotePath::new()`     |
//! | bool         | INTEGER  | 0 / 1                                 |
//! | SyncFlag     | INTEGER  | `SyncFlag::code()` / `from_code()`    |
//! | timestamps   | INTEGER  | seconds since the Unix epoch          |

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use pcsync_core::domain::{CacheEntry, RemoteEntry, RemotePath, SyncFlag};
use pcsync_core::ports::{ICacheRepository, SubtreeOrder};

use crate::{now_secs, CacheError};

const SELECT_COLUMNS: &str = "SELECT fs_id, path, server_filename, server_ctime, server_mtime, \
     size, category, isdir, dir_empty, empty, md5, dlink, has_subdir, \
     update_time, update_app, flag FROM pcs_cache";

/// SQLite-based remote metadata cache
pub struct SqliteCacheRepository {
    pool: SqlitePool,
    app: String,
}

impl SqliteCacheRepository {
    /// Creates a repository that stamps rows with `app`
    pub fn new(pool: SqlitePool, app: impl Into<String>) -> Self {
        Self {
            pool,
            app: app.into(),
        }
    }

    async fn fetch_many(&self, sql: &str, pattern: &str) -> anyhow::Result<Vec<CacheEntry>> {
        let rows = sqlx::query(sql).bind(pattern).fetch_all(&self.pool).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(cache_entry_from_row(row)?);
        }
        Ok(entries)
    }
}

fn cache_entry_from_row(row: &SqliteRow) -> Result<CacheEntry, CacheError> {
    let path_str: String = row.get("path");
    let path = RemotePath::new(path_str.clone())
        .map_err(|e| CacheError::CorruptRow(format!("{path_str}: {e}")))?;

    let meta = RemoteEntry {
        path,
        fs_id: row.get("fs_id"),
        server_filename: row.get("server_filename"),
        server_ctime: row.get("server_ctime"),
        server_mtime: row.get("server_mtime"),
        size: row.get("size"),
        category: row.get("category"),
        is_dir: row.get::<i64, _>("isdir") != 0,
        dir_empty: row.get::<i64, _>("dir_empty") != 0,
        empty: row.get::<i64, _>("empty") != 0,
        md5: row.get("md5"),
        download_link: row.get("dlink"),
        has_subdir: row.get::<i64, _>("has_subdir") != 0,
    };

    Ok(CacheEntry {
        meta,
        update_time: row.get("update_time"),
        updating_app: row.get("update_app"),
        flag: SyncFlag::from_code(row.get("flag")),
    })
}

// ============================================================================
// ICacheRepository implementation
// ============================================================================

#[async_trait::async_trait]
impl ICacheRepository for SqliteCacheRepository {
    async fn get(&self, path: &RemotePath) -> anyhow::Result<Option<CacheEntry>> {
        let sql = format!("{SELECT_COLUMNS} WHERE path = ?");
        let row = sqlx::query(&sql)
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(cache_entry_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn add(&self, entry: &RemoteEntry, flag: SyncFlag) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO pcs_cache \
             (fs_id, path, server_filename, server_ctime, server_mtime, size, category, \
              isdir, dir_empty, empty, md5, dlink, has_subdir, update_time, update_app, flag) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.fs_id)
        .bind(entry.path.as_str())
        .bind(&entry.server_filename)
        .bind(entry.server_ctime)
        .bind(entry.server_mtime)
        .bind(entry.size)
        .bind(entry.category)
        .bind(i64::from(entry.is_dir))
        .bind(i64::from(entry.dir_empty))
        .bind(i64::from(entry.empty))
        .bind(&entry.md5)
        .bind(&entry.download_link)
        .bind(i64::from(entry.has_subdir))
        .bind(now_secs())
        .bind(&self.app)
        .bind(flag.code())
        .execute(&self.pool)
        .await?;

        tracing::trace!(path = %entry.path, "Added cache entry");
        Ok(())
    }

    async fn update(&self, entry: &RemoteEntry, flag: SyncFlag) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE pcs_cache SET fs_id = ?, server_filename = ?, server_ctime = ?, \
             server_mtime = ?, size = ?, category = ?, isdir = ?, dir_empty = ?, empty = ?, \
             md5 = ?, dlink = ?, has_subdir = ?, update_time = ?, update_app = ?, flag = ? \
             WHERE path = ?",
        )
        .bind(entry.fs_id)
        .bind(&entry.server_filename)
        .bind(entry.server_ctime)
        .bind(entry.server_mtime)
        .bind(entry.size)
        .bind(entry.category)
        .bind(i64::from(entry.is_dir))
        .bind(i64::from(entry.dir_empty))
        .bind(i64::from(entry.empty))
        .bind(&entry.md5)
        .bind(&entry.download_link)
        .bind(i64::from(entry.has_subdir))
        .bind(now_secs())
        .bind(&self.app)
        .bind(flag.code())
        .bind(entry.path.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return self.add(entry, flag).await;
        }

        tracing::trace!(path = %entry.path, "Updated cache entry");
        Ok(())
    }

    async fn remove_one(&self, path: &RemotePath) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM pcs_cache WHERE path = ?")
            .bind(path.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn remove_subtree(&self, path: &RemotePath) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM pcs_cache WHERE path LIKE ? ESCAPE '\\'")
            .bind(path.subtree_pattern())
            .execute(&self.pool)
            .await?;

        tracing::debug!(path = %path, removed = result.rows_affected(), "Cleared cached subtree");
        Ok(result.rows_affected())
    }

    async fn set_flag(&self, path: &RemotePath, flag: SyncFlag) -> anyhow::Result<u64> {
        let result =
            sqlx::query("UPDATE pcs_cache SET flag = ?, update_time = ?, update_app = ? WHERE path = ?")
                .bind(flag.code())
                .bind(now_secs())
                .bind(&self.app)
                .bind(path.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn set_flags_for_subtree(
        &self,
        path: &RemotePath,
        flag: SyncFlag,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE pcs_cache SET flag = ?, update_time = ?, update_app = ? \
             WHERE path LIKE ? ESCAPE '\\'",
        )
        .bind(flag.code())
        .bind(now_secs())
        .bind(&self.app)
        .bind(path.subtree_pattern())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_subtree(
        &self,
        path: &RemotePath,
        order: SubtreeOrder,
    ) -> anyhow::Result<Vec<CacheEntry>> {
        let order_by = match order {
            SubtreeOrder::ByPath => "path",
            SubtreeOrder::DirsFirst => "isdir DESC, path",
        };
        let sql = format!("{SELECT_COLUMNS} WHERE path LIKE ? ESCAPE '\\' ORDER BY {order_by}");
        self.fetch_many(&sql, &path.subtree_pattern()).await
    }

    async fn list_untracked(&self, path: &RemotePath) -> anyhow::Result<Vec<CacheEntry>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE path LIKE ? ESCAPE '\\' AND (flag & 1) = 0 ORDER BY path"
        );
        self.fetch_many(&sql, &path.subtree_pattern()).await
    }

    async fn count(&self) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pcs_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
