//! Wiring shared by the commands
//!
//! Resolves the session and cache file paths from the global options (or the
//! configuration file), opens the metadata store and builds a [`SyncEngine`]
//! over the bundled remote storage adapter.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use pcsync_cache::{DatabasePool, SqliteActionLedger, SqliteCacheRepository, SqliteTaskRepository};
use pcsync_core::config::{Config, SecureMethod};
use pcsync_core::domain::{RemotePath, APP_NAME};
use pcsync_core::ports::IRemoteStorage;
use pcsync_remote::MirrorRemoteStorage;
use pcsync_sync::{LocalFileSystemAdapter, SyncEngine};
use tracing::info;

/// Options accepted by every command
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Configuration file (JSON, or YAML by extension)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Session file of the remote storage
    #[arg(long, global = true, value_name = "FILE")]
    pub cookie: Option<PathBuf>,

    /// SQLite metadata store
    #[arg(long, global = true, value_name = "FILE")]
    pub cache: Option<PathBuf>,

    /// Session protection: plaintext, aes-cbc-128, aes-cbc-192 or aes-cbc-256
    #[arg(long, global = true, value_name = "METHOD")]
    pub secure_method: Option<String>,

    /// Key for the AES session protection methods
    #[arg(long, global = true, value_name = "KEY")]
    pub secure_key: Option<String>,
}

impl GlobalArgs {
    /// Configuration named by `--config`, if any
    fn load_config(&self) -> Result<Option<Config>> {
        match &self.config {
            Some(path) => Ok(Some(Config::load(path)?)),
            None => Ok(None),
        }
    }

    /// Session file: `--cookie`, then the configuration, then the default
    pub fn cookie_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cookie {
            return Ok(path.clone());
        }
        Ok(self
            .load_config()?
            .map(|c| c.cookie_file_path)
            .unwrap_or_else(Config::default_cookie_path))
    }

    /// Metadata store: `--cache`, then the configuration, then the default
    pub fn cache_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cache {
            return Ok(path.clone());
        }
        Ok(self
            .load_config()?
            .map(|c| c.cache_file_path)
            .unwrap_or_else(Config::default_cache_path))
    }

    /// Checks `--secure-method`/`--secure-key`
    ///
    /// The bundled adapter stores its session in plain text, so a valid
    /// method is only recorded in the log.
    pub fn check_secure(&self) -> Result<()> {
        let Some(method) = self.secure_method.as_deref().filter(|m| !m.is_empty()) else {
            return Ok(());
        };
        let Some(parsed) = SecureMethod::parse(method) else {
            bail!("Invalid secure method '{method}'");
        };
        if parsed.needs_key() && self.secure_key.as_deref().map_or(true, str::is_empty) {
            bail!("--secure-key is required for secure method '{method}'");
        }
        info!(method, "Session protection requested");
        Ok(())
    }
}

/// Parses a remote path argument
pub fn remote_arg(value: &str) -> Result<RemotePath> {
    RemotePath::new(value).with_context(|| format!("Invalid remote path '{value}'"))
}

/// Opens the metadata store at `path`
pub async fn open_store(path: &Path) -> Result<DatabasePool> {
    DatabasePool::new(path)
        .await
        .with_context(|| format!("Failed to open metadata store {}", path.display()))
}

/// Everything a sync command needs
pub struct AppContext {
    pub remote: Arc<dyn IRemoteStorage>,
    pub cache: Arc<SqliteCacheRepository>,
    pub ledger: Arc<SqliteActionLedger>,
    pub tasks: Arc<SqliteTaskRepository>,
    pub engine: Arc<SyncEngine>,
}

impl AppContext {
    /// Store-only context; the remote storage stays logged out
    pub async fn store_only(args: &GlobalArgs) -> Result<Self> {
        let pool = open_store(&args.cache_path()?).await?;
        let remote = Arc::new(MirrorRemoteStorage::default());
        Ok(Self::assemble(pool, remote, APP_NAME))
    }

    /// Full context for commands that talk to the remote storage
    pub async fn open(args: &GlobalArgs) -> Result<Self> {
        args.check_secure()?;
        let cookie = args.cookie_path()?;
        let pool = open_store(&args.cache_path()?).await?;
        let remote = Arc::new(MirrorRemoteStorage::open(&cookie));
        Ok(Self::assemble(pool, remote, APP_NAME))
    }

    /// Context for the service, recording `app` as the ledger writer
    pub async fn for_service(config: &Config, app: &str) -> Result<Self> {
        let pool = open_store(&config.cache_file_path).await?;
        let remote = Arc::new(MirrorRemoteStorage::open(&config.cookie_file_path));
        Ok(Self::assemble(pool, remote, app))
    }

    fn assemble(pool: DatabasePool, remote: Arc<MirrorRemoteStorage>, app: &str) -> Self {
        let cache = Arc::new(SqliteCacheRepository::new(pool.pool().clone(), app));
        let ledger = Arc::new(SqliteActionLedger::new(pool.pool().clone(), app));
        let tasks = Arc::new(SqliteTaskRepository::new(pool.pool().clone()));
        let local = Arc::new(LocalFileSystemAdapter::new());
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&remote) as _,
            local,
            Arc::clone(&cache) as _,
            Arc::clone(&ledger) as _,
        ));
        Self {
            remote,
            cache,
            ledger,
            tasks,
            engine,
        }
    }
}
