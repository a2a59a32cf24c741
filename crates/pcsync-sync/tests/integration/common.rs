//! Shared test helpers: in-memory remote storage and a wired-up engine
//!
//! [`MemoryRemote`] keeps the remote tree in a map keyed by remote path and
//! counts every call the engine makes, so tests can assert on paging and
//! batching. [`Harness`] wires it to a temporary local directory and an
//! in-memory metadata store.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail};
use filetime::FileTime;
use tempfile::TempDir;

use pcsync_cache::{DatabasePool, SqliteActionLedger, SqliteCacheRepository};
use pcsync_core::domain::{RemoteEntry, RemotePath};
use pcsync_core::ports::{DeleteOutcome, IRemoteStorage, Quota};
use pcsync_sync::{LocalFileSystemAdapter, SyncEngine};

pub const GIB: i64 = 1024 * 1024 * 1024;

// ============================================================================
// MemoryRemote
// ============================================================================

#[derive(Debug, Clone)]
struct Node {
    is_dir: bool,
    content: Vec<u8>,
    mtime: i64,
    fs_id: i64,
}

#[derive(Debug)]
struct RemoteState {
    nodes: BTreeMap<String, Node>,
    next_id: i64,
}

/// Remote storage double backed by a map
pub struct MemoryRemote {
    logged_in: bool,
    quota_total: i64,
    state: Mutex<RemoteState>,
    broken_downloads: Mutex<Vec<String>>,
    pub list_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub mkdir_calls: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            Node {
                is_dir: true,
                content: Vec::new(),
                mtime: 1_000,
                fs_id: 100,
            },
        );
        Self {
            logged_in: true,
            quota_total: GIB,
            state: Mutex::new(RemoteState { nodes, next_id: 101 }),
            broken_downloads: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            mkdir_calls: AtomicUsize::new(0),
        }
    }

    pub fn logged_out() -> Self {
        Self {
            logged_in: false,
            ..Self::new()
        }
    }

    pub fn with_quota(total: i64) -> Self {
        Self {
            quota_total: total,
            ..Self::new()
        }
    }

    fn insert(state: &mut RemoteState, path: &str, is_dir: bool, content: Vec<u8>, mtime: i64) {
        let mut parent = RemotePath::new(path).unwrap().parent();
        while let Some(dir) = parent {
            if !state.nodes.contains_key(dir.as_str()) {
                let fs_id = state.next_id;
                state.next_id += 1;
                state.nodes.insert(
                    dir.as_str().to_string(),
                    Node {
                        is_dir: true,
                        content: Vec::new(),
                        mtime,
                        fs_id,
                    },
                );
            }
            parent = dir.parent();
        }
        let fs_id = state.next_id;
        state.next_id += 1;
        state.nodes.insert(
            path.to_string(),
            Node {
                is_dir,
                content,
                mtime,
                fs_id,
            },
        );
    }

    /// Adds a directory and any missing parents
    pub fn add_dir(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        Self::insert(&mut state, path, true, Vec::new(), 1_000);
    }

    /// Adds a file and any missing parents
    pub fn add_file(&self, path: &str, content: &[u8], mtime: i64) {
        let mut state = self.state.lock().unwrap();
        Self::insert(&mut state, path, false, content.to_vec(), mtime);
    }

    /// Removes an object behind the engine's back
    pub fn drop_path(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        let prefix = format!("{path}/");
        state
            .nodes
            .retain(|key, _| key != path && !key.starts_with(&prefix));
    }

    /// Makes downloads of `path` write half the content, then fail
    pub fn break_download(&self, path: &str) {
        self.broken_downloads.lock().unwrap().push(path.to_string());
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().nodes.contains_key(path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .nodes
            .get(path)
            .map_or(false, |n| n.is_dir)
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .get(path)
            .filter(|n| !n.is_dir)
            .map(|n| n.content.clone())
    }

    pub fn mtime(&self, path: &str) -> Option<i64> {
        self.state.lock().unwrap().nodes.get(path).map(|n| n.mtime)
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn entry(path: &str, node: &Node) -> RemoteEntry {
        let path = RemotePath::new(path).unwrap();
        RemoteEntry {
            server_filename: path.file_name().unwrap_or_default().to_string(),
            path,
            fs_id: node.fs_id,
            server_ctime: node.mtime,
            server_mtime: node.mtime,
            size: node.content.len() as i64,
            category: if node.is_dir { 6 } else { 4 },
            is_dir: node.is_dir,
            dir_empty: false,
            empty: node.content.is_empty(),
            md5: (!node.is_dir).then(|| format!("{:x}", md5::compute(&node.content))),
            download_link: None,
            has_subdir: false,
        }
    }
}

#[async_trait::async_trait]
impl IRemoteStorage for MemoryRemote {
    async fn is_logged_in(&self) -> anyhow::Result<bool> {
        Ok(self.logged_in)
    }

    async fn user_id(&self) -> anyhow::Result<String> {
        Ok("tester".to_string())
    }

    async fn quota(&self) -> anyhow::Result<Quota> {
        let state = self.state.lock().unwrap();
        let used = state.nodes.values().map(|n| n.content.len() as i64).sum();
        Ok(Quota {
            used,
            total: self.quota_total,
        })
    }

    async fn meta(&self, path: &RemotePath) -> anyhow::Result<Option<RemoteEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .nodes
            .get(path.as_str())
            .map(|node| Self::entry(path.as_str(), node)))
    }

    async fn list(
        &self,
        path: &RemotePath,
        page: u32,
        page_size: u32,
    ) -> anyhow::Result<Vec<RemoteEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        match state.nodes.get(path.as_str()) {
            Some(node) if node.is_dir => {}
            Some(_) => bail!("not a directory: {path}"),
            None => bail!("not found: {path}"),
        }

        let skip = (page.max(1) as usize - 1) * page_size as usize;
        Ok(state
            .nodes
            .iter()
            .filter(|(key, _)| {
                RemotePath::new(key.as_str())
                    .ok()
                    .and_then(|p| p.parent())
                    .is_some_and(|parent| parent == *path)
            })
            .skip(skip)
            .take(page_size as usize)
            .map(|(key, node)| Self::entry(key, node))
            .collect())
    }

    async fn mkdir(&self, path: &RemotePath) -> anyhow::Result<()> {
        self.mkdir_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(node) = state.nodes.get(path.as_str()) {
            if !node.is_dir {
                bail!("a file exists at {path}");
            }
            return Ok(());
        }
        Self::insert(&mut state, path.as_str(), true, Vec::new(), 1_000);
        Ok(())
    }

    async fn upload(
        &self,
        local: &Path,
        remote: &RemotePath,
        overwrite: bool,
        local_mtime: i64,
    ) -> anyhow::Result<RemoteEntry> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let content = tokio::fs::read(local).await?;
        let mut state = self.state.lock().unwrap();
        if let Some(node) = state.nodes.get(remote.as_str()) {
            if node.is_dir || !overwrite {
                bail!("cannot overwrite {remote}");
            }
        }
        Self::insert(&mut state, remote.as_str(), false, content, local_mtime);
        let node = state
            .nodes
            .get(remote.as_str())
            .ok_or_else(|| anyhow!("upload lost {remote}"))?;
        Ok(Self::entry(remote.as_str(), node))
    }

    async fn download(&self, remote: &RemotePath, dest: &Path) -> anyhow::Result<()> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let content = self
            .content(remote.as_str())
            .ok_or_else(|| anyhow!("not found: {remote}"))?;
        let broken = self
            .broken_downloads
            .lock()
            .unwrap()
            .iter()
            .any(|p| p == remote.as_str());
        if broken {
            tokio::fs::write(dest, &content[..content.len() / 2]).await?;
            bail!("connection reset while downloading {remote}");
        }
        tokio::fs::write(dest, content).await?;
        Ok(())
    }

    async fn delete(&self, paths: &[RemotePath]) -> anyhow::Result<Vec<DeleteOutcome>> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            if path.is_root() {
                outcomes.push(DeleteOutcome::failed(path.clone(), "cannot delete the root"));
            } else if self.exists(path.as_str()) {
                self.drop_path(path.as_str());
                outcomes.push(DeleteOutcome::ok(path.clone()));
            } else {
                outcomes.push(DeleteOutcome::failed(path.clone(), "not found"));
            }
        }
        Ok(outcomes)
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Engine wired to a [`MemoryRemote`], a temp dir and an in-memory store
pub struct Harness {
    pub remote: Arc<MemoryRemote>,
    pub cache: Arc<SqliteCacheRepository>,
    pub ledger: Arc<SqliteActionLedger>,
    pub engine: SyncEngine,
    pub dir: TempDir,
    _pool: DatabasePool,
}

impl Harness {
    /// Path inside the temporary directory
    pub fn local(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }
}

pub async fn setup() -> Harness {
    setup_with(MemoryRemote::new()).await
}

pub async fn setup_with(remote: MemoryRemote) -> Harness {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let remote = Arc::new(remote);
    let cache = Arc::new(SqliteCacheRepository::new(pool.pool().clone(), "pcsync"));
    let ledger = Arc::new(SqliteActionLedger::new(pool.pool().clone(), "pcsync"));
    let engine = SyncEngine::new(
        remote.clone(),
        Arc::new(LocalFileSystemAdapter::new()),
        cache.clone(),
        ledger.clone(),
    );

    Harness {
        remote,
        cache,
        ledger,
        engine,
        dir: TempDir::new().expect("Failed to create temp dir"),
        _pool: pool,
    }
}

pub fn rp(path: &str) -> RemotePath {
    RemotePath::new(path).unwrap()
}

/// Writes `content` to `path` (creating parents) and sets its mtime
pub fn write_file(path: &Path, content: &[u8], mtime: i64) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
    filetime::set_file_mtime(path, FileTime::from_unix_time(mtime, 0)).unwrap();
}

pub fn mtime_of(path: &Path) -> i64 {
    let metadata = std::fs::metadata(path).unwrap();
    FileTime::from_last_modification_time(&metadata).unix_seconds()
}
