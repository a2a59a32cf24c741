//! Task scheduler - runs configured items on a fixed daily timetable
//!
//! Each item starts at local midnight plus its `schedule` offset and repeats
//! every `interval`. The scheduler ticks once per second and runs due items
//! one after another, in configuration order.
//!
//! ## Flow
//!
//! ```text
//! tick ──→ due item? ──→ task table: RUNNING ──→ TaskRunner::run (retry once)
//!                                                     │
//!                         task table: result ←── next_run += interval
//! ```
//!
//! A start time already in the past at daemon start is pushed one interval
//! forward, so missed runs are caught up at most once. An interval of zero
//! makes the item run once and then disables it.
//!
//! Cancellation is only observed between ticks: an item that already started
//! runs to completion.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeZone, Utc};
use pcsync_core::config::ScheduledItem;
use pcsync_core::domain::schedule::{format_timestamp, initial_next_run};
use pcsync_core::domain::{Method, RemotePath, TaskRecord, TaskRun, TaskStatus};
use pcsync_core::ports::ITaskRepository;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::SyncEngine;
use crate::{SyncError, SyncResult};

/// Default time between two checks for due items
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

// ============================================================================
// TaskRunner
// ============================================================================

/// Executes one configured item
///
/// Implemented by [`SyncEngine`]; tests substitute their own runner.
#[async_trait::async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, item: &ScheduledItem) -> SyncResult<()>;
}

fn item_paths(item: &ScheduledItem) -> SyncResult<(&Path, &RemotePath)> {
    match (item.local_path.as_deref(), item.remote_path.as_ref()) {
        (Some(local), Some(remote)) => Ok((local, remote)),
        _ => Err(SyncError::Config(format!(
            "item {} ({}) needs localPath and remotePath",
            item.id, item.method
        ))),
    }
}

#[async_trait::async_trait]
impl TaskRunner for SyncEngine {
    async fn run(&self, item: &ScheduledItem) -> SyncResult<()> {
        match item.method {
            Method::Update => {
                let remote = item.remote_path.as_ref().ok_or_else(|| {
                    SyncError::Config(format!("item {} (update) needs remotePath", item.id))
                })?;
                self.update(remote).await.map(|_| ())
            }
            Method::Backup => {
                let (local, remote) = item_paths(item)?;
                self.backup(local, remote, item.md5).await.map(|_| ())
            }
            Method::Restore => {
                let (local, remote) = item_paths(item)?;
                self.restore(local, remote, item.md5).await.map(|_| ())
            }
            Method::Combine => {
                let (local, remote) = item_paths(item)?;
                self.combine(local, remote, item.md5).await.map(|_| ())
            }
            Method::Reset => self.reset().await.map(|_| ()),
        }
    }
}

// ============================================================================
// ScheduleEntry
// ============================================================================

/// In-memory timetable state of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub item: ScheduledItem,
    pub enabled: bool,
    pub last_run_time: i64,
    pub next_run_time: i64,
}

impl ScheduleEntry {
    fn local_path(&self) -> String {
        self.item
            .local_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    fn remote_path(&self) -> String {
        self.item
            .remote_path
            .as_ref()
            .map(|p| p.as_str().to_string())
            .unwrap_or_default()
    }

    fn to_record(&self) -> TaskRecord {
        TaskRecord {
            id: self.item.id,
            method: self.item.method,
            enabled: self.enabled,
            md5_enabled: self.item.md5,
            schedule_offset_secs: self.item.schedule_secs,
            interval_secs: self.item.interval_secs,
            local_path: self.local_path(),
            remote_path: self.remote_path(),
            last_run_time: self.last_run_time,
            next_run_time: self.next_run_time,
            status: TaskStatus::Never,
            result: TaskStatus::Never,
            start_time: 0,
            end_time: 0,
            elapsed_secs: 0,
        }
    }

    fn is_due(&self, now: i64) -> bool {
        self.enabled && now >= self.next_run_time
    }

    /// Moves the timetable past a run that started at `started`
    fn advance(&mut self, started: i64) {
        self.last_run_time = started;
        if self.item.interval_secs > 0 {
            self.next_run_time += self.item.interval_secs;
        } else {
            self.enabled = false;
        }
    }
}

// ============================================================================
// TaskScheduler
// ============================================================================

/// Runs configured items when they fall due and records every run in the
/// task table
pub struct TaskScheduler {
    runner: Arc<dyn TaskRunner>,
    tasks: Arc<dyn ITaskRepository>,
    entries: Vec<ScheduleEntry>,
    tick: Duration,
}

impl TaskScheduler {
    /// Creates a scheduler whose first run times are computed from the local
    /// clock
    ///
    /// # Arguments
    /// * `runner` - Executes the items (normally the [`SyncEngine`])
    /// * `tasks` - Task table of the metadata store
    /// * `items` - Validated items in configuration order
    pub fn new(
        runner: Arc<dyn TaskRunner>,
        tasks: Arc<dyn ITaskRepository>,
        items: Vec<ScheduledItem>,
    ) -> Self {
        Self::new_at(runner, tasks, items, &Local::now())
    }

    /// Same as [`TaskScheduler::new`] with an explicit start time
    pub fn new_at<Tz: TimeZone>(
        runner: Arc<dyn TaskRunner>,
        tasks: Arc<dyn ITaskRepository>,
        items: Vec<ScheduledItem>,
        now: &DateTime<Tz>,
    ) -> Self {
        let entries = items
            .into_iter()
            .map(|item| ScheduleEntry {
                enabled: item.enabled,
                last_run_time: 0,
                next_run_time: initial_next_run(item.schedule_secs, item.interval_secs, now),
                item,
            })
            .collect();

        Self {
            runner,
            tasks,
            entries,
            tick: DEFAULT_TICK,
        }
    }

    /// Overrides the time between two checks for due items
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Replaces the task table with the current items
    ///
    /// A row of the previous table with the same method and paths hands its
    /// run history (status, result, times) to the new row.
    pub async fn rebuild_table(&mut self) -> anyhow::Result<()> {
        let mut records = Vec::with_capacity(self.entries.len());
        for entry in &mut self.entries {
            let mut record = entry.to_record();
            let previous = self
                .tasks
                .find_by_signature(entry.item.method, &record.local_path, &record.remote_path)
                .await?;
            if let Some(previous) = previous {
                record.inherit_history(&previous);
                entry.last_run_time = previous.last_run_time;
            }
            records.push(record);
        }

        self.tasks.rebuild(&records).await?;
        info!(tasks = records.len(), "Task table rebuilt");
        Ok(())
    }

    /// Runs every enabled item whose next run time is not after `now`
    ///
    /// # Returns
    /// Number of items that were run
    pub async fn run_due(&mut self, now: i64) -> usize {
        let mut ran = 0;
        for index in 0..self.entries.len() {
            if !self.entries[index].is_due(now) {
                continue;
            }
            self.run_entry(index, now).await;
            ran += 1;
        }
        ran
    }

    async fn run_entry(&mut self, index: usize, now: i64) {
        let item = self.entries[index].item.clone();
        info!(id = item.id, method = %item.method, "Task started");

        if let Err(e) = self.tasks.mark_running(item.id, now).await {
            warn!(id = item.id, error = %format!("{e:#}"), "Cannot mark task running");
        }

        let started = Instant::now();
        let outcome = self.execute(&item).await;
        let end = now + started.elapsed().as_secs() as i64;

        let result = match &outcome {
            Ok(()) => TaskStatus::Success,
            Err(e) => {
                error!(id = item.id, method = %item.method, error = %e, "Task failed");
                TaskStatus::Failure
            }
        };

        let entry = &mut self.entries[index];
        entry.advance(now);
        let run = TaskRun {
            enabled: entry.enabled,
            last_run_time: entry.last_run_time,
            next_run_time: entry.next_run_time,
            result,
            start_time: now,
            end_time: end,
        };
        let next = if run.enabled {
            format_timestamp(run.next_run_time)
        } else {
            "never".to_string()
        };
        info!(id = item.id, result = result.label(), next = %next, "Task finished");

        if let Err(e) = self.tasks.record_run(item.id, &run).await {
            warn!(id = item.id, error = %format!("{e:#}"), "Cannot record task run");
        }
    }

    /// One attempt plus one retry for retryable failures
    async fn execute(&self, item: &ScheduledItem) -> SyncResult<()> {
        match self.runner.run(item).await {
            Err(e) if item.method.retries() && e.is_retryable() => {
                warn!(id = item.id, error = %e, "Retry");
                self.runner.run(item).await
            }
            other => other,
        }
    }

    /// Ticks until `token` is cancelled
    pub async fn run(mut self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(items = self.entries.len(), "Scheduler started");

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let ran = self.run_due(Utc::now().timestamp()).await;
                    if ran > 0 {
                        debug!(ran, "Tick finished");
                    }
                }
            }
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================
