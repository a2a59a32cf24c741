//! List-actions command - Dump of the Action Ledger, cache size and task table

use std::fmt::Write as _;

use anyhow::Result;
use chrono::Local;
use clap::Args;
use pcsync_core::domain::schedule::format_timestamp;
use pcsync_core::domain::{ActionRecord, TaskRecord};
use pcsync_core::ports::{IActionLedger, ICacheRepository, ITaskRepository};

use crate::context::{AppContext, GlobalArgs};
use crate::output::{get_formatter, OutputFormat};

const RULE: &str = "------------------------------------------------";

#[derive(Debug, Args)]
pub struct ListActionsCommand {}

impl ListActionsCommand {
    pub async fn execute(&self, args: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let ctx = AppContext::store_only(args).await?;

        let actions = ctx.ledger.list_all().await?;
        let cache_rows = ctx.cache.count().await?;
        let tasks = ctx.tasks.list_all().await?;
        let now = format_timestamp(Local::now().timestamp());

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "actions": actions
                    .iter()
                    .map(|a| serde_json::json!({
                        "rowid": a.row_id,
                        "status": a.status_label(),
                        "start_time": format_timestamp(a.start_time),
                        "end_time": format_timestamp(a.end_time),
                        "created_by": a.created_by_app,
                        "modified_by": a.modified_by_app,
                        "action": a.action,
                    }))
                    .collect::<Vec<_>>(),
                "cache_rows": cache_rows,
                "tasks": tasks,
                "now": now,
            }));
            return Ok(());
        }

        let mut out = render_actions(&actions);
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Cache Row Number: {cache_rows}");
        let _ = writeln!(out, "\nTask:");
        out.push_str(&render_tasks(&tasks));
        let _ = writeln!(out, "now is {now}");
        formatter.text(&out);
        Ok(())
    }
}

/// Ledger table followed by its row count
pub fn render_actions(actions: &[ActionRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nAction:");
    let _ = writeln!(
        out,
        "rowid | status | start time | end time | create app | modify app | action"
    );
    let _ = writeln!(out, "{RULE}");
    for a in actions {
        let _ = writeln!(
            out,
            "{} | {:>7} | {} | {} | {} | {} | {}",
            a.row_id,
            a.status_label(),
            format_timestamp(a.start_time),
            format_timestamp(a.end_time),
            a.created_by_app,
            a.modified_by_app,
            a.action
        );
    }
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Row Number: {}", actions.len());
    out
}

/// Task table as the service last persisted it
pub fn render_tasks(tasks: &[TaskRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "id | method | enabled | md5 | last run time | next run time | schedule | interval | status | elapsed | local path | remote path"
    );
    let _ = writeln!(out, "{RULE}");
    for t in tasks {
        let _ = writeln!(
            out,
            "{:03} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {}",
            t.id,
            t.method,
            yes_no(t.enabled),
            yes_no(t.md5_enabled),
            format_timestamp(t.last_run_time),
            format_timestamp(t.next_run_time),
            t.schedule_offset_secs,
            t.interval_secs,
            t.status.label(),
            t.elapsed_secs,
            t.local_path,
            t.remote_path
        );
    }
    let _ = writeln!(out, "{RULE}");
    out
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no "
    }
}
