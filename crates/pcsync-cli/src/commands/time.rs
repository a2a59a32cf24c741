//! Time command - Current local time in the format used by every listing

use anyhow::Result;
use chrono::Local;
use clap::Args;
use pcsync_core::domain::schedule::format_timestamp;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct TimeCommand {}

impl TimeCommand {
    pub fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let now = Local::now().timestamp();
        let formatted = format_timestamp(now);

        if format.is_json() {
            formatter.print_json(&serde_json::json!({ "now": formatted, "timestamp": now }));
        } else {
            formatter.text(&formatted);
        }
        Ok(())
    }
}
