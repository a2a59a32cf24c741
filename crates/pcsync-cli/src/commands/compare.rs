//! Compare command - Dry-run listing of what a sync would change

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::context::{remote_arg, AppContext, GlobalArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct CompareCommand {
    /// Local file or directory
    pub local: PathBuf,

    /// Remote file or directory, e.g. /apps/docs
    pub remote: String,

    /// Compare file contents by MD5 instead of trusting mtimes alone
    #[arg(long)]
    pub md5: bool,
}

impl CompareCommand {
    pub async fn execute(&self, args: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let remote = remote_arg(&self.remote)?;
        let ctx = AppContext::open(args).await?;

        let report = ctx.engine.compare(&self.local, &remote, self.md5).await?;

        if format.is_json() {
            let rows: Vec<String> = report.items.iter().map(ToString::to_string).collect();
            let totals = serde_json::to_value(report.totals())
                .context("Failed to serialize compare totals")?;
            formatter.print_json(&serde_json::json!({
                "items": rows,
                "totals": totals,
            }));
        } else {
            formatter.text(&report.render());
        }
        Ok(())
    }
}
