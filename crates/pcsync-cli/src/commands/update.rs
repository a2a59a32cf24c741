//! Update command - Refresh the metadata cache for a remote subtree

use anyhow::Result;
use clap::Args;

use crate::context::{remote_arg, AppContext, GlobalArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct UpdateCommand {
    /// Remote path to refresh, e.g. /apps/docs
    pub remote: String,
}

impl UpdateCommand {
    pub async fn execute(&self, args: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let remote = remote_arg(&self.remote)?;
        let ctx = AppContext::open(args).await?;

        let summary = ctx.engine.update(&remote).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "remote": remote.as_str(),
                "found": summary.found,
                "direct": summary.direct,
                "total": summary.total,
            }));
        } else if summary.found {
            formatter.success(&format!("Cache updated for {}", remote));
            formatter.info(&format!(
                "Direct children: {}, entries in subtree: {}",
                summary.direct, summary.total
            ));
        } else {
            formatter.warn(&format!("{} does not exist on the remote storage", remote));
        }
        Ok(())
    }
}
