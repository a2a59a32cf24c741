//! Reset command - Mark every running action as failed
//!
//! Needed after a crash left ledger rows in the running state, which would
//! otherwise block every later run with the same signature.

use anyhow::Result;
use clap::Args;

use crate::context::{AppContext, GlobalArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ResetCommand {}

impl ResetCommand {
    pub async fn execute(&self, args: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let ctx = AppContext::store_only(args).await?;

        let changed = ctx.engine.reset().await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({ "reset": changed }));
        } else {
            formatter.success(&format!(
                "Reset {} running action{}",
                changed,
                if changed == 1 { "" } else { "s" }
            ));
        }
        Ok(())
    }
}
