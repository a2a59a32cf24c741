//! Backup, Restore and Combine commands
//!
//! Each one runs a single pass of the sync engine over a local directory (or
//! file) and a remote path, then prints the pass counters.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::debug;

use crate::context::{remote_arg, AppContext, GlobalArgs};
use crate::output::{get_formatter, print_stats, OutputFormat};

/// Arguments shared by `backup` and `restore`
#[derive(Debug, Args)]
pub struct TransferCommand {
    /// Local file or directory
    pub local: PathBuf,

    /// Remote file or directory, e.g. /apps/docs
    pub remote: String,

    /// Compare file contents by MD5 instead of trusting mtimes alone
    #[arg(long)]
    pub md5: bool,

    /// Accepted for compatibility; has no effect
    #[arg(long)]
    pub force: bool,
}

impl TransferCommand {
    pub async fn backup(&self, args: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let remote = remote_arg(&self.remote)?;
        debug!(force = self.force, "Backup requested");
        let ctx = AppContext::open(args).await?;

        let stats = ctx.engine.backup(&self.local, &remote, self.md5).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(stats)?);
        } else {
            formatter.success(&format!(
                "Backup {} -> {} finished",
                self.local.display(),
                remote
            ));
            print_stats(formatter.as_ref(), "uploaded", &stats);
        }
        Ok(())
    }

    pub async fn restore(&self, args: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let remote = remote_arg(&self.remote)?;
        debug!(force = self.force, "Restore requested");
        let ctx = AppContext::open(args).await?;

        let stats = ctx.engine.restore(&self.local, &remote, self.md5).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(stats)?);
        } else {
            formatter.success(&format!(
                "Restore {} <- {} finished",
                self.local.display(),
                remote
            ));
            print_stats(formatter.as_ref(), "downloaded", &stats);
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct CombineCommand {
    /// Local file or directory
    pub local: PathBuf,

    /// Remote file or directory, e.g. /apps/docs
    pub remote: String,

    /// Compare file contents by MD5 instead of trusting mtimes alone
    #[arg(long)]
    pub md5: bool,
}

impl CombineCommand {
    pub async fn execute(&self, args: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let remote = remote_arg(&self.remote)?;
        let ctx = AppContext::open(args).await?;

        let stats = ctx.engine.combine(&self.local, &remote, self.md5).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(stats)?);
        } else {
            formatter.success(&format!(
                "Combine {} <-> {} finished",
                self.local.display(),
                remote
            ));
            print_stats(formatter.as_ref(), "uploaded", &stats.backup);
            print_stats(formatter.as_ref(), "downloaded", &stats.restore);
        }
        Ok(())
    }
}
