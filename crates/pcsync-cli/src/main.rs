//! pcsync CLI - Command-line interface for pcsync
//!
//! Provides commands for:
//! - Refreshing the remote metadata cache
//! - Backup, Restore, Combine and Compare between a local and a remote tree
//! - Inspecting and resetting the Action Ledger
//! - Running the scheduler as a long-lived service

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod context;
mod logging;
mod output;

use commands::{
    compare::CompareCommand,
    list_actions::ListActionsCommand,
    md5::Md5Command,
    reset::ResetCommand,
    service::ServiceCommand,
    time::TimeCommand,
    transfer::{CombineCommand, TransferCommand},
    update::UpdateCommand,
};
use context::GlobalArgs;
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "pcsync",
    version,
    about = "Keeps a local directory tree and a remote storage tree in sync"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Refresh the metadata cache for a remote subtree
    Update(UpdateCommand),
    /// Make the remote tree match the local tree
    Backup(TransferCommand),
    /// Make the local tree match the remote tree
    Restore(TransferCommand),
    /// Merge both trees without deleting anything
    Combine(CombineCommand),
    /// Show what a sync would change, without changing anything
    Compare(CompareCommand),
    /// Mark every running action as failed
    Reset(ResetCommand),
    /// Print the Action Ledger, cache size and task table
    ListActions(ListActionsCommand),
    /// Print the MD5 of a file and of the argument string
    Md5(Md5Command),
    /// Print the current local time
    Time(TimeCommand),
    /// Run the configured items on their timetable until stopped
    Service(ServiceCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The service installs its own subscriber from the configuration file
    if !matches!(cli.command, Commands::Service(_)) {
        logging::init_cli(cli.verbose);
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let result = match &cli.command {
        Commands::Update(cmd) => cmd.execute(&cli.global, format).await,
        Commands::Backup(cmd) => cmd.backup(&cli.global, format).await,
        Commands::Restore(cmd) => cmd.restore(&cli.global, format).await,
        Commands::Combine(cmd) => cmd.execute(&cli.global, format).await,
        Commands::Compare(cmd) => cmd.execute(&cli.global, format).await,
        Commands::Reset(cmd) => cmd.execute(&cli.global, format).await,
        Commands::ListActions(cmd) => cmd.execute(&cli.global, format).await,
        Commands::Md5(cmd) => cmd.execute(format).await,
        Commands::Time(cmd) => cmd.execute(format),
        Commands::Service(cmd) => cmd.execute(&cli.global, cli.verbose).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            get_formatter(cli.json).error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
