//! Service command - Run the configured items until stopped
//!
//! Loads and validates the configuration file, installs the service log
//! layers, checks the remote session and then hands the items to the
//! [`TaskScheduler`]. SIGINT and SIGTERM stop the loop between two runs.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use pcsync_core::config::Config;
use pcsync_core::domain::SERVICE_APP_NAME;
use pcsync_core::ports::{IRemoteStorage, ITaskRepository};
use pcsync_sync::{TaskRunner, TaskScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::list_actions::render_tasks;
use crate::context::{AppContext, GlobalArgs};
use crate::logging;

#[derive(Debug, Args)]
pub struct ServiceCommand {}

impl ServiceCommand {
    pub async fn execute(&self, args: &GlobalArgs, verbose: u8) -> Result<()> {
        let config_path = args.config.clone().unwrap_or_else(Config::default_path);
        let config = Config::load(&config_path)?;
        let errors = config.validate();
        if !errors.is_empty() {
            let listed: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!(
                "Invalid configuration {}:\n  {}",
                config_path.display(),
                listed.join("\n  ")
            );
        }

        let log_file = config.log_enabled.then(|| config.log_path());
        let _guard = logging::init_service(log_file.as_deref(), config.printf_enabled, verbose)?;

        info!("Application start up");
        info!(
            config = %config_path.display(),
            cookie = %config.cookie_file_path.display(),
            log = %config.log_path().display(),
            log_enabled = config.log_enabled,
            printf_enabled = config.printf_enabled,
            run_in_daemon = config.run_in_daemon,
            "Configuration loaded"
        );

        let result = run(&config).await;
        match &result {
            Ok(()) => info!("Application end up"),
            Err(e) => error!(error = %format!("{e:#}"), "Application end up with error"),
        }
        result
    }
}

async fn run(config: &Config) -> Result<()> {
    let items = match config.scheduled_items() {
        Ok(items) => items,
        Err(errors) => {
            let listed: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("Invalid items: {}", listed.join("; "));
        }
    };
    if items.is_empty() {
        bail!("No items configured");
    }
    if let Some(method) = config.secure() {
        info!(?method, "Session protection configured");
    }

    let ctx = AppContext::for_service(config, SERVICE_APP_NAME).await?;
    let logged_in = ctx
        .remote
        .is_logged_in()
        .await
        .context("Failed to check the remote session")?;
    if !logged_in {
        bail!("Not logged in or session timed out");
    }
    match ctx.remote.user_id().await {
        Ok(uid) => info!(uid = %uid, "Session valid"),
        Err(e) => warn!(error = %format!("{e:#}"), "Cannot read user id"),
    }

    let runner: Arc<dyn TaskRunner> = Arc::clone(&ctx.engine) as _;
    let mut scheduler = TaskScheduler::new(runner, Arc::clone(&ctx.tasks) as _, items);
    scheduler
        .rebuild_table()
        .await
        .context("Failed to rebuild the task table")?;
    let tasks = ctx.tasks.list_all().await?;
    info!("Task:\n{}", render_tasks(&tasks));

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    scheduler.run(token).await;
    Ok(())
}

/// Cancels `token` on SIGINT or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}
