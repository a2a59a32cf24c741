//! Tracing subscriber setup
//!
//! Interactive commands log to stderr. The service logs to the configured
//! file when `logEnabled` is set and to stdout when `printfEnabled` is set.
//! `RUST_LOG` overrides the level chosen by `-v`.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter_for(verbose: u8) -> EnvFilter {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Subscriber for one-shot commands
pub fn init_cli(verbose: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Subscriber for the service
///
/// # Arguments
/// * `log_file` - Destination of the non-ANSI file layer, `None` to disable it
/// * `stdout` - Whether to also log to stdout
/// * `verbose` - `-v` count
///
/// # Returns
/// The guard of the file writer; dropping it flushes and closes the file
pub fn init_service(
    log_file: Option<&Path>,
    stdout: bool,
    verbose: u8,
) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_appender(path)?);
            let layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stdout_layer = stdout.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stdout)
    });

    tracing_subscriber::registry()
        .with(filter_for(verbose))
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

/// Appender writing to `path`, never rotated
fn open_appender(path: &Path) -> Result<RollingFileAppender> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
