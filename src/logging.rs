use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Where and how diagnostics are written.
#[derive(Debug, Clone)]
pub struct LogSettings<'a> {
    /// Directory for the daily-rotated log files (created if missing)
    pub log_dir: &'a Utf8Path,
    pub log_prefix: &'a str,
    /// Debug level instead of info
    pub debug: bool,
    /// Also write ANSI-colored output to stderr
    pub console: bool,
}

/// Level filter: `RUST_LOG` when set, otherwise `debug` or `info`.
fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }))
}

/// Setup logging with a rotating file appender and optional console output.
///
/// User-facing activity entries appear under the `upx_tools::activity` target.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(settings: &LogSettings<'_>) -> Result<WorkerGuard> {
    if !settings.log_dir.exists() {
        fs::create_dir_all(settings.log_dir)
            .with_context(|| format!("Failed to create log directory: {}", settings.log_dir))?;
    }

    let file_appender = rolling::daily(settings.log_dir, settings.log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // `Option<Layer>` is itself a layer; `None` disables the console output
    let console_layer = settings.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter(settings.debug))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}",
        settings.log_dir,
        settings.log_prefix,
        settings.debug,
        settings.console
    );

    Ok(guard)
}
