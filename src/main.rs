//! UPX Tools - batch front end for the UPX executable packer
//!
//! Main entry point for the command line application.
//!
//! # Overview
//!
//! This binary wires the library's engine to a terminal. It initializes:
//! - Logging infrastructure (daily file rotation, console output with `--debug`)
//! - Tokio async runtime (subprocesses, downloads, timers)
//! - Configuration loading ([`ConfigManager`])
//! - The [`InteractionRouter`] and [`UpdateFlow`] over a [`LocalGateway`]
//!
//! Activity log entries are printed to stdout as `[HH:MM:SS] message` while the
//! selected command runs.
//!
//! # Execution Flow
//!
//! 1. Parse arguments and initialize logging → logs/upx-tools.<date>
//! 2. Create the tokio runtime
//! 3. Load `upx_gui_config.yaml` (defaults when missing or unreadable)
//! 4. Print the UPX version banner
//! 5. Run the command
//! 6. Log the metrics summary, drain the activity printer, and shut the runtime down
//!    with a 5s timeout

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use upx_tools::cli::{Cli, Commands, ConfigCommands, PackOverrides, apply_setting};
use upx_tools::engine::{InteractionRouter, LayoutProbe, UpdateFlow, UpdatePhase};
use upx_tools::logging::{LogSettings, setup_logging};
use upx_tools::metrics::Metrics;
use upx_tools::models::{AppConfig, DropTarget, DropZoneRect, LogEvent, OperationMode, Severity};
use upx_tools::services::{CommandGateway, LocalGateway, NativeDialogs};
use upx_tools::{APP_NAME, ConfigManager, LogBook, VERSION};

/// How long the activity printer gets to catch up at exit.
const PRINTER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A terminal has no drop zones; every drop is deferred to the operation "click".
struct NoDropZones;

impl LayoutProbe for NoDropZones {
    fn measure(&self, _target: DropTarget) -> Option<DropZoneRect> {
        None
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Guard must live until shutdown so buffered log lines are flushed
    let _guard = setup_logging(&LogSettings {
        log_dir: &cli.log_dir,
        log_prefix: "upx-tools",
        debug: cli.debug,
        console: cli.debug,
    })?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("upx-tools-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let result = runtime.block_on(run(cli));

    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Application shutdown complete");

    result
}

/// Engine work selected on the command line.
enum Job {
    Operation {
        paths: Vec<Utf8PathBuf>,
        mode: OperationMode,
        overrides: PackOverrides,
    },
    Scan {
        folder: Utf8PathBuf,
        recursive: bool,
    },
    CheckUpdate {
        download: Option<String>,
    },
    ToolVersion,
}

async fn run(cli: Cli) -> Result<()> {
    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(ConfigManager::default_dir);
    let config_manager = ConfigManager::new(&config_dir)?;

    // Settings commands never touch UPX or the activity log
    let job = match cli.command {
        Commands::Config { action } => return run_config_command(&config_manager, &action),
        Commands::Compress { paths, overrides } => Job::Operation {
            paths,
            mode: OperationMode::Compress,
            overrides,
        },
        Commands::Decompress { paths, overrides } => Job::Operation {
            paths,
            mode: OperationMode::Decompress,
            overrides,
        },
        Commands::Scan { folder, recursive } => Job::Scan { folder, recursive },
        Commands::CheckUpdate { download } => Job::CheckUpdate { download },
        Commands::ToolVersion => Job::ToolVersion,
    };

    let log = LogBook::new();
    let printer = Printer::spawn(&log, cli.quiet);
    let metrics = Arc::new(Metrics::new());

    let mut config = load_config(&config_manager, &log);
    if let Job::Operation { overrides, .. } = &job {
        overrides.apply(&mut config);
    }

    let gateway = Arc::new(LocalGateway::new(config_manager, &config)?);

    match gateway.tool_version().await {
        Ok(version) => log.info(format!("UPX GUI 已就绪 - {}", version)),
        Err(e) => {
            tracing::warn!("Could not determine UPX version: {}", e);
            log.info("UPX GUI 已就绪 - 请选择操作");
        }
    }

    let outcome = match job {
        Job::Operation { paths, mode, .. } => {
            run_operation(&gateway, &log, &metrics, config, paths, mode).await
        }
        Job::Scan { folder, recursive } => run_scan(&gateway, &log, &folder, recursive).await,
        Job::CheckUpdate { download } => {
            run_update(&gateway, &log, &metrics, download.as_deref()).await
        }
        Job::ToolVersion => Ok(()),
    };

    metrics.log_summary();

    // Router and flow are gone; this is the last handle
    printer.finish(log).await;

    outcome
}

/// Feed the paths through the router as a drop outside both zones followed by a click
/// on the operation button, exactly as the desktop front end does.
async fn run_operation(
    gateway: &Arc<LocalGateway>,
    log: &LogBook,
    metrics: &Arc<Metrics>,
    config: AppConfig,
    paths: Vec<Utf8PathBuf>,
    mode: OperationMode,
) -> Result<()> {
    let mut router = InteractionRouter::new(
        Arc::clone(gateway),
        Arc::new(NativeDialogs::new()),
        log.clone(),
        NoDropZones,
        config,
    )
    .with_metrics(Arc::clone(metrics));

    if !paths.is_empty() {
        router.handle_drop(paths, None).await;
        if router.pending().is_empty() {
            bail!("No .exe or .dll files to process");
        }
    }

    match router.handle_operation_click(mode).await {
        Some(outcome) if outcome.failed > 0 => {
            bail!("{} of {} files failed", outcome.failed, outcome.total())
        }
        Some(_) => Ok(()),
        None => bail!("No files selected"),
    }
}

async fn run_scan(
    gateway: &Arc<LocalGateway>,
    log: &LogBook,
    folder: &Utf8Path,
    recursive: bool,
) -> Result<()> {
    let files = gateway
        .scan_folder(folder, recursive)
        .await
        .map_err(anyhow::Error::new)?;
    log.info(format!("扫描文件夹: {} (找到 {} 个文件)", folder, files.len()));
    for file in &files {
        log.info(file.as_str());
    }
    Ok(())
}

async fn run_update(
    gateway: &Arc<LocalGateway>,
    log: &LogBook,
    metrics: &Arc<Metrics>,
    download: Option<&str>,
) -> Result<()> {
    let flow =
        UpdateFlow::new(Arc::clone(gateway), log.clone()).with_metrics(Arc::clone(metrics));

    if flow.check().await? != UpdatePhase::UpdateAvailable {
        return Ok(());
    }

    let Some(prompt) = flow.prompt() else {
        return Ok(());
    };
    println!("{}", prompt.version_line);
    if !prompt.published_at.is_empty() {
        println!("{}", prompt.published_at);
    }
    if !prompt.release_notes.is_empty() {
        println!("\n{}\n", prompt.release_notes.trim());
    }
    for option in &prompt.options {
        println!("  {} ({}): {}", option.label, option.name, option.url);
    }

    let Some(asset) = download else {
        return Ok(());
    };

    // Accept either the asset name or its label
    let name = prompt
        .options
        .iter()
        .find(|option| option.name == asset || option.label == asset)
        .map(|option| option.name.clone())
        .unwrap_or_else(|| asset.to_string());

    let mut progress = flow.subscribe_progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let value = *progress.borrow_and_update();
            tracing::debug!("Download progress: {}%", value);
        }
    });

    let result = flow.start_download(&name).await;
    reporter.abort();
    result?;
    Ok(())
}

fn load_config(config_manager: &ConfigManager, log: &LogBook) -> AppConfig {
    match config_manager.load() {
        Ok(config) if config_manager.exists() => {
            log.info("已加载上次保存的配置");
            config
        }
        Ok(config) => {
            log.info("使用默认配置");
            config
        }
        Err(e) => {
            tracing::error!("Failed to load config: {:#}", e);
            log.info("使用默认配置");
            AppConfig::default()
        }
    }
}

fn run_config_command(config_manager: &ConfigManager, action: &ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let config = config_manager.load()?;
            print!("{}", serde_yaml_ng::to_string(&config)?);
        }
        ConfigCommands::Path => println!("{}", config_manager.config_path()),
        ConfigCommands::Set { key, value } => {
            let mut config = config_manager.load()?;
            apply_setting(&mut config, key, value)?;
            config_manager.save(&config)?;
            println!("设置已保存");
        }
        ConfigCommands::Reset => {
            config_manager.save(&AppConfig::default())?;
            println!("设置已保存");
        }
    }
    Ok(())
}

/// Prints activity log entries to stdout as they are appended.
struct Printer {
    handle: JoinHandle<()>,
    /// Events taken off the channel, shown or skipped
    seen: Arc<AtomicUsize>,
    quiet: bool,
}

impl Printer {
    fn spawn(log: &LogBook, quiet: bool) -> Self {
        let mut rx = log.subscribe();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if shown(&event, quiet) {
                            println!("{}", event);
                        }
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Activity printer skipped {} events", skipped);
                        eprintln!("... {} 条日志未显示", skipped);
                        counter.fetch_add(skipped as usize, Ordering::SeqCst);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self {
            handle,
            seen,
            quiet,
        }
    }

    /// Close the channel by dropping `log` and wait until everything sent has been printed.
    ///
    /// `log` must be the last LogBook handle. If the printer does not drain in time, the
    /// retained history it has not reached is printed here instead.
    async fn finish(mut self, log: LogBook) {
        let history = log.snapshot();
        let evicted = log.read(|buffer| buffer.evicted());
        drop(log);

        match timeout(PRINTER_DRAIN_TIMEOUT, &mut self.handle).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => tracing::warn!("Activity printer stopped: {}", e),
            Err(_) => {
                tracing::warn!("Activity printer did not drain; printing remaining history");
                self.handle.abort();
                let _ = (&mut self.handle).await;
            }
        }

        let position = self.seen.load(Ordering::SeqCst).saturating_sub(evicted);
        for event in history.iter().skip(position) {
            if shown(event, self.quiet) {
                println!("{}", event);
            }
        }
    }
}

fn shown(event: &LogEvent, quiet: bool) -> bool {
    !quiet || matches!(event.severity, Severity::Warning | Severity::Error)
}
