//! Windowed batch execution of packer calls.

use crate::engine::classifier::OutputClassifier;
use crate::metrics::Metrics;
use crate::models::{
    AppConfig, BatchOutcome, FileTask, LogEvent, OperationMode, PackOptions, PackRequest,
    default_packed_output,
};
use crate::services::gateway::{CommandGateway, FileDialogs, FileFilter, GatewayError};
use crate::state::LogBook;
use camino::Utf8PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinSet;

/// Lower bound of the derived window size.
pub const MIN_BATCH_SIZE: usize = 2;

/// Upper bound of the derived window size.
pub const MAX_BATCH_SIZE: usize = 16;

/// Logical CPUs reported by the OS (4 when unknown).
pub fn hardware_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Two packer calls per logical CPU, clamped to [`MIN_BATCH_SIZE`]..=[`MAX_BATCH_SIZE`].
pub fn default_batch_size() -> usize {
    (hardware_parallelism() * 2).clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
}

/// Window size for a config: the explicit override when present, else the default.
pub fn batch_size_for(config: &AppConfig) -> usize {
    config
        .batch_size
        .map(|size| size.max(1))
        .unwrap_or_else(default_batch_size)
}

/// The per-file settings snapshot a batch runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSettings {
    /// Write into the input file instead of asking for a save target.
    pub overwrite: bool,
    pub options: PackOptions,
}

impl From<&AppConfig> for PackSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            overwrite: config.overwrite,
            options: config.pack_options(),
        }
    }
}

impl Default for PackSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Why a single file was not processed.
#[derive(Error, Debug)]
pub enum FileFailure {
    #[error("no output location selected")]
    Cancelled,

    #[error(transparent)]
    Tool(#[from] GatewayError),
}

/// Processes one file: picks the output, invokes the packer, logs the classified report.
///
/// Cloned into every task of a window; all fields are shared handles.
struct FileWorker<G, D> {
    gateway: Arc<G>,
    dialogs: Arc<D>,
    log: LogBook,
    classifier: Arc<OutputClassifier>,
    settings: Arc<PackSettings>,
    metrics: Arc<Metrics>,
}

impl<G, D> Clone for FileWorker<G, D> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            dialogs: Arc::clone(&self.dialogs),
            log: self.log.clone(),
            classifier: Arc::clone(&self.classifier),
            settings: Arc::clone(&self.settings),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<G: CommandGateway, D: FileDialogs> FileWorker<G, D> {
    /// Process one file and record the outcome. Returns true on success.
    async fn dispatch(self, task: FileTask) -> bool {
        let start = Instant::now();

        match self.process(&task).await {
            Ok(()) => {
                self.metrics.record_file_succeeded(start.elapsed());
                true
            }
            Err(failure) => {
                tracing::warn!("{} of {} failed: {}", task.mode, task.path, failure);
                self.log.error(format!("处理失败: {}", task.path));
                self.metrics.record_file_failed();
                false
            }
        }
    }

    async fn process(&self, task: &FileTask) -> Result<(), FileFailure> {
        let output = self.resolve_output(task).await?;
        let options = self.settings.options.clone();

        if options.lzma {
            self.log.info("已启用 LZMA 压缩");
        }
        if options.ultra_brute {
            self.log.info("已启用极限压缩模式");
        }
        if options.force {
            self.log.warning("已启用强制压缩模式");
        }

        self.log.info(format!("开始{}...", task.mode.display_name()));

        let request = PackRequest {
            mode: task.mode,
            input: task.path.clone(),
            output,
            options,
        };

        match self.gateway.invoke_pack(request).await {
            Ok(report) => {
                self.log.extend(self.classifier.classify(&report, false));
                Ok(())
            }
            Err(err) => {
                self.log.extend(self.classifier.classify(&err.to_string(), true));
                Err(err.into())
            }
        }
    }

    async fn resolve_output(&self, task: &FileTask) -> Result<Utf8PathBuf, FileFailure> {
        if task.mode == OperationMode::Decompress || self.settings.overwrite {
            self.log.info("将覆盖原文件");
            return Ok(task.path.clone());
        }

        let default_path = default_packed_output(&task.path);
        let selected = self
            .dialogs
            .select_save_target(&[FileFilter::executables()], &default_path)
            .await;

        match selected {
            Some(path) => {
                self.log.info(format!("输出文件: {}", path));
                Ok(path)
            }
            None => {
                self.log.warning("未选择输出位置");
                Err(FileFailure::Cancelled)
            }
        }
    }
}

/// Runs packer calls in concurrency-bounded windows.
///
/// Each window of up to `batch_size` files is dispatched at once on a `JoinSet` and
/// fully awaited before the next window starts. A failing file only affects its own
/// counter; it never cancels siblings or later windows.
pub struct BatchOrchestrator<G, D> {
    worker: FileWorker<G, D>,
    batch_size: usize,
}

impl<G: CommandGateway, D: FileDialogs> BatchOrchestrator<G, D> {
    pub fn new(gateway: Arc<G>, dialogs: Arc<D>, log: LogBook, settings: PackSettings) -> Self {
        Self {
            worker: FileWorker {
                gateway,
                dialogs,
                log,
                classifier: Arc::new(OutputClassifier::new()),
                settings: Arc::new(settings),
                metrics: Arc::new(Metrics::new()),
            },
            batch_size: default_batch_size(),
        }
    }

    /// Override the window size (values below 1 are treated as 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.worker.metrics = metrics;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<OutputClassifier>) -> Self {
        self.worker.classifier = classifier;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    pub fn settings(&self) -> &PackSettings {
        &self.worker.settings
    }

    /// Replace the settings used by subsequent runs.
    pub fn set_settings(&mut self, settings: PackSettings) {
        self.worker.settings = Arc::new(settings);
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.worker.metrics)
    }

    /// Process `files` in windows and return the aggregated counters.
    pub async fn run_batch(&self, files: Vec<Utf8PathBuf>, mode: OperationMode) -> BatchOutcome {
        let log = &self.worker.log;
        let total = files.len();

        if total == 0 {
            log.warning("没有找到可处理的文件");
            return BatchOutcome::default();
        }

        log.info(format!("批量处理模式 - 找到 {} 个文件", total));
        log.info(format!(
            "使用 {} 并发处理（CPU核心: {}）",
            self.batch_size,
            hardware_parallelism()
        ));
        tracing::info!(
            "Starting {} batch of {} files (window size: {})",
            mode,
            total,
            self.batch_size
        );
        self.worker.metrics.record_batch();

        let mut outcome = BatchOutcome::default();

        for (window_index, window) in files.chunks(self.batch_size).enumerate() {
            let first = window_index * self.batch_size;
            log.info(format!(
                "处理进度: {}-{}/{}",
                first + 1,
                first + window.len(),
                total
            ));

            let mut tasks = JoinSet::new();
            for path in window {
                let worker = self.worker.clone();
                let task = FileTask::new(path.clone(), mode);
                tasks.spawn(worker.dispatch(task));
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(true) => outcome.succeeded += 1,
                    Ok(false) => outcome.failed += 1,
                    Err(e) => {
                        tracing::error!("Task join error: {}", e);
                        log.error(format!("处理失败: {}", e));
                        outcome.failed += 1;
                    }
                }
            }

            // Let the front end observe the window's log output before the next one starts
            tokio::task::yield_now().await;
        }

        log.push(
            LogEvent::success(format!(
                "批量处理完成! 成功: {} 个，失败: {} 个",
                outcome.succeeded, outcome.failed
            ))
            .highlighted(),
        );
        tracing::info!(
            "Batch completed: {} succeeded, {} failed",
            outcome.succeeded,
            outcome.failed
        );

        outcome
    }

    /// Process exactly one file without batch framing.
    ///
    /// Per-file logging and failure reporting are identical to a batch of one.
    pub async fn run_single(&self, path: Utf8PathBuf, mode: OperationMode) -> BatchOutcome {
        let succeeded = self.worker.clone().dispatch(FileTask::new(path, mode)).await;
        if succeeded {
            BatchOutcome {
                succeeded: 1,
                failed: 0,
            }
        } else {
            BatchOutcome {
                succeeded: 0,
                failed: 1,
            }
        }
    }
}
