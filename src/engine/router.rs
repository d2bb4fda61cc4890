//! Routing of drops and operation clicks to the batch orchestrator.
//!
//! Dropped paths are expanded into `.exe`/`.dll` files first. A drop onto one of the two
//! operation zones runs immediately; a drop anywhere else is kept as the pending
//! selection and consumed by the next operation click.

use crate::engine::batch::{BatchOrchestrator, PackSettings, batch_size_for};
use crate::engine::drop_zone::{DropZoneClassifier, LayoutProbe};
use crate::metrics::Metrics;
use crate::models::{
    AppConfig, BatchOutcome, DropTarget, OperationMode, Point, has_supported_extension,
};
use crate::services::gateway::{CommandGateway, FileDialogs, FileFilter, GatewayError};
use crate::state::LogBook;
use camino::Utf8PathBuf;
use std::sync::Arc;

/// Files dropped outside both zones, waiting for an operation click.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PendingSelection {
    #[default]
    None,
    Single(Utf8PathBuf),
    Many(Vec<Utf8PathBuf>),
}

impl PendingSelection {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Single(_) => 1,
            Self::Many(files) => files.len(),
        }
    }
}

/// Front-end facing dispatcher for drag, drop, click, and resize events.
pub struct InteractionRouter<G, D, P: LayoutProbe> {
    gateway: Arc<G>,
    dialogs: Arc<D>,
    log: LogBook,
    drop_zones: DropZoneClassifier<P>,
    orchestrator: BatchOrchestrator<G, D>,
    config: AppConfig,
    pending: PendingSelection,
}

impl<G, D, P> InteractionRouter<G, D, P>
where
    G: CommandGateway,
    D: FileDialogs,
    P: LayoutProbe,
{
    pub fn new(
        gateway: Arc<G>,
        dialogs: Arc<D>,
        log: LogBook,
        probe: P,
        config: AppConfig,
    ) -> Self {
        let orchestrator = BatchOrchestrator::new(
            Arc::clone(&gateway),
            Arc::clone(&dialogs),
            log.clone(),
            PackSettings::from(&config),
        )
        .with_batch_size(batch_size_for(&config));

        Self {
            gateway,
            dialogs,
            log,
            drop_zones: DropZoneClassifier::new(probe),
            orchestrator,
            config,
            pending: PendingSelection::None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.orchestrator = self.orchestrator.with_metrics(metrics);
        self
    }

    /// Replace the drop-zone classifier (for a custom debounce).
    pub fn with_drop_zones(mut self, drop_zones: DropZoneClassifier<P>) -> Self {
        self.drop_zones = drop_zones;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Apply edited settings to subsequent operations.
    pub fn set_config(&mut self, config: AppConfig) {
        self.orchestrator.set_settings(PackSettings::from(&config));
        self.orchestrator.set_batch_size(batch_size_for(&config));
        self.config = config;
    }

    pub fn pending(&self) -> &PendingSelection {
        &self.pending
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator<G, D> {
        &self.orchestrator
    }

    pub fn drop_zones(&self) -> &DropZoneClassifier<P> {
        &self.drop_zones
    }

    /// Target under the pointer during a drag, for highlighting.
    pub fn drag_hover(&mut self, position: Option<Point>) -> Option<DropTarget> {
        self.drop_zones.resolve_target(position)
    }

    pub fn notify_resize(&mut self) {
        self.drop_zones.notify_resize();
    }

    /// Handle a completed drop.
    ///
    /// Returns the batch outcome when the drop landed on an operation zone; `None` when
    /// nothing processable was dropped or the files were stored for later.
    pub async fn handle_drop(
        &mut self,
        paths: Vec<Utf8PathBuf>,
        position: Option<Point>,
    ) -> Option<BatchOutcome> {
        if paths.is_empty() {
            return None;
        }

        let files = self.collect_files(paths).await;
        if files.is_empty() {
            self.log.warning("未找到 .exe 或 .dll 文件");
            return None;
        }

        match self.drop_zones.resolve_target(position) {
            Some(target) => {
                self.log.info(match target {
                    DropTarget::Compress => "检测到拖放至加壳区域",
                    DropTarget::Decompress => "检测到拖放至脱壳区域",
                });
                Some(self.orchestrator.run_batch(files, target.into()).await)
            }
            None => {
                self.store_for_later(files);
                None
            }
        }
    }

    /// Handle a click on an operation button.
    ///
    /// Consumes the pending selection if there is one, otherwise opens the file picker.
    /// Returns `None` when the picker was cancelled.
    pub async fn handle_operation_click(&mut self, mode: OperationMode) -> Option<BatchOutcome> {
        match std::mem::take(&mut self.pending) {
            PendingSelection::Many(files) => {
                self.log
                    .info(format!("开始批量{}...", mode.display_name()));
                Some(self.orchestrator.run_batch(files, mode).await)
            }
            PendingSelection::Single(path) => {
                self.log.info(format!("开始{}...", mode.display_name()));
                Some(self.orchestrator.run_single(path, mode).await)
            }
            PendingSelection::None => {
                self.log.info(format!("选择文件进行{}...", mode.verb()));
                self.select_and_run(mode).await
            }
        }
    }

    async fn select_and_run(&mut self, mode: OperationMode) -> Option<BatchOutcome> {
        let selected = self
            .dialogs
            .select_files(&[FileFilter::executables()], true)
            .await;

        let mut files = match selected {
            Some(files) if !files.is_empty() => files,
            _ => {
                self.log.warning("未选择文件");
                return None;
            }
        };

        if files.len() == 1 {
            let path = files.remove(0);
            self.log.info(format!("选择文件: {}", path));
            Some(self.orchestrator.run_single(path, mode).await)
        } else {
            self.log.info(format!("选择了 {} 个文件", files.len()));
            Some(self.orchestrator.run_batch(files, mode).await)
        }
    }

    fn store_for_later(&mut self, mut files: Vec<Utf8PathBuf>) {
        if files.len() == 1 {
            self.log.info("请点击\"加壳压缩\"或\"脱壳解压\"按钮");
            self.pending = PendingSelection::Single(files.remove(0));
        } else {
            self.log
                .info(format!("已选择 {} 个文件，请点击操作按钮", files.len()));
            self.pending = PendingSelection::Many(files);
        }
        tracing::debug!("Stored {} dropped files for later", self.pending.len());
    }

    /// Expand dropped paths: folders are scanned, anything else is kept when it has a
    /// processable extension.
    async fn collect_files(&self, paths: Vec<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
        let mut collected = Vec::new();

        for path in paths {
            let scanned = match self
                .gateway
                .scan_folder(&path, self.config.include_subfolders)
                .await
            {
                Ok(files) => files,
                Err(GatewayError::NotAFolder(_)) => Vec::new(),
                Err(e) => {
                    tracing::debug!("Scan of {} failed: {}", path, e);
                    if !has_supported_extension(&path) {
                        self.log.error(e.to_string());
                    }
                    Vec::new()
                }
            };

            if !scanned.is_empty() {
                self.log
                    .info(format!("扫描文件夹: {} (找到 {} 个文件)", path, scanned.len()));
                collected.extend(scanned);
            } else if has_supported_extension(&path) {
                collected.push(path);
            }
        }

        collected
    }
}
