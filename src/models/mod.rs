//! Data models for UPX Tools.
//!
//! - [`AppConfig`]: persisted user settings (compression level, overwrite, update checks)
//! - [`FileTask`], [`PackRequest`], [`BatchOutcome`]: the units of work handled by the
//!   [`BatchOrchestrator`](crate::engine::BatchOrchestrator)
//! - [`LogEvent`]: user-facing activity log entries produced by the
//!   [`OutputClassifier`](crate::engine::OutputClassifier) and the engine components
//! - [`UpdateInfo`]: release metadata driving the [`UpdateFlow`](crate::engine::UpdateFlow)
//! - [`DropZoneRect`], [`Point`], [`DropTarget`]: drop-zone geometry

pub mod config;
pub mod geometry;
pub mod log_event;
pub mod task;
pub mod update;

pub use config::AppConfig;
pub use geometry::{DropTarget, DropZoneRect, Point};
pub use log_event::{LogEvent, Severity};
pub use task::{
    BatchOutcome, CompressionLevel, FileTask, OperationMode, PackOptions, PackRequest,
    SUPPORTED_EXTENSIONS, default_packed_output, has_supported_extension,
};
pub use update::{DownloadOption, ReleaseAsset, UpdateInfo, UpdatePrompt};
