//! The interaction engine: routing, batching, output classification, and updates.
//!
//! - [`DropZoneClassifier`]: pointer position to drop target, with a debounced geometry cache
//! - [`BatchOrchestrator`]: windowed, concurrency-bounded packer invocations
//! - [`OutputClassifier`]: packer report text to [`LogEvent`](crate::models::LogEvent)s
//! - [`UpdateFlow`]: update check, download, and installer hand-off state machine
//! - [`InteractionRouter`]: drop, click, hover, and resize handlers tying the above together

pub mod batch;
pub mod classifier;
pub mod drop_zone;
pub mod router;
pub mod update_flow;

pub use batch::{
    BatchOrchestrator, FileFailure, MAX_BATCH_SIZE, MIN_BATCH_SIZE, PackSettings, batch_size_for,
    default_batch_size, hardware_parallelism,
};
pub use classifier::{OutputClassifier, SUCCESS_RULES, SuccessRule};
pub use drop_zone::{DropZoneClassifier, LayoutProbe, RESIZE_DEBOUNCE};
pub use router::{InteractionRouter, PendingSelection};
pub use update_flow::{AUTO_CHECK_DELAY, FlowError, StepperTiming, UpdateFlow, UpdatePhase};
