// UPX Tools - batch front end for the UPX executable packer
//
// This is the library crate containing the interaction engine, its collaborators, and
// the data structures. The binary crate (main.rs) provides the command line entry point.

pub mod cli;
pub mod config;
pub mod engine;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use engine::{
    BatchOrchestrator, DropZoneClassifier, InteractionRouter, LayoutProbe, OutputClassifier,
    UpdateFlow, UpdatePhase,
};
pub use models::{AppConfig, BatchOutcome, LogEvent, OperationMode, Severity, UpdateInfo};
pub use services::{CommandGateway, FileDialogs, GatewayError, LocalGateway, NativeDialogs};
pub use state::LogBook;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
