//! Services module - the collaborators behind the engine.
//!
//! The engine only sees the [`CommandGateway`] and [`FileDialogs`] traits. This module
//! defines them and provides the production implementations.
//!
//! # Components
//!
//! - [`PackerService`]: runs UPX as a subprocess with a timeout. Handles:
//!   - Locating the executable (configured path, bundled copies, `PATH`)
//!   - Validating the input (existence, read-only when overwriting, optional `.bak` copy)
//!   - Building the argument list from the pack options
//!   - Turning exit status and output into a success report or a `[错误]` failure report
//!
//! - [`scan_folder`]: lists `.exe`/`.dll` files, optionally recursively
//!
//! - [`ReleaseClient`]: GitHub "latest release" lookups and asset downloads
//!
//! - [`LocalGateway`]: the [`CommandGateway`] composed from the above plus
//!   [`ConfigManager`](crate::config::ConfigManager)
//!
//! - [`NativeDialogs`]: the [`FileDialogs`] implementation using `rfd`
//!
//! # Usage Example
//!
//! ```ignore
//! use upx_tools::services::{CommandGateway, LocalGateway};
//!
//! let gateway = LocalGateway::new(config_manager, &settings)?;
//! println!("{}", gateway.tool_version().await?);
//! ```

pub mod dialogs;
pub mod gateway;
pub mod local;
pub mod packer;
pub mod release;
pub mod scanner;

pub use dialogs::NativeDialogs;
pub use gateway::{CommandGateway, FileDialogs, FileFilter, GatewayError};
pub use local::LocalGateway;
pub use packer::{PackError, PackerService, build_args, describe_failure, format_bytes, locate_upx};
pub use release::{ReleaseClient, ReleaseError, current_version, version_compare};
pub use scanner::{ScanError, scan_folder};
