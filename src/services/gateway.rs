//! Collaborator contracts consumed by the engine.
//!
//! The engine never touches the filesystem, the network, or a window system directly;
//! it goes through a [`CommandGateway`] (tool, scanner, releases, config) and a
//! [`FileDialogs`] implementation (native pickers). Production code uses
//! [`LocalGateway`](crate::services::LocalGateway) and
//! [`NativeDialogs`](crate::services::NativeDialogs); tests substitute in-memory fakes.

use crate::models::{AppConfig, PackRequest, UpdateInfo};
use camino::{Utf8Path, Utf8PathBuf};
use std::future::Future;
use thiserror::Error;

/// Failure of a single collaborator call.
///
/// The `Display` form of each variant is the text shown to the user, which is why the
/// packer variant carries its report verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The packer rejected the file; the message is the classified-ready failure report.
    #[error("{0}")]
    ExternalTool(String),

    #[error("扫描文件夹失败: {0}")]
    Scan(String),

    /// The scanned path exists but is a regular file.
    #[error("不是文件夹: {0}")]
    NotAFolder(String),

    #[error("检查更新失败: {0}")]
    UpdateCheck(String),

    #[error("下载失败: {0}")]
    Download(String),

    #[error("启动安装程序失败: {0}")]
    Launch(String),

    #[error("配置读写失败: {0}")]
    Config(String),
}

/// A file-type filter for the native pickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl FileFilter {
    /// The `.exe`/`.dll` filter used by every picker in the application.
    pub fn executables() -> Self {
        Self {
            name: "可执行文件".to_string(),
            extensions: crate::models::SUPPORTED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

/// Packer, scanner, release, and configuration services.
///
/// Methods return `Send` futures so the orchestrator can run a window of calls on a
/// `tokio::task::JoinSet`.
pub trait CommandGateway: Send + Sync + 'static {
    /// Run the packer once; `Ok` carries the success report.
    fn invoke_pack(
        &self,
        request: PackRequest,
    ) -> impl Future<Output = Result<String, GatewayError>> + Send;

    /// List processable files below `path`.
    fn scan_folder(
        &self,
        path: &Utf8Path,
        include_subfolders: bool,
    ) -> impl Future<Output = Result<Vec<Utf8PathBuf>, GatewayError>> + Send;

    /// First line of the packer's `--version` output.
    fn tool_version(&self) -> impl Future<Output = Result<String, GatewayError>> + Send;

    fn check_for_update(&self) -> impl Future<Output = Result<UpdateInfo, GatewayError>> + Send;

    /// Fetch a release asset and stage it for installation, returning its local path.
    fn download_and_install(
        &self,
        url: &str,
        filename: &str,
    ) -> impl Future<Output = Result<Utf8PathBuf, GatewayError>> + Send;

    /// Hand a staged installer over to the operating system.
    fn launch_installer(
        &self,
        path: &Utf8Path,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn load_config(&self) -> impl Future<Output = Result<AppConfig, GatewayError>> + Send;

    fn save_config(
        &self,
        config: &AppConfig,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Native open/save pickers. `None` means the user cancelled.
pub trait FileDialogs: Send + Sync + 'static {
    fn select_files(
        &self,
        filters: &[FileFilter],
        multiple: bool,
    ) -> impl Future<Output = Option<Vec<Utf8PathBuf>>> + Send;

    fn select_save_target(
        &self,
        filters: &[FileFilter],
        default_path: &Utf8Path,
    ) -> impl Future<Output = Option<Utf8PathBuf>> + Send;
}
