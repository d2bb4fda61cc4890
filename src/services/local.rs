// The production CommandGateway: local UPX, local filesystem, GitHub releases

use crate::config::ConfigManager;
use crate::models::{AppConfig, PackRequest, UpdateInfo};
use crate::services::gateway::{CommandGateway, GatewayError};
use crate::services::packer::{PackError, PackerService};
use crate::services::release::{self, ReleaseClient};
use crate::services::scanner::{self, ScanError};
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use std::time::Duration;

/// [`CommandGateway`] that runs everything on this machine.
///
/// UPX is located once at construction; when it cannot be found every packer call
/// fails with the "tool not found" report instead of failing construction, so the rest
/// of the application (scanning, updates, settings) stays usable.
#[derive(Debug, Clone)]
pub struct LocalGateway {
    packer: Option<PackerService>,
    releases: ReleaseClient,
    config: ConfigManager,
}

impl LocalGateway {
    pub fn new(config: ConfigManager, settings: &AppConfig) -> Result<Self> {
        let timeout = Duration::from_secs(settings.pack_timeout_secs.max(1));
        let packer = match PackerService::discover(settings.upx_path.as_deref(), timeout) {
            Ok(packer) => Some(packer),
            Err(e) => {
                tracing::warn!("UPX unavailable: {}", e);
                None
            }
        };

        Ok(Self {
            packer,
            releases: ReleaseClient::new()?,
            config,
        })
    }

    pub fn with_packer(mut self, packer: PackerService) -> Self {
        self.packer = Some(packer);
        self
    }

    pub fn with_release_client(mut self, releases: ReleaseClient) -> Self {
        self.releases = releases;
        self
    }

    pub fn upx_path(&self) -> Option<&Utf8Path> {
        self.packer.as_ref().map(PackerService::upx_path)
    }

    fn packer(&self) -> Result<&PackerService, GatewayError> {
        self.packer
            .as_ref()
            .ok_or_else(|| GatewayError::ExternalTool(PackError::ToolNotFound.to_string()))
    }
}

impl CommandGateway for LocalGateway {
    async fn invoke_pack(&self, request: PackRequest) -> Result<String, GatewayError> {
        self.packer()?
            .pack(&request)
            .await
            .map_err(|e| GatewayError::ExternalTool(e.to_string()))
    }

    async fn scan_folder(
        &self,
        path: &Utf8Path,
        include_subfolders: bool,
    ) -> Result<Vec<Utf8PathBuf>, GatewayError> {
        let folder = path.to_path_buf();
        let scanned =
            tokio::task::spawn_blocking(move || scanner::scan_folder(&folder, include_subfolders))
                .await
                .map_err(|e| GatewayError::Scan(e.to_string()))?;

        scanned.map_err(|e| match e {
            ScanError::NotADirectory(path) => GatewayError::NotAFolder(path.to_string()),
            other => GatewayError::Scan(other.to_string()),
        })
    }

    async fn tool_version(&self) -> Result<String, GatewayError> {
        self.packer()?
            .version()
            .await
            .map_err(|e| GatewayError::ExternalTool(e.to_string()))
    }

    async fn check_for_update(&self) -> Result<UpdateInfo, GatewayError> {
        self.releases
            .check_latest()
            .await
            .map_err(|e| GatewayError::UpdateCheck(e.to_string()))
    }

    async fn download_and_install(
        &self,
        url: &str,
        filename: &str,
    ) -> Result<Utf8PathBuf, GatewayError> {
        self.releases
            .download(url, filename)
            .await
            .map_err(|e| GatewayError::Download(e.to_string()))
    }

    async fn launch_installer(&self, path: &Utf8Path) -> Result<(), GatewayError> {
        release::launch_installer(path)
            .await
            .map_err(|e| GatewayError::Launch(e.to_string()))
    }

    async fn load_config(&self) -> Result<AppConfig, GatewayError> {
        self.config
            .load()
            .map_err(|e| GatewayError::Config(format!("{:#}", e)))
    }

    async fn save_config(&self, config: &AppConfig) -> Result<(), GatewayError> {
        self.config
            .save(config)
            .map_err(|e| GatewayError::Config(format!("{:#}", e)))
    }
}
