// GitHub release checks, asset downloads, and installer hand-off

use crate::models::{ReleaseAsset, UpdateInfo};
use camino::{Utf8Path, Utf8PathBuf};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

pub const GITHUB_REPO: &str = "Y-ASLant/UPX-Tools";

const USER_AGENT: &str = "UPX-Tools/1.0";

/// Directory below the system temp dir that receives downloaded installers.
pub const UPDATE_DIR_NAME: &str = "upx-tools-update";

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("创建 HTTP 客户端失败: {0}")]
    Client(#[source] reqwest::Error),

    #[error("网络请求失败: {0}")]
    Request(#[source] reqwest::Error),

    #[error("GitHub API 请求失败: {0}")]
    Api(StatusCode),

    #[error("解析响应失败: {0}")]
    Parse(#[source] reqwest::Error),

    #[error("HTTP {0}")]
    DownloadStatus(StatusCode),

    #[error("读取下载内容失败: {0}")]
    Body(#[source] reqwest::Error),

    #[error("无效的文件名: {0}")]
    InvalidFilename(String),

    #[error("创建临时目录失败: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("保存文件失败: {0}")]
    Save(#[source] std::io::Error),

    #[error("{0}")]
    Launch(#[source] std::io::Error),
}

/// `releases/latest` response, reduced to the fields we use.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    pub html_url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

impl GitHubRelease {
    /// Compare against `current_version` and convert.
    pub fn into_update_info(self, current_version: &str) -> UpdateInfo {
        UpdateInfo {
            has_update: version_compare(&self.tag_name, current_version),
            current_version: current_version.to_string(),
            latest_version: self.tag_name,
            release_url: self.html_url,
            release_name: self.name.unwrap_or_default(),
            release_notes: self.body.unwrap_or_default(),
            published_at: self.published_at.unwrap_or_default(),
            assets: self
                .assets
                .into_iter()
                .map(|asset| ReleaseAsset {
                    name: asset.name,
                    download_url: asset.browser_download_url,
                    size: asset.size,
                })
                .collect(),
        }
    }
}

/// The running version as shown to users (`v1.2.0`).
pub fn current_version() -> String {
    format!("v{}", env!("CARGO_PKG_VERSION"))
}

/// True when `latest` is newer than `current`.
///
/// A leading `v` is ignored, components are compared numerically, missing components
/// count as 0, and non-numeric components are skipped.
pub fn version_compare(latest: &str, current: &str) -> bool {
    fn parts(version: &str) -> Vec<u32> {
        version
            .trim_start_matches('v')
            .split('.')
            .filter_map(|part| part.parse().ok())
            .collect()
    }

    let latest = parts(latest);
    let current = parts(current);

    for i in 0..latest.len().max(current.len()) {
        let l = latest.get(i).copied().unwrap_or(0);
        let c = current.get(i).copied().unwrap_or(0);
        if l != c {
            return l > c;
        }
    }
    false
}

/// Default target directory for downloads.
pub fn default_download_dir() -> Utf8PathBuf {
    Utf8PathBuf::try_from(std::env::temp_dir())
        .unwrap_or_else(|_| Utf8PathBuf::from("."))
        .join(UPDATE_DIR_NAME)
}

/// Client for the project's GitHub releases.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
    current_version: String,
    download_dir: Utf8PathBuf,
}

impl ReleaseClient {
    /// Client for the latest release of [`GITHUB_REPO`].
    ///
    /// A non-empty `GITHUB_TOKEN` environment variable is sent as a bearer token to lift
    /// the anonymous API rate limit.
    pub fn new() -> Result<Self, ReleaseError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(ReleaseError::Client)?;

        let token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        Ok(Self {
            client,
            api_url: format!("https://api.github.com/repos/{}/releases/latest", GITHUB_REPO),
            token,
            current_version: current_version(),
            download_dir: default_download_dir(),
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = version.into();
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn download_dir(&self) -> &Utf8Path {
        &self.download_dir
    }

    /// Fetch the latest release and compare it to the running version.
    pub async fn check_latest(&self) -> Result<UpdateInfo, ReleaseError> {
        let mut request = self
            .client
            .get(&self.api_url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ReleaseError::Request)?;
        if !response.status().is_success() {
            return Err(ReleaseError::Api(response.status()));
        }

        let release: GitHubRelease = response.json().await.map_err(ReleaseError::Parse)?;
        tracing::info!(
            "Latest release: {} (running {})",
            release.tag_name,
            self.current_version
        );

        Ok(release.into_update_info(&self.current_version))
    }

    /// Download `url` into the download directory as `filename`.
    pub async fn download(&self, url: &str, filename: &str) -> Result<Utf8PathBuf, ReleaseError> {
        let target = self.target_path(filename)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ReleaseError::Request)?;
        if !response.status().is_success() {
            return Err(ReleaseError::DownloadStatus(response.status()));
        }

        let bytes = response.bytes().await.map_err(ReleaseError::Body)?;

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(ReleaseError::CreateDir)?;
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(ReleaseError::Save)?;

        tracing::info!("Saved {} bytes to {}", bytes.len(), target);
        Ok(target)
    }

    /// Reject names that would escape the download directory.
    fn target_path(&self, filename: &str) -> Result<Utf8PathBuf, ReleaseError> {
        match Utf8Path::new(filename).file_name() {
            Some(name) if name == filename => Ok(self.download_dir.join(name)),
            _ => Err(ReleaseError::InvalidFilename(filename.to_string())),
        }
    }
}

/// Open a downloaded installer with the platform's default handler.
pub async fn launch_installer(path: &Utf8Path) -> Result<(), ReleaseError> {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]).arg(path.as_str());
        c
    } else if cfg!(target_os = "macos") {
        let mut c = Command::new("open");
        c.arg(path.as_str());
        c
    } else {
        let mut c = Command::new("xdg-open");
        c.arg(path.as_str());
        c
    };

    cmd.spawn().map_err(ReleaseError::Launch)?;
    tracing::info!("Launched installer {}", path);
    Ok(())
}
