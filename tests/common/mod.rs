//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use upx_tools::models::{AppConfig, PackRequest, ReleaseAsset, UpdateInfo, has_supported_extension};
use upx_tools::services::{CommandGateway, FileDialogs, FileFilter, GatewayError};

pub const SUCCESS_REPORT: &str =
    "操作成功!\n输出: {out}\n原始大小: 1.00 MB\n处理后大小: 400.00 KB\n压缩率: 39.1%";

pub const ALREADY_PACKED_REPORT: &str = "[错误] 文件已经被 UPX 加壳过了\n\n解决方案:\n- 如需重新压缩，请先使用\"脱壳解压\"功能";

/// Scriptable [`CommandGateway`].
///
/// Every pack call succeeds unless a failure was registered for its input path.
#[derive(Default)]
pub struct FakeGateway {
    failures: Mutex<HashMap<Utf8PathBuf, String>>,
    folders: Mutex<HashMap<Utf8PathBuf, Vec<Utf8PathBuf>>>,
    requests: Mutex<Vec<PackRequest>>,
    update: Mutex<Option<Result<UpdateInfo, GatewayError>>>,
    download: Mutex<Option<Result<Utf8PathBuf, GatewayError>>>,
    launch_error: Mutex<Option<GatewayError>>,
    pack_delay: Mutex<Option<Duration>>,

    /// When set, checks wait for a permit before answering
    pub check_gate: Option<Arc<Notify>>,
    /// When set, downloads wait for a permit before answering
    pub download_gate: Option<Arc<Notify>>,

    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub check_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    pub launch_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(self, path: impl Into<Utf8PathBuf>, report: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(path.into(), report.to_string());
        self
    }

    pub fn with_folder(self, folder: impl Into<Utf8PathBuf>, files: &[&str]) -> Self {
        self.folders
            .lock()
            .unwrap()
            .insert(folder.into(), files.iter().map(Utf8PathBuf::from).collect());
        self
    }

    pub fn with_pack_delay(self, delay: Duration) -> Self {
        *self.pack_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn with_update(self, result: Result<UpdateInfo, GatewayError>) -> Self {
        self.set_update(result);
        self
    }

    /// Change the answer for later update checks
    pub fn set_update(&self, result: Result<UpdateInfo, GatewayError>) {
        *self.update.lock().unwrap() = Some(result);
    }

    pub fn with_download(self, result: Result<Utf8PathBuf, GatewayError>) -> Self {
        *self.download.lock().unwrap() = Some(result);
        self
    }

    pub fn with_launch_error(self, error: GatewayError) -> Self {
        *self.launch_error.lock().unwrap() = Some(error);
        self
    }

    pub fn with_check_gate(mut self, gate: Arc<Notify>) -> Self {
        self.check_gate = Some(gate);
        self
    }

    pub fn with_download_gate(mut self, gate: Arc<Notify>) -> Self {
        self.download_gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<PackRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn pack_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl CommandGateway for FakeGateway {
    async fn invoke_pack(&self, request: PackRequest) -> Result<String, GatewayError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.pack_delay.lock().unwrap();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failure = self.failures.lock().unwrap().get(&request.input).cloned();
        let output = request.output.clone();
        self.requests.lock().unwrap().push(request);

        match failure {
            Some(report) => Err(GatewayError::ExternalTool(report)),
            None => Ok(SUCCESS_REPORT.replace("{out}", output.as_str())),
        }
    }

    async fn scan_folder(
        &self,
        path: &Utf8Path,
        _include_subfolders: bool,
    ) -> Result<Vec<Utf8PathBuf>, GatewayError> {
        if let Some(files) = self.folders.lock().unwrap().get(path) {
            return Ok(files.clone());
        }
        if has_supported_extension(path) {
            Err(GatewayError::NotAFolder(path.to_string()))
        } else {
            Err(GatewayError::Scan(format!("路径不存在: {}", path)))
        }
    }

    async fn tool_version(&self) -> Result<String, GatewayError> {
        Ok("upx 4.2.4".to_string())
    }

    async fn check_for_update(&self) -> Result<UpdateInfo, GatewayError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.check_gate {
            gate.notified().await;
        }
        self.update
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(up_to_date()))
    }

    async fn download_and_install(
        &self,
        _url: &str,
        filename: &str,
    ) -> Result<Utf8PathBuf, GatewayError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.download_gate {
            gate.notified().await;
        }
        self.download
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(Utf8PathBuf::from("/tmp/upx-tools-update").join(filename)))
    }

    async fn launch_installer(&self, _path: &Utf8Path) -> Result<(), GatewayError> {
        self.launch_calls.fetch_add(1, Ordering::SeqCst);
        match self.launch_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn load_config(&self) -> Result<AppConfig, GatewayError> {
        Ok(AppConfig::default())
    }

    async fn save_config(&self, _config: &AppConfig) -> Result<(), GatewayError> {
        Ok(())
    }
}

/// Scriptable pickers; `None` answers behave like a cancelled dialog.
#[derive(Default)]
pub struct FakeDialogs {
    pub selection: Mutex<Option<Vec<Utf8PathBuf>>>,
    pub save_target: Mutex<Option<Utf8PathBuf>>,
    pub select_calls: AtomicUsize,
    pub save_calls: AtomicUsize,
}

impl FakeDialogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selecting(files: &[&str]) -> Self {
        let dialogs = Self::default();
        *dialogs.selection.lock().unwrap() = Some(files.iter().map(Utf8PathBuf::from).collect());
        dialogs
    }

    pub fn saving_to(path: &str) -> Self {
        let dialogs = Self::default();
        *dialogs.save_target.lock().unwrap() = Some(Utf8PathBuf::from(path));
        dialogs
    }
}

impl FileDialogs for FakeDialogs {
    async fn select_files(
        &self,
        _filters: &[FileFilter],
        _multiple: bool,
    ) -> Option<Vec<Utf8PathBuf>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.selection.lock().unwrap().clone()
    }

    async fn select_save_target(
        &self,
        _filters: &[FileFilter],
        _default_path: &Utf8Path,
    ) -> Option<Utf8PathBuf> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.save_target.lock().unwrap().clone()
    }
}

pub fn up_to_date() -> UpdateInfo {
    UpdateInfo {
        has_update: false,
        current_version: "v1.2.0".to_string(),
        latest_version: "v1.2.0".to_string(),
        release_url: String::new(),
        release_name: String::new(),
        release_notes: String::new(),
        published_at: String::new(),
        assets: Vec::new(),
    }
}

pub fn update_available() -> UpdateInfo {
    let asset = |name: &str| ReleaseAsset {
        name: name.to_string(),
        download_url: format!("https://example.invalid/download/{}", name),
        size: 4096,
    };

    UpdateInfo {
        has_update: true,
        latest_version: "v1.3.0".to_string(),
        release_name: "UPX-Tools v1.3.0".to_string(),
        release_notes: "- faster batches".to_string(),
        published_at: "2026-10-01T08:00:00Z".to_string(),
        assets: vec![
            asset("UPX-Tools_1.3.0_x64-setup.exe"),
            asset("UPX-Tools_1.3.0_x64.msi"),
            asset("UPX-Tools_1.3.0-portable.exe"),
        ],
        ..up_to_date()
    }
}

pub fn paths(names: &[&str]) -> Vec<Utf8PathBuf> {
    names.iter().map(Utf8PathBuf::from).collect()
}

/// Messages of the retained log, oldest first.
pub fn messages(log: &upx_tools::LogBook) -> Vec<String> {
    log.snapshot().into_iter().map(|event| event.message).collect()
}
