//! Update check and download hand-off.
//!
//! `Idle → Checking → {UpToDate | UpdateAvailable} → Downloading → Installing → Idle`
//!
//! Phase and progress are published on `watch` channels so a front end can render them
//! without polling. Download progress is simulated: a stepper task advances it in small
//! random increments (capped below 100) until the real download resolves.

use crate::metrics::Metrics;
use crate::models::{LogEvent, UpdateInfo, UpdatePrompt};
use crate::services::gateway::{CommandGateway, GatewayError};
use crate::state::LogBook;
use camino::Utf8PathBuf;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Delay between startup and the automatic update check.
pub const AUTO_CHECK_DELAY: Duration = Duration::from_secs(1);

/// Current phase of the flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdatePhase {
    #[default]
    Idle,
    Checking,
    UpToDate {
        current_version: String,
    },
    UpdateAvailable,
    Downloading {
        asset: String,
    },
    Installing {
        path: Utf8PathBuf,
    },
}

impl UpdatePhase {
    /// Downloading or installing; the prompt cannot be closed.
    pub fn is_transferring(&self) -> bool {
        matches!(self, Self::Downloading { .. } | Self::Installing { .. })
    }
}

/// A transition the flow refused, or a collaborator failure it already logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("an update check is already running")]
    CheckInProgress,

    #[error("a download is already running")]
    DownloadInProgress,

    #[error("no update is waiting to be downloaded")]
    NoUpdatePending,

    #[error("release does not offer asset: {0}")]
    UnknownAsset(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Timing of the simulated progress and the install hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepperTiming {
    pub tick: Duration,
    /// Increments are drawn from `0..max_step`
    pub max_step: u8,
    /// Simulated progress never exceeds this
    pub cap: u8,
    pub install_delay: Duration,
}

impl Default for StepperTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            max_step: 15,
            cap: 90,
            install_delay: Duration::from_secs(1),
        }
    }
}

/// Mutable flow data guarded by a short-lived lock (never held across an await).
#[derive(Debug, Default)]
struct FlowState {
    info: Option<UpdateInfo>,
    checking: bool,
    downloads_enabled: bool,
}

/// Advances simulated progress until dropped.
struct Stepper {
    handle: JoinHandle<()>,
}

impl Stepper {
    fn start(progress: Arc<watch::Sender<u8>>, timing: StepperTiming) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(timing.tick);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let step = if timing.max_step == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..timing.max_step)
                };
                progress.send_modify(|value| {
                    *value = value.saturating_add(step).min(timing.cap).max(*value);
                });
            }
        });

        Self { handle }
    }
}

impl Drop for Stepper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// The update state machine.
///
/// All transitions take `&self`; share the flow behind an `Arc` to drive it from
/// several tasks (for example the startup check and a user-initiated download).
pub struct UpdateFlow<G> {
    gateway: Arc<G>,
    log: LogBook,
    metrics: Arc<Metrics>,
    timing: StepperTiming,
    state: Mutex<FlowState>,
    phase_tx: watch::Sender<UpdatePhase>,
    progress_tx: Arc<watch::Sender<u8>>,
}

impl<G: CommandGateway> UpdateFlow<G> {
    pub fn new(gateway: Arc<G>, log: LogBook) -> Self {
        let (phase_tx, _) = watch::channel(UpdatePhase::Idle);
        let (progress_tx, _) = watch::channel(0u8);

        Self {
            gateway,
            log,
            metrics: Arc::new(Metrics::new()),
            timing: StepperTiming::default(),
            state: Mutex::new(FlowState::default()),
            phase_tx,
            progress_tx: Arc::new(progress_tx),
        }
    }

    pub fn with_timing(mut self, timing: StepperTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase_tx.borrow().clone()
    }

    /// Simulated download progress in percent.
    pub fn progress(&self) -> u8 {
        *self.progress_tx.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<UpdatePhase> {
        self.phase_tx.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.progress_tx.subscribe()
    }

    /// Whether the check trigger is enabled.
    pub fn can_check(&self) -> bool {
        !self.lock().checking
    }

    /// Whether the asset buttons of the prompt are enabled.
    pub fn downloads_enabled(&self) -> bool {
        self.lock().downloads_enabled
    }

    /// The retained release, if a prompt is (or could be) shown.
    pub fn update_info(&self) -> Option<UpdateInfo> {
        self.lock().info.clone()
    }

    /// Prompt contents while an update is on offer.
    pub fn prompt(&self) -> Option<UpdatePrompt> {
        self.lock().info.as_ref().map(UpdatePrompt::from)
    }

    /// Run an update check.
    ///
    /// Returns the phase the check settled in. On failure the error is logged, the flow
    /// returns to the phase it was in before the check, and the error is returned.
    pub async fn check(&self) -> Result<UpdatePhase, FlowError> {
        let previous = {
            let mut state = self.lock();
            if state.checking {
                tracing::debug!("Update check rejected: already checking");
                return Err(FlowError::CheckInProgress);
            }
            let previous = self.phase();
            if previous.is_transferring() {
                tracing::debug!("Update check rejected: download in progress");
                return Err(FlowError::DownloadInProgress);
            }
            state.checking = true;
            previous
        };

        self.set_phase(UpdatePhase::Checking);
        self.log.info("正在检查更新...");
        self.metrics.record_update_check();

        let result = self.gateway.check_for_update().await;

        let mut state = self.lock();
        state.checking = false;

        match result {
            Ok(info) if info.has_update => {
                tracing::info!(
                    "Update available: {} -> {}",
                    info.current_version,
                    info.latest_version
                );
                self.log.push(
                    LogEvent::success(format!("发现新版本: {}", info.latest_version))
                        .highlighted(),
                );
                state.info = Some(info);
                state.downloads_enabled = true;
                drop(state);

                self.set_phase(UpdatePhase::UpdateAvailable);
                Ok(UpdatePhase::UpdateAvailable)
            }
            Ok(info) => {
                self.log
                    .success(format!("当前已是最新版本 ({})", info.current_version));
                state.info = None;
                state.downloads_enabled = false;
                drop(state);

                let phase = UpdatePhase::UpToDate {
                    current_version: info.current_version,
                };
                self.set_phase(phase.clone());
                Ok(phase)
            }
            Err(e) => {
                // A prompt needs its release info
                let restored = if previous == UpdatePhase::UpdateAvailable && state.info.is_none()
                {
                    UpdatePhase::Idle
                } else {
                    previous
                };
                drop(state);
                tracing::warn!("Update check failed: {}", e);
                self.log.error(e.to_string());
                self.set_phase(restored);
                Err(e.into())
            }
        }
    }

    /// Check once after [`AUTO_CHECK_DELAY`] when `enabled`.
    ///
    /// Failures are already logged by [`check`](Self::check) and are not propagated.
    pub async fn auto_check(&self, enabled: bool) {
        if !enabled {
            tracing::debug!("Automatic update check disabled");
            return;
        }
        tokio::time::sleep(AUTO_CHECK_DELAY).await;
        if let Err(e) = self.check().await {
            tracing::debug!("Automatic update check did not complete: {}", e);
        }
    }

    /// Download the offered asset named `asset_name` and hand it to the installer.
    ///
    /// On success the flow ends in `Idle` with the release discarded. A failed download
    /// leaves the prompt open in `UpdateAvailable` with the asset buttons re-enabled.
    pub async fn start_download(&self, asset_name: &str) -> Result<Utf8PathBuf, FlowError> {
        let option = {
            let mut state = self.lock();
            if self.phase() != UpdatePhase::UpdateAvailable {
                return Err(if self.phase().is_transferring() {
                    FlowError::DownloadInProgress
                } else {
                    FlowError::NoUpdatePending
                });
            }
            if !state.downloads_enabled {
                return Err(FlowError::DownloadInProgress);
            }
            let option = state
                .info
                .as_ref()
                .ok_or(FlowError::NoUpdatePending)?
                .download_options()
                .into_iter()
                .find(|option| option.name == asset_name)
                .ok_or_else(|| FlowError::UnknownAsset(asset_name.to_string()))?;
            state.downloads_enabled = false;
            option
        };

        self.progress_tx.send_replace(0);
        self.set_phase(UpdatePhase::Downloading {
            asset: option.name.clone(),
        });
        self.log.info(format!("正在下载: {}", option.name));
        self.metrics.record_download_started();
        tracing::info!("Downloading {} ({} bytes)", option.url, option.size);

        let stepper = Stepper::start(Arc::clone(&self.progress_tx), self.timing);
        let downloaded = self
            .gateway
            .download_and_install(&option.url, &option.name)
            .await;
        drop(stepper);

        let path = match downloaded {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Download of {} failed: {}", option.name, e);
                self.metrics.record_download_failed();
                self.log.error(e.to_string());
                self.lock().downloads_enabled = true;
                self.set_phase(UpdatePhase::UpdateAvailable);
                return Err(e.into());
            }
        };

        self.progress_tx.send_replace(100);
        self.log.success(format!("下载完成: {}", path));
        self.log.info("正在启动安装程序...");
        self.set_phase(UpdatePhase::Installing { path: path.clone() });

        tokio::time::sleep(self.timing.install_delay).await;
        let launched = self.gateway.launch_installer(&path).await;

        {
            let mut state = self.lock();
            state.info = None;
            state.downloads_enabled = false;
        }
        self.set_phase(UpdatePhase::Idle);

        match launched {
            Ok(()) => {
                self.log.push(
                    LogEvent::success("安装程序已启动，请按提示完成安装").highlighted(),
                );
                Ok(path)
            }
            Err(e) => {
                tracing::error!("Installer launch failed: {}", e);
                self.log.error(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Close the prompt. Ignored while checking, downloading or installing; returns
    /// whether the flow was reset.
    pub fn dismiss(&self) -> bool {
        let mut state = self.lock();
        if state.checking {
            tracing::debug!("Dismiss ignored during update check");
            return false;
        }
        if self.phase().is_transferring() {
            tracing::debug!("Dismiss ignored during download");
            return false;
        }
        state.info = None;
        state.downloads_enabled = false;
        drop(state);

        self.set_phase(UpdatePhase::Idle);
        true
    }

    fn set_phase(&self, phase: UpdatePhase) {
        tracing::debug!("Update phase -> {:?}", phase);
        self.phase_tx.send_replace(phase);
    }

    fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
