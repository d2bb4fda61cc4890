use crate::models::AppConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File name of the persisted settings.
pub const CONFIG_FILE_NAME: &str = "upx_gui_config.yaml";

/// Prefix of environment variables that override file settings
/// (`UPX_TOOLS_COMPRESSION_LEVEL=7`, `UPX_TOOLS_OVERWRITE=false`, ...).
pub const ENV_PREFIX: &str = "UPX_TOOLS";

/// Configuration manager for loading and saving the settings file.
///
/// Loading layers the YAML file under `UPX_TOOLS_*` environment overrides; any field
/// missing from both falls back to its [`AppConfig`] default.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// The directory of the running executable, or the working directory when that
    /// cannot be determined.
    pub fn default_dir() -> Utf8PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| Utf8PathBuf::try_from(exe).ok())
            .and_then(|exe| exe.parent().map(Utf8Path::to_path_buf))
            .unwrap_or_else(|| Utf8PathBuf::from("."))
    }

    /// Load the settings.
    ///
    /// # Returns
    /// The loaded AppConfig, or defaults (plus environment overrides) if the file
    /// doesn't exist
    pub fn load(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
        }

        let settings = config::Config::builder()
            .add_source(
                config::File::new(self.config_path.as_str(), config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        let config: AppConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        tracing::info!("Loaded config from {}", self.config_path);
        Ok(config)
    }

    /// Save the settings.
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Whether a settings file has been saved before.
    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}
