use crate::models::task::{CompressionLevel, PackOptions};
use serde::{Deserialize, Serialize};

/// Persisted user settings, stored in `upx_gui_config.yaml`.
///
/// Every field has a serde default so older or partial files still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 1 through 9, or 10 for `--best`.
    pub compression_level: CompressionLevel,

    /// Write packed output back into the input file instead of asking for a target.
    pub overwrite: bool,

    /// Copy the input to `<input>.bak` before packing.
    pub backup: bool,

    pub lzma: bool,

    pub ultra_brute: bool,

    /// Recurse into subfolders when a dropped path is a folder.
    pub include_subfolders: bool,

    pub force_compress: bool,

    pub auto_check_update: bool,

    /// Overrides the derived batch window size.
    pub batch_size: Option<usize>,

    /// Explicit location of the UPX executable.
    pub upx_path: Option<String>,

    pub pack_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            compression_level: CompressionLevel::default(),
            overwrite: true,
            backup: false,
            lzma: false,
            ultra_brute: false,
            include_subfolders: false,
            force_compress: false,
            auto_check_update: true,
            batch_size: None,
            upx_path: None,
            pack_timeout_secs: default_pack_timeout(),
        }
    }
}

fn default_pack_timeout() -> u64 {
    300
}

impl AppConfig {
    /// Pack options for the current settings.
    pub fn pack_options(&self) -> PackOptions {
        PackOptions {
            compression_level: self.compression_level,
            backup: self.backup,
            lzma: self.lzma,
            ultra_brute: self.ultra_brute,
            force: self.force_compress,
        }
    }
}
