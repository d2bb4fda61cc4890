use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Asset name fragments offered in the update prompt, with their labels.
pub const DOWNLOAD_VARIANTS: &[(&str, &str)] = &[("portable.exe", "便携版"), ("setup.exe", "安装版")];

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// Result of an update check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    pub has_update: bool,
    pub current_version: String,
    pub latest_version: String,
    #[serde(default)]
    pub release_url: String,
    #[serde(default)]
    pub release_name: String,
    #[serde(default)]
    pub release_notes: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl UpdateInfo {
    /// Assets that belong in the prompt, in release order.
    pub fn download_options(&self) -> Vec<DownloadOption> {
        let labels: IndexMap<&str, &str> = DOWNLOAD_VARIANTS.iter().copied().collect();

        self.assets
            .iter()
            .filter_map(|asset| {
                let (_, label) = labels
                    .iter()
                    .find(|(fragment, _)| asset.name.contains(*fragment))?;
                Some(DownloadOption {
                    label: (*label).to_string(),
                    name: asset.name.clone(),
                    url: asset.download_url.clone(),
                    size: asset.size,
                })
            })
            .collect()
    }
}

/// One selectable download in the update prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOption {
    pub label: String,
    pub name: String,
    pub url: String,
    pub size: u64,
}

/// Everything the interaction layer needs to render the update prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePrompt {
    /// `v1.0.0 → v1.1.0`
    pub version_line: String,
    pub published_at: String,
    pub release_notes: String,
    pub options: Vec<DownloadOption>,
}

impl From<&UpdateInfo> for UpdatePrompt {
    fn from(info: &UpdateInfo) -> Self {
        Self {
            version_line: format!("{} → {}", info.current_version, info.latest_version),
            published_at: info.published_at.clone(),
            release_notes: info.release_notes.clone(),
            options: info.download_options(),
        }
    }
}
