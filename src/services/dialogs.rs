// Native file dialogs

use crate::services::gateway::{FileDialogs, FileFilter};
use camino::{Utf8Path, Utf8PathBuf};
use rfd::FileDialog;

/// [`FileDialogs`] backed by the platform's native pickers via `rfd`.
///
/// The blocking dialogs run on tokio's blocking pool so the runtime keeps driving
/// other tasks while a picker is open.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeDialogs;

impl NativeDialogs {
    pub fn new() -> Self {
        Self
    }
}

fn build_dialog(title: &str, filters: &[FileFilter]) -> FileDialog {
    let mut dialog = FileDialog::new().set_title(title);
    for filter in filters {
        dialog = dialog.add_filter(&filter.name, &filter.extensions);
    }
    dialog
}

fn to_utf8(path: std::path::PathBuf) -> Option<Utf8PathBuf> {
    Utf8PathBuf::try_from(path)
        .map_err(|e| {
            tracing::error!("Failed to convert path to UTF-8: {}", e);
            e
        })
        .ok()
}

impl FileDialogs for NativeDialogs {
    async fn select_files(&self, filters: &[FileFilter], multiple: bool) -> Option<Vec<Utf8PathBuf>> {
        let filters = filters.to_vec();

        let picked = tokio::task::spawn_blocking(move || {
            let dialog = build_dialog("选择文件", &filters);
            if multiple {
                dialog.pick_files()
            } else {
                dialog.pick_file().map(|path| vec![path])
            }
        })
        .await
        .map_err(|e| tracing::error!("File dialog task failed: {}", e))
        .ok()
        .flatten()?;

        let files: Vec<Utf8PathBuf> = picked.into_iter().filter_map(to_utf8).collect();
        (!files.is_empty()).then_some(files)
    }

    async fn select_save_target(
        &self,
        filters: &[FileFilter],
        default_path: &Utf8Path,
    ) -> Option<Utf8PathBuf> {
        let filters = filters.to_vec();
        let directory = default_path.parent().map(Utf8Path::to_path_buf);
        let file_name = default_path.file_name().map(str::to_string);

        tokio::task::spawn_blocking(move || {
            let mut dialog = build_dialog("保存文件", &filters);
            if let Some(dir) = directory.filter(|d| !d.as_str().is_empty()) {
                dialog = dialog.set_directory(dir);
            }
            if let Some(name) = file_name {
                dialog = dialog.set_file_name(name);
            }
            dialog.save_file()
        })
        .await
        .map_err(|e| tracing::error!("File dialog task failed: {}", e))
        .ok()
        .flatten()
        .and_then(to_utf8)
    }
}
