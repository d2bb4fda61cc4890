// Folder scanning for processable executables

use crate::models::has_supported_extension;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("路径不存在: {0}")]
    NotFound(Utf8PathBuf),

    #[error("不是文件夹: {0}")]
    NotADirectory(Utf8PathBuf),
}

/// List the `.exe`/`.dll` files in `folder` (extension match is case-insensitive).
///
/// Only the folder itself is read unless `include_subfolders` is set. Symlinks are
/// followed. Unreadable entries, broken links and non-UTF-8 names are skipped.
/// Results are sorted by path.
pub fn scan_folder(folder: &Utf8Path, include_subfolders: bool) -> Result<Vec<Utf8PathBuf>, ScanError> {
    if !folder.exists() {
        return Err(ScanError::NotFound(folder.to_path_buf()));
    }
    if !folder.is_dir() {
        return Err(ScanError::NotADirectory(folder.to_path_buf()));
    }

    let max_depth = if include_subfolders { usize::MAX } else { 1 };

    let mut files: Vec<Utf8PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| Utf8PathBuf::try_from(entry.into_path()).ok())
        .filter(|path| has_supported_extension(path))
        .collect();

    files.sort();
    tracing::debug!("Scanned {}: {} processable files", folder, files.len());

    Ok(files)
}
