//! Folder enumeration: which images need a caption and which already have
//! one.

use std::path::{Path, PathBuf};

use crate::error::CaptionError;
use crate::state_machine::WorkItem;

/// File extensions treated as images, matched case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Result of enumerating a folder.
#[derive(Debug)]
pub struct FolderScan {
    pub folder: PathBuf,
    /// Items still needing a caption, sorted by file name.
    pub pending: Vec<WorkItem>,
    /// Names of images whose caption sidecar already exists, sorted.
    pub already_captioned: Vec<String>,
}

/// Enumerates eligible images directly under `folder` (subdirectories are
/// not entered). Images whose `.txt` sidecar already exists are set aside,
/// which is what makes rerunning over the same folder idempotent.
pub fn scan_folder(folder: &Path) -> Result<FolderScan, CaptionError> {
    let entries = std::fs::read_dir(folder).map_err(|source| CaptionError::FolderUnreadable {
        path: folder.to_path_buf(),
        source,
    })?;

    let mut pending = Vec::new();
    let mut already_captioned = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|source| CaptionError::FolderUnreadable {
            path: folder.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() || !is_image(&path) {
            continue;
        }
        let item = WorkItem::new(path);
        if item.caption_path.exists() {
            already_captioned.push(item.file_name());
        } else {
            pending.push(item);
        }
    }

    // Directory order is platform-dependent; sort for reproducible runs.
    pending.sort_by(|a, b| a.image_path.cmp(&b.image_path));
    already_captioned.sort();

    Ok(FolderScan {
        folder: folder.to_path_buf(),
        pending,
        already_captioned,
    })
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
