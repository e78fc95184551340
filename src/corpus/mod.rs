use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Extension (case-insensitive) of the clips picked up by [`discover_clips`].
pub const CLIP_EXTENSION: &str = "wav";

/// One labelled subdirectory of a corpus root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDir {
    pub label: String,
    pub path: PathBuf,
}

fn is_clip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case(CLIP_EXTENSION))
}

/// Lazily walks `root` and yields every clip file below it. The walk order is
/// whatever the filesystem gives; unreadable entries are logged and skipped.
pub fn discover_clips(root: &Path) -> Result<impl Iterator<Item = PathBuf>> {
    if !root.is_dir() {
        return Err(Error::fs(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "clip root is not a directory"),
        ));
    }

    Ok(WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_clip(e.path()))
        .map(|e| e.into_path()))
}

/// Lists the immediate subdirectories of `root`, sorted by label.
pub fn class_dirs(root: &Path) -> Result<Vec<ClassDir>> {
    let entries = fs::read_dir(root).map_err(|e| Error::fs(root, e))?;

    let mut classes = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::fs(root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        classes.push(ClassDir {
            label: entry.file_name().to_string_lossy().into_owned(),
            path,
        });
    }
    classes.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(classes)
}

/// Deletes `dir` with everything in it, then recreates it empty.
///
/// Whatever was stored under `dir` is gone afterwards; never point this at
/// a directory holding anything but generated output.
pub fn reset_storage(dir: &Path) -> Result<()> {
    if dir.exists() {
        info!("clearing {}", dir.display());
        fs::remove_dir_all(dir).map_err(|e| Error::fs(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| Error::fs(dir, e))
}
