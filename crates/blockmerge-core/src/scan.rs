//! Recursive discovery of project files.
//!
//! A scan locks onto the first recognized extension it meets and ignores the
//! other product variant from then on. The lock is returned to the caller so
//! it can be handed to a later scan instead of living in global state.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::backup::BACKUP_DIR_NAME;
use crate::error::Result;
use crate::platform::Platform;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectScan {
    /// Extension family in effect for this scan, if any file was recognized.
    pub platform: Option<Platform>,
    pub files: Vec<PathBuf>,
}

/// Walk `root` and collect project files of a single extension family.
///
/// Within each directory, files come before subdirectories and entries are
/// ordered by name. When `lock` is given, only that family is collected;
/// otherwise the first recognized file decides.
pub fn scan_project_files(root: &Path, lock: Option<Platform>) -> Result<ProjectScan> {
    let mut scan = ProjectScan {
        platform: lock,
        files: Vec::new(),
    };
    if !root.exists() {
        tracing::warn!("Folder {} does not exist, nothing to scan", root.display());
        return Ok(scan);
    }

    for entry in walker(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(platform) = Platform::from_path(entry.path()) else {
            continue;
        };

        let active = *scan.platform.get_or_insert(platform);
        if platform == active {
            tracing::info!("Found file at path: {}", entry.path().display());
            scan.files.push(entry.into_path());
        } else {
            tracing::debug!(
                path = %entry.path().display(),
                active = %active,
                "Skipping project file of the other platform"
            );
        }
    }

    Ok(scan)
}

/// First recognized project file under `dir`, used to locate the merge target.
/// Snapshots in the backup area are never candidates.
pub fn first_project_file(dir: &Path) -> Result<Option<(PathBuf, Platform)>> {
    let entries = walker(dir).filter_entry(|entry| {
        !(entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == BACKUP_DIR_NAME)
    });
    for entry in entries {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(platform) = Platform::from_path(entry.path()) {
            return Ok(Some((entry.into_path(), platform)));
        }
    }
    Ok(None)
}

fn walker(root: &Path) -> walkdir::IntoIter {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by(|a: &DirEntry, b: &DirEntry| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
}
