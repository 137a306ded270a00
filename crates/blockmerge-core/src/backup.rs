//! Rotating snapshots of the merge target, taken before every merge.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::error::{Error, Result};

/// Sibling directory of the merge target that holds its snapshots.
pub const BACKUP_DIR_NAME: &str = "PreviousVersions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    pub created: PathBuf,
    /// Old snapshots evicted to stay within the retention limit.
    pub removed: Vec<PathBuf>,
}

/// Copy `path` into its backup area and prune so that at most `max_kept`
/// snapshots remain, counting the new one.
pub fn snapshot_and_prune(path: &Path, max_kept: usize) -> Result<BackupOutcome> {
    snapshot_and_prune_at(path, max_kept, Local::now())
}

/// [`snapshot_and_prune`] with an explicit clock reading for the file name.
pub fn snapshot_and_prune_at(
    path: &Path,
    max_kept: usize,
    now: DateTime<Local>,
) -> Result<BackupOutcome> {
    snapshot_with(path, max_kept, now, |from, to| fs::copy(from, to).map(|_| ()))
}

/// Old snapshots are only evicted once the new copy is complete.
fn snapshot_with<F>(
    path: &Path,
    max_kept: usize,
    now: DateTime<Local>,
    copy: F,
) -> Result<BackupOutcome>
where
    F: FnOnce(&Path, &Path) -> std::io::Result<()>,
{
    if max_kept == 0 {
        return Err(Error::Config("backup retention must be at least 1".into()));
    }
    let meta = fs::metadata(path).map_err(|e| Error::io(path, e))?;
    if !meta.is_file() {
        return Err(Error::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }

    let backup_dir = backup_dir_for(path);
    if !backup_dir.exists() {
        fs::create_dir_all(&backup_dir).map_err(|e| Error::io(&backup_dir, e))?;
        tracing::info!("Created {} folder", backup_dir.display());
    }

    let created = free_backup_path(&backup_dir, path, now);
    if let Err(e) = copy(path, &created) {
        let _ = fs::remove_file(&created);
        return Err(Error::io(&created, e));
    }
    tracing::info!("Created new backup: {}", created.display());

    let removed = prune(&backup_dir, max_kept - 1, &created)?;

    Ok(BackupOutcome { created, removed })
}

pub fn backup_dir_for(path: &Path) -> PathBuf {
    path.parent()
        .unwrap_or_else(|| Path::new(""))
        .join(BACKUP_DIR_NAME)
}

/// Remove the oldest snapshots (by modification time, then name) until at
/// most `keep` remain besides `current`, which is never a candidate.
fn prune(backup_dir: &Path, keep: usize, current: &Path) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<(SystemTime, PathBuf)> = Vec::new();
    let dir = fs::read_dir(backup_dir).map_err(|e| Error::io(backup_dir, e))?;
    for entry in dir {
        let entry = entry.map_err(|e| Error::io(backup_dir, e))?;
        let path = entry.path();
        if path == current {
            continue;
        }
        let meta = entry.metadata().map_err(|e| Error::io(&path, e))?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().map_err(|e| Error::io(&path, e))?;
        entries.push((modified, path));
    }

    if entries.len() <= keep {
        return Ok(Vec::new());
    }

    entries.sort();
    let excess = entries.len() - keep;
    let mut removed = Vec::with_capacity(excess);
    for (_, old) in entries.into_iter().take(excess) {
        fs::remove_file(&old).map_err(|e| Error::io(&old, e))?;
        tracing::info!("Removed old backup: {}", old.display());
        removed.push(old);
    }
    Ok(removed)
}

/// `<stem>_<YYYYMMDD_HHMMSS>.<ext>`, with `_<n>` appended to the stem part
/// when a snapshot from the same second already exists.
fn free_backup_path(backup_dir: &Path, path: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let base = format!("{}_{}", stem, now.format("%Y%m%d_%H%M%S"));

    let name_for = |suffix: Option<usize>| {
        let mut name = base.clone();
        if let Some(n) = suffix {
            name.push_str(&format!("_{n}"));
        }
        if let Some(ext) = &ext {
            name.push('.');
            name.push_str(ext);
        }
        backup_dir.join(name)
    };

    let mut candidate = name_for(None);
    let mut n = 1;
    while candidate.exists() {
        candidate = name_for(Some(n));
        n += 1;
    }
    candidate
}
