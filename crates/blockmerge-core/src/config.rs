use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;

pub const DEFAULT_CONFIG_FILE: &str = "blockmerge.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Folder searched recursively for module project files.
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,
    /// Folder holding the project file that modules are merged into.
    #[serde(default = "default_merge_dir")]
    pub merge_dir: PathBuf,
    /// Backups kept in `PreviousVersions`, including the one taken this run.
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    /// When set, log output is also written to `<log_dir>/blockmerge.log`.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_pause_on_exit")]
    pub pause_on_exit: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            modules_dir: default_modules_dir(),
            merge_dir: default_merge_dir(),
            max_backups: default_max_backups(),
            log_dir: None,
            pause_on_exit: default_pause_on_exit(),
        }
    }
}

fn default_modules_dir() -> PathBuf {
    "Modules".into()
}
fn default_merge_dir() -> PathBuf {
    "Merge".into()
}
fn default_max_backups() -> usize {
    5
}
fn default_pause_on_exit() -> bool {
    true
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Like [`Settings::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.max_backups == 0 {
            return Err(Error::Config(
                "max_backups must be at least 1 (the backup taken before merging)".into(),
            ));
        }
        if self.modules_dir.as_os_str().is_empty() || self.merge_dir.as_os_str().is_empty() {
            return Err(Error::Config("modules_dir and merge_dir must not be empty".into()));
        }
        Ok(())
    }
}
