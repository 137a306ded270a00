pub mod backup;
pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod scan;

pub use backup::{snapshot_and_prune, BackupOutcome, BACKUP_DIR_NAME};
pub use config::Settings;
pub use error::{Error, Result};
pub use platform::Platform;
pub use scan::{first_project_file, scan_project_files, ProjectScan};
