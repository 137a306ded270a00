use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort a merge run. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The outer JSON record is malformed or lacks the workspace payload.
    #[error("cannot decode project file {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    /// The embedded workspace markup is not well-formed.
    #[error("malformed workspace markup in {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("block #{ordinal} in {} has no id attribute", .path.display())]
    MissingIdentifier { path: PathBuf, ordinal: usize },

    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn decode(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Error::Decode {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(Path::to_path_buf).unwrap_or_default();
        let message = err.to_string();
        let source = err
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::other(message));
        Error::Filesystem { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_file() {
        let err = Error::decode("Merge/Robot.v5blocks", "missing field `workspace`");
        let text = err.to_string();
        assert!(text.contains("Merge/Robot.v5blocks"));
        assert!(text.contains("workspace"));

        let err = Error::MissingIdentifier {
            path: PathBuf::from("Modules/drive.v5blocks"),
            ordinal: 3,
        };
        assert_eq!(
            err.to_string(),
            "block #3 in Modules/drive.v5blocks has no id attribute"
        );
    }

    #[test]
    fn test_io_keeps_source() {
        let err = Error::io(
            "Modules",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        match err {
            Error::Filesystem { path, source } => {
                assert_eq!(path, PathBuf::from("Modules"));
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
