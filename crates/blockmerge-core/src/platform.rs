use std::fmt;
use std::path::Path;

/// Product variant a project file belongs to, identified by its extension.
/// A run only ever works with one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    V5,
    Iq,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::V5, Platform::Iq];

    /// Extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Platform::V5 => "v5blocks",
            Platform::Iq => "iqblocks",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "v5blocks" => Some(Platform::V5),
            "iqblocks" => Some(Platform::Iq),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(
            Platform::from_path(Path::new("Modules/drive.v5blocks")),
            Some(Platform::V5)
        );
        assert_eq!(
            Platform::from_path(Path::new("arm.iqblocks")),
            Some(Platform::Iq)
        );
        assert_eq!(Platform::from_path(Path::new("notes.txt")), None);
        assert_eq!(Platform::from_path(Path::new("v5blocks")), None);
        // Extensions are matched exactly.
        assert_eq!(Platform::from_path(Path::new("drive.V5BLOCKS")), None);
    }

    #[test]
    fn test_extension_round_trips() {
        for platform in Platform::ALL {
            assert_eq!(Platform::from_extension(platform.extension()), Some(platform));
        }
        assert_eq!(Platform::Iq.to_string(), ".iqblocks");
    }
}
