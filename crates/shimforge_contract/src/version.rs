use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version of a native library, used to pick versioned file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("version string is empty")]
    Empty,
    #[error("version `{0}` has too many components")]
    TooManyComponents(String),
    #[error("invalid version component `{component}` in `{version}`")]
    InvalidComponent { version: String, component: String },
}

impl LibraryVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Default for LibraryVersion {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for LibraryVersion {
    type Err = VersionParseError;

    /// Accepts `1`, `1.2`, `1.2.4` and `1.2.4.0`; missing components are zero and a trailing
    /// revision component is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() > 4 {
            return Err(VersionParseError::TooManyComponents(trimmed.to_string()));
        }

        let mut numbers = [0u32; 3];
        for (idx, part) in parts.iter().enumerate() {
            let value = part
                .parse::<u32>()
                .map_err(|_| VersionParseError::InvalidComponent {
                    version: trimmed.to_string(),
                    component: (*part).to_string(),
                })?;
            if let Some(slot) = numbers.get_mut(idx) {
                *slot = value;
            }
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let version: LibraryVersion = "1.2.4".parse().unwrap();
        assert_eq!(version, LibraryVersion::new(1, 2, 4));
        assert_eq!(version.to_string(), "1.2.4");
    }

    #[test]
    fn test_parse_partial() {
        assert_eq!("6".parse::<LibraryVersion>().unwrap(), LibraryVersion::new(6, 0, 0));
        assert_eq!("2.0".parse::<LibraryVersion>().unwrap(), LibraryVersion::new(2, 0, 0));
        assert_eq!(
            "1.2.4.9".parse::<LibraryVersion>().unwrap(),
            LibraryVersion::new(1, 2, 4)
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<LibraryVersion>(), Err(VersionParseError::Empty));
        assert!(matches!(
            "1.2.3.4.5".parse::<LibraryVersion>(),
            Err(VersionParseError::TooManyComponents(_))
        ));
        assert!(matches!(
            "1.x".parse::<LibraryVersion>(),
            Err(VersionParseError::InvalidComponent { .. })
        ));
    }
}
