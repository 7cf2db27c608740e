use shimforge_contract::LibraryVersion;

use super::{NativeLibraryLoader, Platform};

/// Versioned dylib names down to the bare `lib{name}.dylib`.
///
/// A missing version is treated as `0.0.0`, so four names are always produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct MachOLoader;

impl NativeLibraryLoader for MachOLoader {
    fn platform(&self) -> Platform {
        Platform::MachO
    }

    fn candidate_names(&self, name: &str, version: Option<LibraryVersion>) -> Vec<String> {
        let LibraryVersion {
            major,
            minor,
            patch,
        } = version.unwrap_or_default();
        vec![
            format!("lib{name}.{major}.{minor}.{patch}.dylib"),
            format!("lib{name}.{major}.{minor}.dylib"),
            format!("lib{name}.{major}.dylib"),
            format!("lib{name}.dylib"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versioned() {
        assert_eq!(
            MachOLoader.candidate_names("ebur128", Some(LibraryVersion::new(1, 2, 4))),
            vec![
                "libebur128.1.2.4.dylib",
                "libebur128.1.2.dylib",
                "libebur128.1.dylib",
                "libebur128.dylib",
            ]
        );
    }

    #[test]
    fn test_unversioned_uses_zero() {
        assert_eq!(
            MachOLoader.candidate_names("z", None),
            vec!["libz.0.0.0.dylib", "libz.0.0.dylib", "libz.0.dylib", "libz.dylib"]
        );
    }
}
