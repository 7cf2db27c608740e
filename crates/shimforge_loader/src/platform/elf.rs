use shimforge_contract::LibraryVersion;

use super::{NativeLibraryLoader, Platform};

/// `lib{name}.so`, or the versioned sonames from most to least specific.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElfLoader;

impl NativeLibraryLoader for ElfLoader {
    fn platform(&self) -> Platform {
        Platform::Elf
    }

    fn candidate_names(&self, name: &str, version: Option<LibraryVersion>) -> Vec<String> {
        let Some(version) = version else {
            return vec![format!("lib{name}.so")];
        };

        let LibraryVersion {
            major,
            minor,
            patch,
        } = version;
        vec![
            format!("lib{name}.so.{major}.{minor}.{patch}"),
            format!("lib{name}.so.{major}.{minor}"),
            format!("lib{name}.so.{major}"),
        ]
    }
}
