//! File naming policies for each executable format.

mod elf;
mod macho;
mod pe;

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use shimforge_contract::LibraryVersion;
use shimforge_utils::{BindingError, Result};
use tracing::debug;

use crate::handle::LibraryHandle;
use crate::os;

pub use elf::ElfLoader;
pub use macho::MachOLoader;
pub use pe::PeLoader;

/// Executable format of the host, which decides how library files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Elf,
    MachO,
    Pe,
}

impl Platform {
    pub const fn host() -> Self {
        if cfg!(windows) {
            Self::Pe
        } else if cfg!(target_vendor = "apple") {
            Self::MachO
        } else {
            Self::Elf
        }
    }

    pub fn loader(self) -> Box<dyn NativeLibraryLoader> {
        match self {
            Self::Elf => Box::new(ElfLoader),
            Self::MachO => Box::new(MachOLoader),
            Self::Pe => Box::new(PeLoader::host()),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elf => f.write_str("elf"),
            Self::MachO => f.write_str("mach-o"),
            Self::Pe => f.write_str("pe"),
        }
    }
}

/// Turns a logical library name into an opened [`LibraryHandle`].
///
/// Implementors only decide the candidate names; opening and the search loop are shared.
pub trait NativeLibraryLoader: Send + Sync {
    fn platform(&self) -> Platform;

    /// File names to try, most specific first.
    fn candidate_names(&self, name: &str, version: Option<LibraryVersion>) -> Vec<String>;

    /// Open one file. Failures are logged and reported as `None`.
    fn open(&self, path: &Path) -> Option<LibraryHandle> {
        match os::open(path) {
            Ok(library) => Some(LibraryHandle::new(library, path.to_path_buf())),
            Err(err) => {
                debug!(candidate = %path.display(), error = %err, "candidate did not load");
                None
            }
        }
    }

    /// Try every candidate name through the platform's default search rules.
    fn load_native_library(
        &self,
        name: &str,
        version: Option<LibraryVersion>,
    ) -> Result<LibraryHandle> {
        let candidates = self.candidate_names(name, version);
        first_opened(self, name, version, candidates)
    }

    /// Try every candidate name inside `dir`.
    fn load_native_library_in(
        &self,
        dir: &Path,
        name: &str,
        version: Option<LibraryVersion>,
    ) -> Result<LibraryHandle> {
        let candidates = self
            .candidate_names(name, version)
            .into_iter()
            .map(|candidate| dir.join(candidate).display().to_string())
            .collect();
        first_opened(self, name, version, candidates)
    }
}

fn first_opened<L: NativeLibraryLoader + ?Sized>(
    loader: &L,
    name: &str,
    version: Option<LibraryVersion>,
    candidates: Vec<String>,
) -> Result<LibraryHandle> {
    for candidate in &candidates {
        if let Some(handle) = loader.open(Path::new(candidate)) {
            debug!(
                library = name,
                path = %candidate,
                platform = %loader.platform(),
                "loaded native library"
            );
            return Ok(handle);
        }
    }
    Err(not_found(name, version, candidates))
}

pub(crate) fn not_found(
    name: &str,
    version: Option<LibraryVersion>,
    candidates: Vec<String>,
) -> BindingError {
    BindingError::LibraryNotFound {
        name: name.to_string(),
        version: version.map(|version| version.to_string()),
        candidates,
    }
}

static HOST_LOADER: Lazy<Box<dyn NativeLibraryLoader>> = Lazy::new(|| Platform::host().loader());

/// The naming policy of the running process, selected once.
pub fn loader_for_platform() -> &'static dyn NativeLibraryLoader {
    HOST_LOADER.as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_loader_matches_host_platform() {
        assert_eq!(loader_for_platform().platform(), Platform::host());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_host_platform_is_elf_on_linux() {
        assert_eq!(Platform::host(), Platform::Elf);
    }

    #[test]
    fn test_display() {
        assert_eq!(Platform::MachO.to_string(), "mach-o");
        assert_eq!(Platform::Pe.loader().platform(), Platform::Pe);
    }
}
