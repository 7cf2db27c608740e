//! Native library loading.
//!
//! A logical library name plus an optional version is turned into the file names the host
//! platform uses, and the first candidate that opens becomes a [`LibraryHandle`]. Handles are
//! never unloaded.

pub mod cache;
pub mod handle;
mod os;
pub mod platform;

use std::path::PathBuf;
use std::sync::Arc;

use shimforge_config::BindingConfig;
use shimforge_contract::LibraryVersion;
use shimforge_utils::{BindingError, Result};

pub use cache::HandleCache;
pub use handle::{GlobalRef, LibraryHandle};
pub use platform::{
    ElfLoader, MachOLoader, NativeLibraryLoader, PeLoader, Platform, loader_for_platform,
};

/// Load `name` with the host loader, honouring the configured search paths and handle cache.
pub fn load_library(
    name: &str,
    version: Option<LibraryVersion>,
    config: &BindingConfig,
) -> Result<Arc<LibraryHandle>> {
    load_library_with(loader_for_platform(), name, version, config)
}

/// Same as [`load_library`] with an explicit naming policy.
pub fn load_library_with(
    loader: &dyn NativeLibraryLoader,
    name: &str,
    version: Option<LibraryVersion>,
    config: &BindingConfig,
) -> Result<Arc<LibraryHandle>> {
    let load = || search(loader, name, version, &config.search_paths);
    if config.cache_handles {
        HandleCache::global().get_or_load(name, version, &config.search_paths, load)
    } else {
        load().map(Arc::new)
    }
}

fn search(
    loader: &dyn NativeLibraryLoader,
    name: &str,
    version: Option<LibraryVersion>,
    search_paths: &[PathBuf],
) -> Result<LibraryHandle> {
    let mut tried = Vec::new();

    for dir in search_paths {
        match loader.load_native_library_in(dir, name, version) {
            Ok(handle) => return Ok(handle),
            Err(BindingError::LibraryNotFound { candidates, .. }) => tried.extend(candidates),
            Err(err) => return Err(err),
        }
    }

    match loader.load_native_library(name, version) {
        Ok(handle) => Ok(handle),
        Err(BindingError::LibraryNotFound { candidates, .. }) => {
            tried.extend(candidates);
            Err(platform::not_found(name, version, tried))
        }
        Err(err) => Err(err),
    }
}
