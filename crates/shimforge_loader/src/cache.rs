use std::path::PathBuf;
use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use shimforge_contract::LibraryVersion;
use shimforge_utils::Result;
use tracing::debug;

use crate::handle::LibraryHandle;

/// Library name, version and the search directories tried before the system paths.
type CacheKey = (String, Option<LibraryVersion>, Vec<PathBuf>);

/// Shares one handle per `(library, version, search paths)` between bindings.
#[derive(Default)]
pub struct HandleCache {
    handles: Mutex<AHashMap<CacheKey, Arc<LibraryHandle>>>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static Self {
        static GLOBAL: Lazy<HandleCache> = Lazy::new(HandleCache::new);
        &GLOBAL
    }

    /// Return the cached handle or run `load` and remember its result.
    ///
    /// Failed loads are not cached, so a library installed later is picked up on retry.
    pub fn get_or_load(
        &self,
        name: &str,
        version: Option<LibraryVersion>,
        search_paths: &[PathBuf],
        load: impl FnOnce() -> Result<LibraryHandle>,
    ) -> Result<Arc<LibraryHandle>> {
        let key = (name.to_string(), version, search_paths.to_vec());
        if let Some(existing) = self.handles.lock().get(&key).cloned() {
            debug!(library = name, "reusing cached library handle");
            return Ok(existing);
        }

        let handle = Arc::new(load()?);
        // Two racing loaders both succeed; the first one stored wins.
        let mut handles = self.handles.lock();
        Ok(Arc::clone(handles.entry(key).or_insert(handle)))
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::platform::{ElfLoader, NativeLibraryLoader};
    use shimforge_utils::BindingError;

    fn load_libc(version: Option<LibraryVersion>) -> Result<LibraryHandle> {
        ElfLoader.load_native_library("c", version)
    }

    #[test]
    fn test_second_load_is_shared() {
        let cache = HandleCache::new();
        let version = Some(LibraryVersion::new(6, 0, 0));

        let first = cache
            .get_or_load("c", version, &[], || load_libc(version))
            .unwrap();
        let second = cache
            .get_or_load("c", version, &[], || panic!("must hit the cache"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_search_paths_are_part_of_the_key() {
        let cache = HandleCache::new();
        let version = Some(LibraryVersion::new(6, 0, 0));
        let dir = tempfile::tempdir().unwrap();
        let custom = [dir.path().to_path_buf()];

        let system = cache
            .get_or_load("c", version, &[], || load_libc(version))
            .unwrap();
        let searched = cache
            .get_or_load("c", version, &custom, || load_libc(version))
            .unwrap();
        assert!(!Arc::ptr_eq(&system, &searched));
        assert_eq!(cache.len(), 2);

        let again = cache
            .get_or_load("c", version, &custom, || panic!("must hit the cache"))
            .unwrap();
        assert!(Arc::ptr_eq(&searched, &again));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = HandleCache::new();
        let err = cache
            .get_or_load("shimforge_missing", None, &[], || {
                ElfLoader.load_native_library("shimforge_missing", None)
            })
            .unwrap_err();
        assert!(matches!(err, BindingError::LibraryNotFound { .. }));
        assert!(cache.is_empty());
    }
}
