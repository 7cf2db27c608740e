use std::path::Path;

use libloading::Library;

/// `dlopen` with every relocation resolved up front.
#[cfg(unix)]
pub fn open(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_NOW};

    // SAFETY: loading runs the library's initialisers; callers opt into that by binding it.
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW) }.map(Library::from)
}

#[cfg(windows)]
pub fn open(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::windows::Library as WindowsLibrary;

    // SAFETY: see the unix variant.
    unsafe { WindowsLibrary::new(path) }.map(Library::from)
}
