use std::mem::size_of;

use shimforge_contract::LibraryVersion;

use super::{NativeLibraryLoader, Platform};

/// DLL names with and without a `lib` prefix, major version and architecture suffix.
#[derive(Debug, Clone, Copy)]
pub struct PeLoader {
    pointer_width: usize,
}

impl PeLoader {
    /// Uses the pointer width of the running process.
    pub const fn host() -> Self {
        Self::with_pointer_width(size_of::<*const ()>())
    }

    /// Names DLLs as a process with `bytes`-wide pointers would.
    pub const fn with_pointer_width(bytes: usize) -> Self {
        Self {
            pointer_width: bytes,
        }
    }

    pub const fn arch(&self) -> &'static str {
        if self.pointer_width == 4 { "x86" } else { "x64" }
    }
}

impl Default for PeLoader {
    fn default() -> Self {
        Self::host()
    }
}

impl NativeLibraryLoader for PeLoader {
    fn platform(&self) -> Platform {
        Platform::Pe
    }

    fn candidate_names(&self, name: &str, version: Option<LibraryVersion>) -> Vec<String> {
        let arch = self.arch();
        let mut names = Vec::with_capacity(8);

        if let Some(version) = version {
            let major = version.major;
            names.extend([
                format!("{name}-{major}.dll"),
                format!("lib{name}-{major}.dll"),
                format!("{name}-{major}_{arch}.dll"),
                format!("lib{name}-{major}_{arch}.dll"),
            ]);
        }

        names.extend([
            format!("{name}.dll"),
            format!("lib{name}.dll"),
            format!("{name}_{arch}.dll"),
            format!("lib{name}_{arch}.dll"),
        ]);
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unversioned_x64() {
        assert_eq!(
            PeLoader::with_pointer_width(8).candidate_names("kernel32", None),
            vec![
                "kernel32.dll",
                "libkernel32.dll",
                "kernel32_x64.dll",
                "libkernel32_x64.dll",
            ]
        );
    }

    #[test]
    fn test_versioned_x86() {
        assert_eq!(
            PeLoader::with_pointer_width(4)
                .candidate_names("ebur128", Some(LibraryVersion::new(1, 2, 4))),
            vec![
                "ebur128-1.dll",
                "libebur128-1.dll",
                "ebur128-1_x86.dll",
                "libebur128-1_x86.dll",
                "ebur128.dll",
                "libebur128.dll",
                "ebur128_x86.dll",
                "libebur128_x86.dll",
            ]
        );
    }
}
