use std::any::type_name;
use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{ManuallyDrop, size_of, transmute_copy};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use libloading::Library;
use shimforge_utils::{BindingError, Result};

/// A loaded native library.
///
/// The library is never unloaded: symbol addresses handed out by a handle stay valid for the
/// life of the process, even after the handle itself is dropped.
pub struct LibraryHandle {
    library: ManuallyDrop<Library>,
    path: PathBuf,
}

impl LibraryHandle {
    pub(crate) fn new(library: Library, path: PathBuf) -> Self {
        Self {
            library: ManuallyDrop::new(library),
            path,
        }
    }

    /// The candidate that was opened.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Address of an exported symbol; `None` when the library does not export it.
    pub fn symbol_address(&self, name: &str) -> Option<NonNull<c_void>> {
        // SAFETY: the symbol is read as an untyped address and never dereferenced here.
        let symbol = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        NonNull::new(*symbol)
    }

    /// Reinterpret the address of `name` as the function pointer type `F`.
    ///
    /// With `throw_on_error` unset, a missing symbol or an `F` that is not pointer-sized yields
    /// `Ok(None)` instead of an error.
    ///
    /// # Safety
    ///
    /// `F` must be an `extern` function pointer whose signature and calling convention match
    /// the native export.
    pub unsafe fn get_delegate_for_symbol<F: Copy>(
        &self,
        name: &str,
        throw_on_error: bool,
    ) -> Result<Option<F>> {
        if size_of::<F>() != size_of::<*mut c_void>() {
            return if throw_on_error {
                Err(BindingError::unsupported(format!(
                    "delegate type `{}`",
                    type_name::<F>()
                )))
            } else {
                Ok(None)
            };
        }

        match self.symbol_address(name) {
            // SAFETY: sizes match and the caller vouches for the signature.
            Some(address) => Ok(Some(unsafe { transmute_copy(&address.as_ptr()) })),
            None if throw_on_error => Err(self.missing(name)),
            None => Ok(None),
        }
    }

    /// Typed reference to an exported global.
    ///
    /// # Safety
    ///
    /// The export must be a variable laid out as `T`, and every bit pattern the library may
    /// store there must be a valid `T`.
    pub unsafe fn get_symbol_reference<T: Copy>(&self, name: &str) -> Result<GlobalRef<'_, T>> {
        let address = self.symbol_address(name).ok_or_else(|| self.missing(name))?;
        // SAFETY: forwarded from the caller.
        Ok(unsafe { GlobalRef::from_raw(address.cast()) })
    }

    pub fn missing(&self, symbol: &str) -> BindingError {
        BindingError::EntryPointNotFound {
            symbol: symbol.to_string(),
            library: self.path.display().to_string(),
        }
    }
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Reference to a global variable inside a loaded library.
///
/// Reads and writes are volatile: the library may change the value behind our back.
pub struct GlobalRef<'a, T> {
    ptr: NonNull<T>,
    _library: PhantomData<&'a LibraryHandle>,
}

impl<T: Copy> GlobalRef<'_, T> {
    /// # Safety
    ///
    /// `ptr` must point to a live, aligned `T` for the lifetime of the reference.
    pub const unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        Self {
            ptr,
            _library: PhantomData,
        }
    }

    pub fn read(&self) -> T {
        // SAFETY: guaranteed at construction.
        unsafe { ptr::read_volatile(self.ptr.as_ptr()) }
    }

    pub fn write(&self, value: T) {
        // SAFETY: guaranteed at construction.
        unsafe { ptr::write_volatile(self.ptr.as_ptr(), value) }
    }

    pub const fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T> Clone for GlobalRef<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for GlobalRef<'_, T> {}

impl<T> fmt::Debug for GlobalRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GlobalRef").field(&self.ptr).finish()
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::platform::{ElfLoader, NativeLibraryLoader};
    use shimforge_contract::LibraryVersion;

    fn libc() -> LibraryHandle {
        ElfLoader
            .load_native_library("c", Some(LibraryVersion::new(6, 0, 0)))
            .unwrap()
    }

    #[test]
    fn test_symbol_address() {
        let handle = libc();
        assert!(handle.symbol_address("strlen").is_some());
        assert!(handle.symbol_address("shimforge_no_such_symbol").is_none());
        assert!(handle.path().to_string_lossy().starts_with("libc.so.6"));
    }

    #[test]
    fn test_delegate_for_symbol() {
        let handle = libc();
        type Abs = unsafe extern "C" fn(i32) -> i32;

        let abs = unsafe { handle.get_delegate_for_symbol::<Abs>("abs", true) }
            .unwrap()
            .unwrap();
        assert_eq!(unsafe { abs(-42) }, 42);

        let missing = unsafe { handle.get_delegate_for_symbol::<Abs>("shimforge_nope", false) };
        assert!(missing.unwrap().is_none());

        let err = unsafe { handle.get_delegate_for_symbol::<Abs>("shimforge_nope", true) };
        assert!(matches!(err, Err(BindingError::EntryPointNotFound { .. })));
    }

    #[test]
    fn test_delegate_must_be_pointer_sized() {
        let handle = libc();
        let wide = unsafe { handle.get_delegate_for_symbol::<[usize; 2]>("abs", false) };
        assert!(wide.unwrap().is_none());
        let err = unsafe { handle.get_delegate_for_symbol::<[usize; 2]>("abs", true) };
        assert!(matches!(err, Err(BindingError::UnsupportedMarshalKind { .. })));
    }

    #[test]
    fn test_symbol_reference() {
        let handle = libc();
        let environ = unsafe { handle.get_symbol_reference::<*mut *mut i8>("environ") }.unwrap();
        assert!(!environ.read().is_null());

        let err = unsafe { handle.get_symbol_reference::<i32>("shimforge_nope") }.unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not find symbol \"shimforge_nope\" in libc.so.6"
        );
    }
}
