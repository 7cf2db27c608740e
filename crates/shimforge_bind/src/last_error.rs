//! OS error capture for imports that set `set_last_error`.

use std::cell::Cell;

thread_local! {
    static LAST_ERROR: Cell<i32> = const { Cell::new(0) };
}

/// OS error code recorded by the most recent `set_last_error` call on this thread.
///
/// This is `errno` on Unix and `GetLastError()` on Windows; zero when nothing has been captured.
pub fn last_native_error() -> i32 {
    LAST_ERROR.with(Cell::get)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) fn clear() {
    // SAFETY: the errno location is thread-local and always writable.
    unsafe { *libc::__errno_location() = 0 };
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
pub(crate) fn clear() {
    // SAFETY: the errno location is thread-local and always writable.
    unsafe { *libc::__error() = 0 };
}

#[cfg(windows)]
pub(crate) fn clear() {
    unsafe extern "system" {
        fn SetLastError(code: u32);
    }
    // SAFETY: SetLastError only writes the calling thread's error slot.
    unsafe { SetLastError(0) };
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    windows
)))]
pub(crate) fn clear() {}

pub(crate) fn capture() {
    let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
    LAST_ERROR.with(|slot| slot.set(code));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn test_capture_errno() {
        clear();
        // SAFETY: closing an invalid descriptor only sets errno.
        let rc = unsafe { libc::close(-1) };
        assert_eq!(rc, -1);
        capture();
        assert_eq!(last_native_error(), libc::EBADF);

        clear();
        capture();
        assert_eq!(last_native_error(), 0);
    }

    #[test]
    fn test_per_thread() {
        LAST_ERROR.with(|slot| slot.set(42));
        let other = std::thread::spawn(last_native_error).join().unwrap();
        assert_eq!(other, 0);
        assert_eq!(last_native_error(), 42);
    }
}
