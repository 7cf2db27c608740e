use std::fmt;
use std::slice;

/// Zeroed scratch memory aligned for any scalar argument.
///
/// The backing allocation never moves, so pointers handed to native code stay valid while the
/// buffer is alive, wherever the buffer itself is moved to.
pub struct AlignedBuf {
    words: Vec<u64>,
    len: usize,
}

impl AlignedBuf {
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(8).max(1)],
            len,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = Self::zeroed(bytes.len());
        buf.bytes_mut().copy_from_slice(bytes);
        buf
    }

    /// One pointer-sized slot holding `ptr`.
    pub fn pointer(ptr: *mut std::ffi::c_void) -> Self {
        Self::from_bytes(&(ptr as usize).to_ne_bytes())
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast()
    }

    pub fn bytes(&self) -> &[u8] {
        // SAFETY: `words` holds at least `len` initialised bytes.
        unsafe { slice::from_raw_parts(self.words.as_ptr().cast(), self.len) }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and the borrow is unique.
        unsafe { slice::from_raw_parts_mut(self.words.as_mut_ptr().cast(), self.len) }
    }

    /// Pointer stored in the first slot.
    pub fn read_pointer(&self) -> *mut std::ffi::c_void {
        let mut raw = [0u8; size_of::<usize>()];
        raw.copy_from_slice(&self.bytes()[..size_of::<usize>()]);
        usize::from_ne_bytes(raw) as *mut std::ffi::c_void
    }
}

impl fmt::Debug for AlignedBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuf").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_and_len() {
        let mut buf = AlignedBuf::zeroed(3);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.as_mut_ptr() as usize % 8, 0);
        assert_eq!(buf.bytes(), &[0, 0, 0]);
        assert!(AlignedBuf::zeroed(0).is_empty());
    }

    #[test]
    fn test_pointer_slot() {
        let mut target = 5u32;
        let ptr = (&raw mut target).cast();
        assert_eq!(AlignedBuf::pointer(ptr).read_pointer(), ptr);
    }
}
