//! String encodings used at the native boundary.

use std::ffi::{CStr, c_char, c_void};

use shimforge_contract::CharSet;
use thiserror::Error;

use crate::buffer::AlignedBuf;

/// Byte prefix carrying the length of a BSTR.
const BSTR_PREFIX: usize = size_of::<u32>();

/// Single-byte code page used for ANSI strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePage {
    Utf8,
    /// ISO-8859-1: one byte per code point up to U+00FF
    Latin1,
}

impl CodePage {
    /// Windows uses a legacy single-byte page; everything else speaks UTF-8.
    pub const fn host() -> Self {
        if cfg!(windows) { Self::Latin1 } else { Self::Utf8 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnsiPolicy {
    pub code_page: CodePage,
    pub best_fit: bool,
    pub throw_on_unmappable: bool,
}

impl AnsiPolicy {
    pub const fn new(best_fit: bool, throw_on_unmappable: bool) -> Self {
        Self {
            code_page: CodePage::host(),
            best_fit,
            throw_on_unmappable,
        }
    }

    pub const fn with_code_page(mut self, code_page: CodePage) -> Self {
        self.code_page = code_page;
        self
    }
}

impl Default for AnsiPolicy {
    fn default() -> Self {
        Self::new(true, true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StringError {
    #[error("character {0:?} has no representation in the ANSI code page")]
    Unmappable(char),
    #[error("string contains an interior NUL")]
    InteriorNul,
}

/// Native layout of a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringKind {
    /// NUL-terminated ANSI
    Ansi,
    /// NUL-terminated UTF-16
    Wide,
    /// Length-prefixed ANSI
    AnsiBStr,
    /// Length-prefixed UTF-16
    WideBStr,
}

impl StringKind {
    /// The platform `TCHAR` string.
    pub const fn platform() -> Self {
        if cfg!(windows) { Self::Wide } else { Self::Ansi }
    }

    /// The platform length-prefixed string.
    pub const fn platform_bstr() -> Self {
        if cfg!(windows) {
            Self::WideBStr
        } else {
            Self::AnsiBStr
        }
    }

    /// Representation for strings without an explicit directive.
    pub const fn for_char_set(char_set: CharSet) -> Self {
        match char_set {
            CharSet::None | CharSet::Ansi => Self::Ansi,
            CharSet::Unicode => Self::Wide,
            CharSet::Auto => Self::platform(),
        }
    }

    pub const fn is_wide(self) -> bool {
        matches!(self, Self::Wide | Self::WideBStr)
    }

    const fn unit_size(self) -> usize {
        if self.is_wide() { 2 } else { 1 }
    }
}

/// Closest ASCII spelling of common typographic characters.
pub const fn best_fit(ch: char) -> Option<&'static str> {
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => Some("'"),
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => Some("\""),
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => Some("-"),
        '\u{2026}' => Some("..."),
        '\u{00A0}' | '\u{2002}' | '\u{2003}' | '\u{2009}' => Some(" "),
        _ => None,
    }
}

/// Encode `text` in the policy's code page, without a terminator.
pub fn encode_ansi(text: &str, policy: &AnsiPolicy) -> Result<Vec<u8>, StringError> {
    match policy.code_page {
        CodePage::Utf8 => Ok(text.as_bytes().to_vec()),
        CodePage::Latin1 => {
            let mut out = Vec::with_capacity(text.len());
            for ch in text.chars() {
                if let Ok(byte) = u8::try_from(u32::from(ch)) {
                    out.push(byte);
                } else if let Some(replacement) = best_fit(ch).filter(|_| policy.best_fit) {
                    out.extend_from_slice(replacement.as_bytes());
                } else if policy.throw_on_unmappable {
                    return Err(StringError::Unmappable(ch));
                } else {
                    out.push(b'?');
                }
            }
            Ok(out)
        }
    }
}

pub fn decode_ansi(bytes: &[u8], code_page: CodePage) -> String {
    match code_page {
        CodePage::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        CodePage::Latin1 => bytes.iter().copied().map(char::from).collect(),
    }
}

/// Encoded code units of `text` as raw native-endian bytes.
fn encode_units(kind: StringKind, text: &str, policy: &AnsiPolicy) -> Result<Vec<u8>, StringError> {
    if text.contains('\0') {
        return Err(StringError::InteriorNul);
    }
    if kind.is_wide() {
        Ok(text
            .encode_utf16()
            .flat_map(u16::to_ne_bytes)
            .collect())
    } else {
        encode_ansi(text, policy)
    }
}

fn decode_units(kind: StringKind, bytes: &[u8], code_page: CodePage) -> String {
    if kind.is_wide() {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        decode_ansi(bytes, code_page)
    }
}

/// Owned native copy of a string.
#[derive(Debug)]
pub struct NativeString {
    buf: AlignedBuf,
    offset: usize,
}

impl NativeString {
    pub fn new(kind: StringKind, text: &str, policy: &AnsiPolicy) -> Result<Self, StringError> {
        let units = encode_units(kind, text, policy)?;
        let terminator = kind.unit_size();

        match kind {
            StringKind::Ansi | StringKind::Wide => {
                let mut buf = AlignedBuf::zeroed(units.len() + terminator);
                buf.bytes_mut()[..units.len()].copy_from_slice(&units);
                Ok(Self { buf, offset: 0 })
            }
            StringKind::AnsiBStr | StringKind::WideBStr => {
                let byte_len = u32::try_from(units.len()).unwrap_or(u32::MAX);
                let mut buf = AlignedBuf::zeroed(BSTR_PREFIX + units.len() + terminator);
                let bytes = buf.bytes_mut();
                bytes[..BSTR_PREFIX].copy_from_slice(&byte_len.to_ne_bytes());
                bytes[BSTR_PREFIX..BSTR_PREFIX + units.len()].copy_from_slice(&units);
                Ok(Self {
                    buf,
                    offset: BSTR_PREFIX,
                })
            }
        }
    }

    /// An inline buffer of exactly `capacity` code units; longer text is truncated so the
    /// terminator always fits.
    pub fn fixed(
        kind: StringKind,
        text: &str,
        capacity: usize,
        policy: &AnsiPolicy,
    ) -> Result<Self, StringError> {
        let unit = kind.unit_size();
        let units = encode_units(kind, text, policy)?;
        let keep = units.len().min(capacity.saturating_sub(1) * unit);
        let mut buf = AlignedBuf::zeroed(capacity.max(1) * unit);
        buf.bytes_mut()[..keep].copy_from_slice(&units[..keep]);
        Ok(Self { buf, offset: 0 })
    }

    /// What crosses the boundary: the first character, past any length prefix.
    pub fn as_mut_ptr(&mut self) -> *mut c_void {
        // SAFETY: `offset` is within the buffer.
        unsafe { self.buf.as_mut_ptr().add(self.offset).cast() }
    }

    /// Text currently held in the buffer, up to the first terminator.
    pub fn read(&self, kind: StringKind, code_page: CodePage) -> String {
        let bytes = &self.buf.bytes()[self.offset..];
        let unit = kind.unit_size();
        let end = bytes
            .chunks_exact(unit)
            .position(|chunk| chunk.iter().all(|&byte| byte == 0))
            .map_or(bytes.len() - bytes.len() % unit, |idx| idx * unit);
        decode_units(kind, &bytes[..end], code_page)
    }
}

/// Read a string owned by native code. Null reads as `None`.
///
/// # Safety
///
/// A non-null `ptr` must point to a valid string of layout `kind`.
pub unsafe fn read_native(
    kind: StringKind,
    ptr: *const c_void,
    code_page: CodePage,
) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    let text = match kind {
        StringKind::Ansi => {
            // SAFETY: forwarded from the caller.
            let bytes = unsafe { CStr::from_ptr(ptr.cast::<c_char>()) }.to_bytes();
            decode_ansi(bytes, code_page)
        }
        StringKind::Wide => {
            let start = ptr.cast::<u16>();
            let mut len = 0;
            // SAFETY: the string is NUL-terminated.
            while unsafe { start.add(len).read_unaligned() } != 0 {
                len += 1;
            }
            // SAFETY: `len` units were just read.
            let units: Vec<u16> = (0..len)
                .map(|idx| unsafe { start.add(idx).read_unaligned() })
                .collect();
            String::from_utf16_lossy(&units)
        }
        StringKind::AnsiBStr | StringKind::WideBStr => {
            // SAFETY: BSTRs carry their byte length just before the first character.
            let byte_len = unsafe {
                ptr.cast::<u8>()
                    .sub(BSTR_PREFIX)
                    .cast::<u32>()
                    .read_unaligned()
            };
            // SAFETY: the prefix covers `byte_len` readable bytes.
            let bytes = unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), byte_len as usize) };
            decode_units(kind, bytes, code_page)
        }
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LATIN1: AnsiPolicy = AnsiPolicy::new(true, true).with_code_page(CodePage::Latin1);

    #[test]
    fn test_utf8_page_passes_everything() {
        let policy = AnsiPolicy::default().with_code_page(CodePage::Utf8);
        assert_eq!(encode_ansi("héllo “x”", &policy).unwrap(), "héllo “x”".as_bytes());
    }

    #[test]
    fn test_latin1_best_fit() {
        assert_eq!(
            encode_ansi("“quoted” – café…", &LATIN1).unwrap(),
            b"\"quoted\" - caf\xe9...".to_vec()
        );
    }

    #[test]
    fn test_latin1_unmappable() {
        assert_eq!(
            encode_ansi("snow ☃", &LATIN1).unwrap_err(),
            StringError::Unmappable('☃')
        );

        let lenient = AnsiPolicy::new(false, false).with_code_page(CodePage::Latin1);
        assert_eq!(encode_ansi("a☃’", &lenient).unwrap(), b"a??".to_vec());

        let strict_no_fit = AnsiPolicy::new(false, true).with_code_page(CodePage::Latin1);
        assert_eq!(
            encode_ansi("’", &strict_no_fit).unwrap_err(),
            StringError::Unmappable('’')
        );
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode_ansi(b"caf\xe9", CodePage::Latin1), "café");
    }

    #[test]
    fn test_char_set_defaults() {
        assert_eq!(StringKind::for_char_set(CharSet::None), StringKind::Ansi);
        assert_eq!(StringKind::for_char_set(CharSet::Ansi), StringKind::Ansi);
        assert_eq!(StringKind::for_char_set(CharSet::Unicode), StringKind::Wide);
        assert_eq!(StringKind::for_char_set(CharSet::Auto), StringKind::platform());
    }

    #[test]
    fn test_ansi_native_string() {
        let mut native =
            NativeString::new(StringKind::Ansi, "hello", &AnsiPolicy::default()).unwrap();
        let text = unsafe { read_native(StringKind::Ansi, native.as_mut_ptr(), CodePage::host()) };
        assert_eq!(text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_wide_native_string() {
        let mut native =
            NativeString::new(StringKind::Wide, "häj", &AnsiPolicy::default()).unwrap();
        let ptr = native.as_mut_ptr();
        let units = unsafe { std::slice::from_raw_parts(ptr.cast::<u16>(), 4) };
        assert_eq!(units, &[u16::from(b'h'), 0xe4, u16::from(b'j'), 0]);
        let text = unsafe { read_native(StringKind::Wide, ptr, CodePage::host()) };
        assert_eq!(text.as_deref(), Some("häj"));
    }

    #[test]
    fn test_bstr_prefix() {
        let mut native =
            NativeString::new(StringKind::WideBStr, "abc", &AnsiPolicy::default()).unwrap();
        let ptr = native.as_mut_ptr();
        let prefix = unsafe { ptr.cast::<u8>().sub(4).cast::<u32>().read_unaligned() };
        assert_eq!(prefix, 6);
        let text = unsafe { read_native(StringKind::WideBStr, ptr, CodePage::host()) };
        assert_eq!(text.as_deref(), Some("abc"));

        let mut ansi =
            NativeString::new(StringKind::AnsiBStr, "abcd", &AnsiPolicy::default()).unwrap();
        let prefix = unsafe {
            ansi.as_mut_ptr()
                .cast::<u8>()
                .sub(4)
                .cast::<u32>()
                .read_unaligned()
        };
        assert_eq!(prefix, 4);
    }

    #[test]
    fn test_fixed_truncates() {
        let native =
            NativeString::fixed(StringKind::Ansi, "overflowing", 5, &AnsiPolicy::default())
                .unwrap();
        assert_eq!(native.read(StringKind::Ansi, CodePage::host()), "over");

        let wide = NativeString::fixed(StringKind::Wide, "ab", 8, &AnsiPolicy::default()).unwrap();
        assert_eq!(wide.read(StringKind::Wide, CodePage::host()), "ab");
    }

    #[test]
    fn test_interior_nul_rejected() {
        assert_eq!(
            NativeString::new(StringKind::Ansi, "a\0b", &AnsiPolicy::default()).unwrap_err(),
            StringError::InteriorNul
        );
    }

    #[test]
    fn test_null_reads_none() {
        let text = unsafe { read_native(StringKind::Wide, std::ptr::null(), CodePage::host()) };
        assert!(text.is_none());
    }
}
