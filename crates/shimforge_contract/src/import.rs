use std::fmt;

use serde::{Deserialize, Serialize};

/// Argument-passing protocol a native function expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CallingConvention {
    /// `cdecl`: caller cleans the stack.
    #[default]
    C,
    StdCall,
    FastCall,
    ThisCall,
    /// The platform's default convention (`stdcall` on 32-bit Windows, `C` elsewhere).
    Winapi,
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::C => "cdecl",
            Self::StdCall => "stdcall",
            Self::FastCall => "fastcall",
            Self::ThisCall => "thiscall",
            Self::Winapi => "winapi",
        };
        f.write_str(name)
    }
}

/// How strings without an explicit marshal directive cross the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CharSet {
    /// Not specified; treated like `Ansi`.
    None,
    #[default]
    Ansi,
    /// UTF-16.
    Unicode,
    /// UTF-16 on Windows, ANSI elsewhere.
    Auto,
}

/// Binding directives attached to every contract member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSpec {
    /// Exported symbol name; the member name is used when absent
    pub entry_point: Option<String>,
    pub calling_convention: CallingConvention,
    pub char_set: CharSet,
    /// Capture the OS error code after each call
    pub set_last_error: bool,
    /// Approximate characters the ANSI code page cannot represent
    pub best_fit_mapping: bool,
    /// Fail the call when a character cannot be represented
    pub throw_on_unmappable_char: bool,
}

impl Default for ImportSpec {
    fn default() -> Self {
        Self {
            entry_point: None,
            calling_convention: CallingConvention::C,
            char_set: CharSet::Ansi,
            set_last_error: false,
            best_fit_mapping: true,
            throw_on_unmappable_char: true,
        }
    }
}

impl ImportSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_point(mut self, symbol: impl Into<String>) -> Self {
        self.entry_point = Some(symbol.into());
        self
    }

    pub fn calling_convention(mut self, convention: CallingConvention) -> Self {
        self.calling_convention = convention;
        self
    }

    pub fn char_set(mut self, char_set: CharSet) -> Self {
        self.char_set = char_set;
        self
    }

    pub fn set_last_error(mut self, enabled: bool) -> Self {
        self.set_last_error = enabled;
        self
    }

    pub fn best_fit_mapping(mut self, enabled: bool) -> Self {
        self.best_fit_mapping = enabled;
        self
    }

    pub fn throw_on_unmappable_char(mut self, enabled: bool) -> Self {
        self.throw_on_unmappable_char = enabled;
        self
    }

    /// Symbol this spec binds to when attached to a member called `member_name`.
    pub fn resolve_entry_point<'a>(&'a self, member_name: &'a str) -> &'a str {
        self.entry_point.as_deref().unwrap_or(member_name)
    }
}
