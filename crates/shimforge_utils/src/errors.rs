use thiserror::Error;

/// Every failure a binding can produce, either while it is synthesized or while one of its
/// members is invoked.
///
/// Synthesis failures (`ContractDefinition`, `LibraryNotFound`, `EntryPointNotFound`,
/// `UnsupportedMarshalKind`, `PlatformNotSupported`) are never retried; a contract either binds
/// completely or not at all.
#[derive(Debug, Error)]
pub enum BindingError {
    /// The contract itself is malformed.
    #[error("invalid contract `{contract}`: {reason}")]
    ContractDefinition { contract: String, reason: String },

    /// No candidate file for the requested library could be opened.
    #[error(
        "could not find library \"{name}\"{} (tried {})",
        version_suffix(.version.as_deref()),
        .candidates.join(", ")
    )]
    LibraryNotFound {
        name: String,
        version: Option<String>,
        candidates: Vec<String>,
    },

    /// The library loaded but does not export the symbol.
    #[error("could not find symbol \"{symbol}\" in {library}")]
    EntryPointNotFound { symbol: String, library: String },

    /// A marshaling directive has no native representation.
    #[error("marshal kind `{kind}` is not supported")]
    UnsupportedMarshalKind { kind: String },

    /// The requested strategy cannot run on this architecture.
    #[error("direct bindings are not supported on `{arch}`; use a declared binding instead")]
    PlatformNotSupported { arch: String },

    /// A member was invoked with arguments that do not match its declaration.
    #[error("invalid call to `{member}`: {reason}")]
    InvalidCall { member: String, reason: String },

    /// A value could not be converted at call time (unmappable characters, interior NULs, ...).
    #[error("failed to marshal `{member}`: {reason}")]
    Marshal { member: String, reason: String },
}

impl BindingError {
    pub fn contract(contract: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContractDefinition {
            contract: contract.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_call(member: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCall {
            member: member.into(),
            reason: reason.into(),
        }
    }

    pub fn marshal(member: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Marshal {
            member: member.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(kind: impl ToString) -> Self {
        Self::UnsupportedMarshalKind {
            kind: kind.to_string(),
        }
    }

    /// True for errors raised while building a binding rather than while calling it.
    pub const fn is_synthesis_error(&self) -> bool {
        !matches!(self, Self::InvalidCall { .. } | Self::Marshal { .. })
    }
}

pub type Result<T> = std::result::Result<T, BindingError>;

fn version_suffix(version: Option<&str>) -> String {
    version.map(|v| format!(" version {v}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_not_found_lists_candidates() {
        let err = BindingError::LibraryNotFound {
            name: "dl".into(),
            version: Some("2.0.0".into()),
            candidates: vec!["libdl.so.2.0.0".into(), "libdl.so.2".into()],
        };
        assert_eq!(
            err.to_string(),
            "could not find library \"dl\" version 2.0.0 (tried libdl.so.2.0.0, libdl.so.2)"
        );
    }

    #[test]
    fn test_unversioned_library_message() {
        let err = BindingError::LibraryNotFound {
            name: "kernel32".into(),
            version: None,
            candidates: vec!["kernel32.dll".into()],
        };
        assert_eq!(
            err.to_string(),
            "could not find library \"kernel32\" (tried kernel32.dll)"
        );
    }

    #[test]
    fn test_synthesis_classification() {
        assert!(BindingError::contract("C", "bad").is_synthesis_error());
        assert!(BindingError::unsupported("IUnknown").is_synthesis_error());
        assert!(!BindingError::invalid_call("f", "arity").is_synthesis_error());
        assert!(!BindingError::marshal("f", "nul").is_synthesis_error());
    }
}
