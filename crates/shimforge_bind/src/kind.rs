use std::fmt;

use crate::BindingFactory;
use crate::declared::DeclaredBindingFactory;
use crate::direct::DirectBindingFactory;
use shimforge_config::BindingConfig;

/// Strategy a binding was synthesized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Baked symbol addresses, native-layout values only.
    Direct,
    /// Lazily resolved imports with full marshaling.
    Declared,
}

impl BindingKind {
    /// A factory for this strategy using `config`.
    pub fn factory(self, config: BindingConfig) -> Box<dyn BindingFactory> {
        match self {
            Self::Direct => Box::new(DirectBindingFactory::new().with_config(config)),
            Self::Declared => Box::new(DeclaredBindingFactory::new().with_config(config)),
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Declared => write!(f, "declared"),
        }
    }
}
