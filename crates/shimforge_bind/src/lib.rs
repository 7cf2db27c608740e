//! Binding synthesis.
//!
//! A [`BindingFactory`] turns a [`LibraryContract`] into a [`Binding`]: the library is located
//! and loaded, every member is checked and resolved, and a dispatch table of call sites is
//! assembled. Synthesis either succeeds for the whole contract or fails with the first error.

pub mod binding;
mod callsite;
pub mod declared;
pub mod direct;
pub mod kind;
pub mod last_error;

use shimforge_config::BindingConfig;
use shimforge_contract::LibraryContract;
use shimforge_utils::Result;
use tracing::{info, warn};

pub use binding::Binding;
pub use callsite::CallAbi;
pub use declared::{DeclaredBindingFactory, ImportDescriptor};
pub use direct::DirectBindingFactory;
pub use kind::BindingKind;
pub use last_error::last_native_error;

/// A typed view over a synthesized binding.
///
/// Implemented next to the caller's API: `contract()` describes the library and
/// `from_binding()` wraps the result.
pub trait Contract: Sized {
    fn contract() -> LibraryContract;

    fn from_binding(binding: Binding) -> Result<Self>;
}

/// A binding strategy.
pub trait BindingFactory: Send + Sync {
    fn kind(&self) -> BindingKind;

    /// Synthesize a binding for `contract`. No partial binding is ever returned.
    fn create_binding(&self, contract: &LibraryContract) -> Result<Binding>;

    /// Synthesize and wrap a typed contract.
    fn bind<T: Contract>(&self) -> Result<T>
    where
        Self: Sized,
    {
        T::from_binding(self.create_binding(&T::contract())?)
    }
}

/// Factory for `kind` with the default configuration.
pub fn factory_for(kind: BindingKind) -> Box<dyn BindingFactory> {
    kind.factory(BindingConfig::default())
}

fn synthesize(
    contract: &LibraryContract,
    kind: BindingKind,
    build: impl FnOnce() -> Result<Binding>,
) -> Result<Binding> {
    match build() {
        Ok(binding) => {
            info!(
                contract = contract.name(),
                kind = %kind,
                library = %binding.library().path().display(),
                members = contract.members().len(),
                "synthesized binding"
            );
            Ok(binding)
        }
        Err(err) => {
            warn!(contract = contract.name(), kind = %kind, error = %err, "rejected contract");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_for() {
        assert_eq!(factory_for(BindingKind::Direct).kind(), BindingKind::Direct);
        assert_eq!(factory_for(BindingKind::Declared).kind(), BindingKind::Declared);
    }

    #[test]
    fn test_factories_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DirectBindingFactory>();
        assert_send_sync::<DeclaredBindingFactory>();
        assert_send_sync::<Binding>();
    }
}
