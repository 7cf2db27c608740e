//! Runtime synthesis of native library bindings.
//!
//! A [`LibraryContract`] describes one native library: its logical name, an optional version
//! and the exported functions and globals to bind. [`create_binding`] and
//! [`create_safe_binding`] locate the platform-specific file, load it, resolve every member and
//! return a typed wrapper over the resulting [`Binding`].
//!
//! ```no_run
//! use shimforge::{
//!     Binding, Contract, FunctionMember, ImportSpec, LibraryContract, LibraryVersion,
//!     NativeType, Param, Value,
//! };
//!
//! struct Libc(Binding);
//!
//! impl Contract for Libc {
//!     fn contract() -> LibraryContract {
//!         LibraryContract::new("Libc", "c")
//!             .version(LibraryVersion::new(6, 0, 0))
//!             .function(
//!                 FunctionMember::new("abs")
//!                     .import(ImportSpec::new())
//!                     .param(Param::new("n", NativeType::I32))
//!                     .returns(NativeType::I32),
//!             )
//!     }
//!
//!     fn from_binding(binding: Binding) -> shimforge::Result<Self> {
//!         Ok(Self(binding))
//!     }
//! }
//!
//! let libc: Libc = shimforge::create_binding()?;
//! assert_eq!(libc.0.call("abs", &mut [Value::I32(-3)])?, Value::I32(3));
//! # Ok::<(), shimforge::BindingError>(())
//! ```

pub use shimforge_bind::{
    Binding, BindingFactory, BindingKind, CallAbi, Contract, DeclaredBindingFactory,
    DirectBindingFactory, ImportDescriptor, factory_for, last_native_error,
};
pub use shimforge_config::BindingConfig;
pub use shimforge_contract::{
    ArrayValue, CallingConvention, CharSet, CustomMarshaler, FunctionMember, GlobalMember,
    ImportSpec, LibraryContract, LibraryVersion, MarshalDirective, Member, NativeType, Opaque,
    Param, ParamDirection, StructLayout, UnmanagedKind, Value, VariantKind, VersionParseError,
};
pub use shimforge_loader::{
    ElfLoader, GlobalRef, LibraryHandle, MachOLoader, NativeLibraryLoader, PeLoader, Platform,
    loader_for_platform,
};
pub use shimforge_marshal::{NativeDescriptor, NativeTag, VariantTag, translate};
pub use shimforge_utils::{BindingError, Result, init_logging};

/// Bind `T` with the direct strategy and the default configuration.
pub fn create_binding<T: Contract>() -> Result<T> {
    DirectBindingFactory::new().bind()
}

/// Bind `T` with the declared strategy and the default configuration.
pub fn create_safe_binding<T: Contract>() -> Result<T> {
    DeclaredBindingFactory::new().bind()
}

/// Bind `T` with `kind`, reading search paths and caching from `config`.
pub fn create_binding_with<T: Contract>(kind: BindingKind, config: BindingConfig) -> Result<T> {
    match kind {
        BindingKind::Direct => DirectBindingFactory::new().with_config(config).bind(),
        BindingKind::Declared => DeclaredBindingFactory::new().with_config(config).bind(),
    }
}

/// Bind `T` from environment configuration, with logging initialised.
///
/// Convenience for applications; libraries should pass a [`BindingConfig`] explicitly.
pub fn create_binding_from_env<T: Contract>(kind: BindingKind) -> anyhow::Result<T> {
    init_logging();
    let config = BindingConfig::from_env();
    create_binding_with(kind, config)
        .map_err(|err| anyhow::anyhow!(err).context(format!("binding {kind} contract failed")))
}
