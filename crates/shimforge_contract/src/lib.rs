//! Declarative description of a native library binding.
//!
//! A [`LibraryContract`] names one native library and lists the members that bind to its
//! exported symbols. Contracts are plain data: the synthesizer in `shimforge_bind` reads them,
//! the contract crate itself never touches a native library.

pub mod contract;
pub mod import;
pub mod marshal;
pub mod types;
pub mod value;
pub mod version;

pub use contract::{FunctionMember, GlobalMember, LibraryContract, Member, Param};
pub use import::{CallingConvention, CharSet, ImportSpec};
pub use marshal::{CustomMarshaler, MarshalDirective, UnmanagedKind, VariantKind};
pub use types::{NativeType, ParamDirection, StructLayout};
pub use value::{ArrayValue, Opaque, Value};
pub use version::{LibraryVersion, VersionParseError};
