//! Marshaling directives attached to parameters and return values.

use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Requested native representation of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnmanagedKind {
    /// Length-prefixed single-byte string.
    AnsiBStr,
    /// Pointer to whatever buffer backs the value.
    AsAny,
    /// 4-byte Win32 `BOOL`.
    Bool,
    /// Length-prefixed UTF-16 string.
    BStr,
    /// Fixed-size inline array.
    FixedArray,
    /// Fixed-size inline string.
    FixedString,
    /// 8-byte fixed-point value scaled by 10 000.
    Currency,
    CustomMarshaler,
    /// 32-bit `HRESULT`.
    Error,
    FunctionPtr,
    HString,
    I1,
    I2,
    I4,
    I8,
    IDispatch,
    IInspectable,
    Interface,
    IUnknown,
    /// Pointer to a caller-managed array.
    Array,
    LpStr,
    LpStruct,
    LpTStr,
    LpWStr,
    R4,
    R8,
    /// Self-describing array of tagged variant elements.
    SafeArray,
    Struct,
    SysInt,
    SysUInt,
    TBStr,
    U1,
    U2,
    U4,
    U8,
    /// 2-byte `VARIANT_BOOL` (`-1` / `0`).
    VariantBool,
    VbByRefStr,
}

impl fmt::Display for UnmanagedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Element type of a tagged variant array, mirroring the `VARTYPE` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantKind {
    Empty,
    Null,
    I2,
    I4,
    R4,
    R8,
    Cy,
    Date,
    BStr,
    Dispatch,
    Error,
    Bool,
    Variant,
    Unknown,
    Decimal,
    I1,
    UI1,
    UI2,
    UI4,
    I8,
    UI8,
    Int,
    UInt,
    Void,
    HResult,
    Ptr,
    SafeArray,
    CArray,
    UserDefined,
    LpStr,
    LpWStr,
    Record,
    FileTime,
    Blob,
    Stream,
    Storage,
    StreamedObject,
    StoredObject,
    BlobObject,
    Cf,
    Clsid,
    Vector,
    Array,
    ByRef,
}

impl VariantKind {
    /// The `VARTYPE` code of this kind.
    pub const fn vartype(self) -> u16 {
        match self {
            Self::Empty => 0,
            Self::Null => 1,
            Self::I2 => 2,
            Self::I4 => 3,
            Self::R4 => 4,
            Self::R8 => 5,
            Self::Cy => 6,
            Self::Date => 7,
            Self::BStr => 8,
            Self::Dispatch => 9,
            Self::Error => 10,
            Self::Bool => 11,
            Self::Variant => 12,
            Self::Unknown => 13,
            Self::Decimal => 14,
            Self::I1 => 16,
            Self::UI1 => 17,
            Self::UI2 => 18,
            Self::UI4 => 19,
            Self::I8 => 20,
            Self::UI8 => 21,
            Self::Int => 22,
            Self::UInt => 23,
            Self::Void => 24,
            Self::HResult => 25,
            Self::Ptr => 26,
            Self::SafeArray => 27,
            Self::CArray => 28,
            Self::UserDefined => 29,
            Self::LpStr => 30,
            Self::LpWStr => 31,
            Self::Record => 36,
            Self::FileTime => 64,
            Self::Blob => 65,
            Self::Stream => 66,
            Self::Storage => 67,
            Self::StreamedObject => 68,
            Self::StoredObject => 69,
            Self::BlobObject => 70,
            Self::Cf => 71,
            Self::Clsid => 72,
            Self::Vector => 0x1000,
            Self::Array => 0x2000,
            Self::ByRef => 0x4000,
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VT_{}", format!("{self:?}").to_ascii_uppercase())
    }
}

/// User-supplied converter for values that need bespoke native representations.
///
/// The native side always sees a single pointer-sized value.
pub trait CustomMarshaler: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Produce the native value passed for `value`.
    fn to_native(&self, value: &Value, cookie: &str) -> anyhow::Result<*mut c_void>;

    /// Rebuild a value from a native pointer (returns and out parameters).
    fn to_managed(&self, native: *mut c_void, cookie: &str) -> anyhow::Result<Value>;

    /// Release whatever `to_native` allocated, once the call has returned.
    fn clean_up_native(&self, _native: *mut c_void, _cookie: &str) {}
}

/// How one parameter or return value is marshaled.
#[derive(Clone)]
pub struct MarshalDirective {
    pub kind: UnmanagedKind,
    /// Element representation for `Array` and `FixedArray`
    pub array_sub_type: Option<UnmanagedKind>,
    /// Index of the sibling parameter carrying the element count
    pub size_param_index: Option<usize>,
    /// Explicit element count
    pub size_const: Option<usize>,
    /// Element tag for `SafeArray`
    pub safe_array_sub_type: Option<VariantKind>,
    /// Opaque string handed to a custom marshaler
    pub marshal_cookie: Option<String>,
    pub marshal_type: Option<Arc<dyn CustomMarshaler>>,
}

impl MarshalDirective {
    pub fn new(kind: UnmanagedKind) -> Self {
        Self {
            kind,
            array_sub_type: None,
            size_param_index: None,
            size_const: None,
            safe_array_sub_type: None,
            marshal_cookie: None,
            marshal_type: None,
        }
    }

    /// Caller-managed array whose length travels in parameter `size_param_index`.
    pub fn array(size_param_index: usize) -> Self {
        let mut directive = Self::new(UnmanagedKind::Array);
        directive.size_param_index = Some(size_param_index);
        directive
    }

    pub fn fixed_array(size: usize, element: UnmanagedKind) -> Self {
        let mut directive = Self::new(UnmanagedKind::FixedArray);
        directive.size_const = Some(size);
        directive.array_sub_type = Some(element);
        directive
    }

    pub fn safe_array(element: VariantKind) -> Self {
        let mut directive = Self::new(UnmanagedKind::SafeArray);
        directive.safe_array_sub_type = Some(element);
        directive
    }

    pub fn custom(marshaler: Arc<dyn CustomMarshaler>, cookie: impl Into<String>) -> Self {
        let mut directive = Self::new(UnmanagedKind::CustomMarshaler);
        directive.marshal_type = Some(marshaler);
        directive.marshal_cookie = Some(cookie.into());
        directive
    }

    pub fn with_array_sub_type(mut self, element: UnmanagedKind) -> Self {
        self.array_sub_type = Some(element);
        self
    }

    pub fn with_size_const(mut self, size: usize) -> Self {
        self.size_const = Some(size);
        self
    }
}

impl From<UnmanagedKind> for MarshalDirective {
    fn from(kind: UnmanagedKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Debug for MarshalDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarshalDirective")
            .field("kind", &self.kind)
            .field("array_sub_type", &self.array_sub_type)
            .field("size_param_index", &self.size_param_index)
            .field("size_const", &self.size_const)
            .field("safe_array_sub_type", &self.safe_array_sub_type)
            .field("marshal_cookie", &self.marshal_cookie)
            .field(
                "marshal_type",
                &self.marshal_type.as_ref().map(|marshaler| marshaler.name()),
            )
            .finish()
    }
}
