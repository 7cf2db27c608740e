//! Directive to native descriptor translation.

use std::fmt;
use std::mem::size_of;
use std::sync::Arc;

use shimforge_contract::{CustomMarshaler, MarshalDirective, NativeType, UnmanagedKind, VariantKind};
use shimforge_utils::BindingError;
use thiserror::Error;

/// Native representation of a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeTag {
    AnsiBStr,
    AsAny,
    /// 4-byte `BOOL`
    Boolean,
    BStr,
    /// Inline fixed-capacity string
    ByValStr,
    Currency,
    Error,
    Func,
    I1,
    I2,
    I4,
    I8,
    IDispatch,
    LpStr,
    LpStruct,
    LpTStr,
    LpWStr,
    R4,
    R8,
    Struct,
    Int,
    UInt,
    TBStr,
    U1,
    U2,
    U4,
    U8,
    VariantBool,
}

impl NativeTag {
    pub const fn is_string(self) -> bool {
        matches!(
            self,
            Self::AnsiBStr
                | Self::BStr
                | Self::ByValStr
                | Self::LpStr
                | Self::LpTStr
                | Self::LpWStr
                | Self::TBStr
        )
    }

    pub const fn is_struct(self) -> bool {
        matches!(self, Self::Struct | Self::LpStruct)
    }
}

/// Element tag of a tagged variant array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantTag {
    Bool,
    BStr,
    Date,
    Decimal,
    Dispatch,
    Error,
    I1,
    I2,
    I4,
    Int,
    R4,
    R8,
    UI1,
    UI2,
    UI4,
    UInt,
    Unknown,
    Variant,
}

impl VariantTag {
    pub const fn kind(self) -> VariantKind {
        match self {
            Self::Bool => VariantKind::Bool,
            Self::BStr => VariantKind::BStr,
            Self::Date => VariantKind::Date,
            Self::Decimal => VariantKind::Decimal,
            Self::Dispatch => VariantKind::Dispatch,
            Self::Error => VariantKind::Error,
            Self::I1 => VariantKind::I1,
            Self::I2 => VariantKind::I2,
            Self::I4 => VariantKind::I4,
            Self::Int => VariantKind::Int,
            Self::R4 => VariantKind::R4,
            Self::R8 => VariantKind::R8,
            Self::UI1 => VariantKind::UI1,
            Self::UI2 => VariantKind::UI2,
            Self::UI4 => VariantKind::UI4,
            Self::UInt => VariantKind::UInt,
            Self::Unknown => VariantKind::Unknown,
            Self::Variant => VariantKind::Variant,
        }
    }

    pub const fn vartype(self) -> u16 {
        self.kind().vartype()
    }

    /// Element type callers must use for arrays carrying this tag.
    ///
    /// `Decimal` and `Variant` elements are carried as pointers to caller-owned storage, as are
    /// the interface tags.
    pub const fn element_type(self) -> NativeType {
        match self {
            Self::Bool => NativeType::Bool,
            Self::BStr => NativeType::String,
            Self::Date | Self::R8 => NativeType::F64,
            Self::Error | Self::I4 | Self::Int => NativeType::I32,
            Self::I1 => NativeType::I8,
            Self::I2 => NativeType::I16,
            Self::R4 => NativeType::F32,
            Self::UI1 => NativeType::U8,
            Self::UI2 => NativeType::U16,
            Self::UI4 | Self::UInt => NativeType::U32,
            Self::Decimal | Self::Dispatch | Self::Unknown | Self::Variant => NativeType::Pointer,
        }
    }

    /// Bytes per element in the native data block.
    pub const fn element_size(self) -> usize {
        match self {
            Self::Bool | Self::I2 | Self::UI2 => 2,
            Self::I1 | Self::UI1 => 1,
            Self::Error | Self::I4 | Self::Int | Self::R4 | Self::UI4 | Self::UInt => 4,
            Self::Date | Self::R8 => 8,
            Self::BStr | Self::Decimal | Self::Dispatch | Self::Unknown | Self::Variant => {
                size_of::<*mut u8>()
            }
        }
    }
}

impl TryFrom<VariantKind> for VariantTag {
    type Error = TranslateError;

    fn try_from(kind: VariantKind) -> Result<Self, TranslateError> {
        let tag = match kind {
            VariantKind::Bool => Self::Bool,
            VariantKind::BStr => Self::BStr,
            VariantKind::Date => Self::Date,
            VariantKind::Decimal => Self::Decimal,
            VariantKind::Dispatch => Self::Dispatch,
            VariantKind::Error => Self::Error,
            VariantKind::I1 => Self::I1,
            VariantKind::I2 => Self::I2,
            VariantKind::I4 => Self::I4,
            VariantKind::Int => Self::Int,
            VariantKind::R4 => Self::R4,
            VariantKind::R8 => Self::R8,
            VariantKind::UI1 => Self::UI1,
            VariantKind::UI2 => Self::UI2,
            VariantKind::UI4 => Self::UI4,
            VariantKind::UInt => Self::UInt,
            VariantKind::Unknown => Self::Unknown,
            VariantKind::Variant => Self::Variant,
            other => return Err(TranslateError::Unsupported(other.to_string())),
        };
        Ok(tag)
    }
}

/// Fully resolved marshaling request for one parameter or return value.
#[derive(Clone)]
pub enum NativeDescriptor {
    Scalar(NativeTag),
    Array {
        element: Option<NativeTag>,
        size_param_index: Option<usize>,
        size_const: Option<usize>,
    },
    FixedArray {
        size: usize,
        element: NativeTag,
    },
    Custom {
        cookie: String,
        marshaler: Arc<dyn CustomMarshaler>,
    },
    TaggedArray {
        element: VariantTag,
    },
}

impl fmt::Debug for NativeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(tag) => f.debug_tuple("Scalar").field(tag).finish(),
            Self::Array {
                element,
                size_param_index,
                size_const,
            } => f
                .debug_struct("Array")
                .field("element", element)
                .field("size_param_index", size_param_index)
                .field("size_const", size_const)
                .finish(),
            Self::FixedArray { size, element } => f
                .debug_struct("FixedArray")
                .field("size", size)
                .field("element", element)
                .finish(),
            Self::Custom { cookie, marshaler } => f
                .debug_struct("Custom")
                .field("cookie", cookie)
                .field("marshaler", &marshaler.name())
                .finish(),
            Self::TaggedArray { element } => f
                .debug_struct("TaggedArray")
                .field("element", element)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("marshal kind `{0}` is not supported")]
    Unsupported(String),
    #[error("fixed array needs a size_const")]
    MissingSize,
    #[error("fixed array needs an array_sub_type")]
    MissingElement,
    #[error("`{0}` cannot be an array element")]
    InvalidElement(UnmanagedKind),
    #[error("custom marshaler directive has no marshal_type")]
    MissingMarshaler,
}

impl TranslateError {
    /// Attach the contract and member the directive belongs to.
    pub fn into_binding_error(self, contract: &str, member: &str) -> BindingError {
        match self {
            Self::Unsupported(kind) => BindingError::unsupported(kind),
            other => BindingError::contract(contract, format!("`{member}`: {other}")),
        }
    }
}

/// Scalar mapping shared by plain directives and array elements.
pub fn scalar_tag(kind: UnmanagedKind) -> Result<NativeTag, TranslateError> {
    let tag = match kind {
        UnmanagedKind::AnsiBStr => NativeTag::AnsiBStr,
        UnmanagedKind::AsAny => NativeTag::AsAny,
        UnmanagedKind::Bool => NativeTag::Boolean,
        UnmanagedKind::BStr => NativeTag::BStr,
        UnmanagedKind::FixedString => NativeTag::ByValStr,
        UnmanagedKind::Currency => NativeTag::Currency,
        UnmanagedKind::Error => NativeTag::Error,
        UnmanagedKind::FunctionPtr => NativeTag::Func,
        UnmanagedKind::I1 => NativeTag::I1,
        UnmanagedKind::I2 => NativeTag::I2,
        UnmanagedKind::I4 => NativeTag::I4,
        UnmanagedKind::I8 => NativeTag::I8,
        UnmanagedKind::IDispatch => NativeTag::IDispatch,
        UnmanagedKind::LpStr => NativeTag::LpStr,
        UnmanagedKind::LpStruct => NativeTag::LpStruct,
        UnmanagedKind::LpTStr => NativeTag::LpTStr,
        UnmanagedKind::LpWStr => NativeTag::LpWStr,
        UnmanagedKind::R4 => NativeTag::R4,
        UnmanagedKind::R8 => NativeTag::R8,
        UnmanagedKind::Struct => NativeTag::Struct,
        UnmanagedKind::SysInt => NativeTag::Int,
        UnmanagedKind::SysUInt => NativeTag::UInt,
        UnmanagedKind::TBStr => NativeTag::TBStr,
        UnmanagedKind::U1 => NativeTag::U1,
        UnmanagedKind::U2 => NativeTag::U2,
        UnmanagedKind::U4 => NativeTag::U4,
        UnmanagedKind::U8 => NativeTag::U8,
        UnmanagedKind::VariantBool => NativeTag::VariantBool,
        UnmanagedKind::HString
        | UnmanagedKind::IInspectable
        | UnmanagedKind::Interface
        | UnmanagedKind::IUnknown
        | UnmanagedKind::VbByRefStr => return Err(TranslateError::Unsupported(kind.to_string())),
        UnmanagedKind::Array
        | UnmanagedKind::FixedArray
        | UnmanagedKind::CustomMarshaler
        | UnmanagedKind::SafeArray => return Err(TranslateError::InvalidElement(kind)),
    };
    Ok(tag)
}

/// Translate one directive.
pub fn translate(directive: &MarshalDirective) -> Result<NativeDescriptor, TranslateError> {
    match directive.kind {
        UnmanagedKind::Array => Ok(NativeDescriptor::Array {
            element: directive.array_sub_type.map(scalar_tag).transpose()?,
            size_param_index: directive.size_param_index,
            size_const: directive.size_const,
        }),
        UnmanagedKind::FixedArray => {
            let size = directive.size_const.ok_or(TranslateError::MissingSize)?;
            let element = directive
                .array_sub_type
                .ok_or(TranslateError::MissingElement)
                .and_then(scalar_tag)?;
            Ok(NativeDescriptor::FixedArray { size, element })
        }
        UnmanagedKind::CustomMarshaler => {
            let marshaler = directive
                .marshal_type
                .clone()
                .ok_or(TranslateError::MissingMarshaler)?;
            Ok(NativeDescriptor::Custom {
                cookie: directive.marshal_cookie.clone().unwrap_or_default(),
                marshaler,
            })
        }
        UnmanagedKind::SafeArray => {
            let kind = directive.safe_array_sub_type.unwrap_or(VariantKind::Empty);
            Ok(NativeDescriptor::TaggedArray {
                element: VariantTag::try_from(kind)?,
            })
        }
        kind => scalar_tag(kind).map(NativeDescriptor::Scalar),
    }
}
