//! Runtime values passed to and returned from bound members.

use std::any::Any;
use std::ffi::c_void;
use std::fmt;
use std::ptr;
use std::sync::Arc;

use shimforge_utils::BindingError;

use crate::types::NativeType;

/// An argument or return value.
///
/// `Out`/`InOut` parameters are written back into the caller's slot after the call.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    ISize(isize),
    USize(usize),
    Pointer(*mut c_void),
    /// `None` crosses the boundary as a null pointer.
    String(Option<String>),
    Array(ArrayValue),
    /// Field values in declaration order.
    Struct(Vec<Value>),
    /// Payload only a custom marshaler understands.
    Opaque(Opaque),
}

/// Homogeneous array contents.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    Bool(Vec<bool>),
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    ISize(Vec<isize>),
    USize(Vec<usize>),
    Pointer(Vec<*mut c_void>),
    String(Vec<String>),
}

/// Shared, type-erased payload for custom marshalers.
#[derive(Clone)]
pub struct Opaque(pub Arc<dyn Any + Send + Sync>);

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Opaque(..)")
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Value {
    pub const fn null() -> Self {
        Self::Pointer(ptr::null_mut())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::U8(_) => "u8",
            Self::I16(_) => "i16",
            Self::U16(_) => "u16",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::ISize(_) => "isize",
            Self::USize(_) => "usize",
            Self::Pointer(_) => "ptr",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Struct(_) => "struct",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Whether this value has the shape `ty` declares.
    pub fn conforms_to(&self, ty: &NativeType) -> bool {
        match (self, ty) {
            (Self::Void, NativeType::Void)
            | (Self::Bool(_), NativeType::Bool)
            | (Self::I8(_), NativeType::I8)
            | (Self::U8(_), NativeType::U8)
            | (Self::I16(_), NativeType::I16)
            | (Self::U16(_), NativeType::U16)
            | (Self::I32(_), NativeType::I32)
            | (Self::U32(_), NativeType::U32)
            | (Self::I64(_), NativeType::I64)
            | (Self::U64(_), NativeType::U64)
            | (Self::F32(_), NativeType::F32)
            | (Self::F64(_), NativeType::F64)
            | (Self::ISize(_), NativeType::ISize)
            | (Self::USize(_), NativeType::USize)
            | (Self::Pointer(_), NativeType::Pointer)
            | (Self::String(_), NativeType::String) => true,
            (Self::Array(array), NativeType::Array(element)) => array.element_type() == **element,
            (Self::Struct(fields), NativeType::Struct(layout)) => {
                fields.len() == layout.fields().len()
                    && fields
                        .iter()
                        .zip(layout.fields())
                        .all(|(value, field)| value.conforms_to(field))
            }
            _ => false,
        }
    }

    /// Zero value of `ty`, used to seed `Out` parameters.
    pub fn default_for(ty: &NativeType) -> Self {
        match ty {
            NativeType::Void => Self::Void,
            NativeType::Bool => Self::Bool(false),
            NativeType::I8 => Self::I8(0),
            NativeType::U8 => Self::U8(0),
            NativeType::I16 => Self::I16(0),
            NativeType::U16 => Self::U16(0),
            NativeType::I32 => Self::I32(0),
            NativeType::U32 => Self::U32(0),
            NativeType::I64 => Self::I64(0),
            NativeType::U64 => Self::U64(0),
            NativeType::F32 => Self::F32(0.0),
            NativeType::F64 => Self::F64(0.0),
            NativeType::ISize => Self::ISize(0),
            NativeType::USize => Self::USize(0),
            NativeType::Pointer => Self::null(),
            NativeType::String => Self::String(None),
            NativeType::Array(element) => Self::Array(ArrayValue::empty(element)),
            NativeType::Struct(layout) => {
                Self::Struct(layout.fields().iter().map(Self::default_for).collect())
            }
        }
    }

    pub fn is_null_pointer(&self) -> bool {
        matches!(self, Self::Pointer(ptr) if ptr.is_null())
    }
}

impl ArrayValue {
    /// An empty array of `element`; non-scalar elements fall back to pointers.
    pub fn empty(element: &NativeType) -> Self {
        match element {
            NativeType::Bool => Self::Bool(Vec::new()),
            NativeType::I8 => Self::I8(Vec::new()),
            NativeType::U8 => Self::U8(Vec::new()),
            NativeType::I16 => Self::I16(Vec::new()),
            NativeType::U16 => Self::U16(Vec::new()),
            NativeType::I32 => Self::I32(Vec::new()),
            NativeType::U32 => Self::U32(Vec::new()),
            NativeType::I64 => Self::I64(Vec::new()),
            NativeType::U64 => Self::U64(Vec::new()),
            NativeType::F32 => Self::F32(Vec::new()),
            NativeType::F64 => Self::F64(Vec::new()),
            NativeType::ISize => Self::ISize(Vec::new()),
            NativeType::USize => Self::USize(Vec::new()),
            NativeType::String => Self::String(Vec::new()),
            _ => Self::Pointer(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Bool(items) => items.len(),
            Self::I8(items) => items.len(),
            Self::U8(items) => items.len(),
            Self::I16(items) => items.len(),
            Self::U16(items) => items.len(),
            Self::I32(items) => items.len(),
            Self::U32(items) => items.len(),
            Self::I64(items) => items.len(),
            Self::U64(items) => items.len(),
            Self::F32(items) => items.len(),
            Self::F64(items) => items.len(),
            Self::ISize(items) => items.len(),
            Self::USize(items) => items.len(),
            Self::Pointer(items) => items.len(),
            Self::String(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements as individual values, in order.
    pub fn to_values(&self) -> Vec<Value> {
        match self {
            Self::Bool(items) => items.iter().copied().map(Value::Bool).collect(),
            Self::I8(items) => items.iter().copied().map(Value::I8).collect(),
            Self::U8(items) => items.iter().copied().map(Value::U8).collect(),
            Self::I16(items) => items.iter().copied().map(Value::I16).collect(),
            Self::U16(items) => items.iter().copied().map(Value::U16).collect(),
            Self::I32(items) => items.iter().copied().map(Value::I32).collect(),
            Self::U32(items) => items.iter().copied().map(Value::U32).collect(),
            Self::I64(items) => items.iter().copied().map(Value::I64).collect(),
            Self::U64(items) => items.iter().copied().map(Value::U64).collect(),
            Self::F32(items) => items.iter().copied().map(Value::F32).collect(),
            Self::F64(items) => items.iter().copied().map(Value::F64).collect(),
            Self::ISize(items) => items.iter().copied().map(Value::ISize).collect(),
            Self::USize(items) => items.iter().copied().map(Value::USize).collect(),
            Self::Pointer(items) => items.iter().copied().map(Value::Pointer).collect(),
            Self::String(items) => items.iter().cloned().map(Value::from).collect(),
        }
    }

    /// Rebuild an array of `element` from individual values.
    ///
    /// Returns `None` when a value does not match `element`. Null strings become empty strings.
    pub fn from_values(element: &NativeType, values: Vec<Value>) -> Option<Self> {
        macro_rules! collect {
            ($variant:ident) => {
                values
                    .into_iter()
                    .map(|value| match value {
                        Value::$variant(inner) => Some(inner),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()
                    .map(Self::$variant)
            };
        }

        match element {
            NativeType::Bool => collect!(Bool),
            NativeType::I8 => collect!(I8),
            NativeType::U8 => collect!(U8),
            NativeType::I16 => collect!(I16),
            NativeType::U16 => collect!(U16),
            NativeType::I32 => collect!(I32),
            NativeType::U32 => collect!(U32),
            NativeType::I64 => collect!(I64),
            NativeType::U64 => collect!(U64),
            NativeType::F32 => collect!(F32),
            NativeType::F64 => collect!(F64),
            NativeType::ISize => collect!(ISize),
            NativeType::USize => collect!(USize),
            NativeType::Pointer => collect!(Pointer),
            NativeType::String => values
                .into_iter()
                .map(|value| match value {
                    Value::String(inner) => Some(inner.unwrap_or_default()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(Self::String),
            _ => None,
        }
    }

    pub const fn element_type(&self) -> NativeType {
        match self {
            Self::Bool(_) => NativeType::Bool,
            Self::I8(_) => NativeType::I8,
            Self::U8(_) => NativeType::U8,
            Self::I16(_) => NativeType::I16,
            Self::U16(_) => NativeType::U16,
            Self::I32(_) => NativeType::I32,
            Self::U32(_) => NativeType::U32,
            Self::I64(_) => NativeType::I64,
            Self::U64(_) => NativeType::U64,
            Self::F32(_) => NativeType::F32,
            Self::F64(_) => NativeType::F64,
            Self::ISize(_) => NativeType::ISize,
            Self::USize(_) => NativeType::USize,
            Self::Pointer(_) => NativeType::Pointer,
            Self::String(_) => NativeType::String,
        }
    }
}

macro_rules! scalar_conversions {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }

            impl TryFrom<Value> for $ty {
                type Error = BindingError;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    match value {
                        Value::$variant(inner) => Ok(inner),
                        other => Err(BindingError::invalid_call(
                            "<return>",
                            format!("expected {}, found {}", stringify!($ty), other.type_name()),
                        )),
                    }
                }
            }
        )*
    };
}

scalar_conversions! {
    Bool => bool,
    I8 => i8,
    U8 => u8,
    I16 => i16,
    U16 => u16,
    I32 => i32,
    U32 => u32,
    I64 => i64,
    U64 => u64,
    F32 => f32,
    F64 => f64,
    ISize => isize,
    USize => usize,
    Pointer => *mut c_void,
    Array => ArrayValue,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Some(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(Some(value))
    }
}

impl TryFrom<Value> for Option<String> {
    type Error = BindingError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(inner) => Ok(inner),
            other => Err(BindingError::invalid_call(
                "<return>",
                format!("expected string, found {}", other.type_name()),
            )),
        }
    }
}

impl TryFrom<Value> for () {
    type Error = BindingError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Void => Ok(()),
            other => Err(BindingError::invalid_call(
                "<return>",
                format!("expected void, found {}", other.type_name()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StructLayout;

    #[test]
    fn test_conforms_to() {
        assert!(Value::I32(3).conforms_to(&NativeType::I32));
        assert!(!Value::I32(3).conforms_to(&NativeType::I64));
        assert!(Value::from("hi").conforms_to(&NativeType::String));
        let floats = NativeType::array_of(NativeType::F32);
        assert!(Value::Array(ArrayValue::F32(vec![1.0])).conforms_to(&floats));
        let layout = StructLayout::new(vec![NativeType::I32, NativeType::F64]);
        assert!(
            Value::Struct(vec![Value::I32(1), Value::F64(2.0)])
                .conforms_to(&NativeType::Struct(layout.clone()))
        );
        assert!(!Value::Struct(vec![Value::I32(1)]).conforms_to(&NativeType::Struct(layout)));
    }

    #[test]
    fn test_default_for_out_params() {
        assert_eq!(Value::default_for(&NativeType::I32), Value::I32(0));
        assert!(Value::default_for(&NativeType::Pointer).is_null_pointer());
        assert_eq!(
            Value::default_for(&NativeType::array_of(NativeType::U16)),
            Value::Array(ArrayValue::U16(vec![]))
        );
    }

    #[test]
    fn test_try_from() {
        let n: i32 = Value::I32(7).try_into().unwrap();
        assert_eq!(n, 7);
        let err = u64::try_from(Value::I32(7)).unwrap_err();
        assert!(err.to_string().contains("expected u64, found i32"));
        <()>::try_from(Value::Void).unwrap();
        assert!(<()>::try_from(Value::I8(0)).is_err());
    }

    #[test]
    fn test_array_element_values() {
        let array = ArrayValue::I16(vec![1, -2]);
        let values = array.to_values();
        assert_eq!(values, vec![Value::I16(1), Value::I16(-2)]);
        assert_eq!(ArrayValue::from_values(&NativeType::I16, values), Some(array));
        assert_eq!(
            ArrayValue::from_values(&NativeType::I16, vec![Value::I32(1)]),
            None
        );
        assert_eq!(
            ArrayValue::from_values(&NativeType::String, vec![Value::String(None)]),
            Some(ArrayValue::String(vec![String::new()]))
        );
    }

    #[test]
    fn test_opaque_identity() {
        let payload = Opaque::new(42u32);
        assert_eq!(payload.downcast_ref::<u32>(), Some(&42));
        assert_eq!(Value::Opaque(payload.clone()), Value::Opaque(payload));
        assert_ne!(Value::Opaque(Opaque::new(1u8)), Value::Opaque(Opaque::new(1u8)));
    }
}
