use std::ffi::c_void;
use std::fmt;
use std::mem::{align_of, size_of};

/// Type of a parameter, return value or global as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeType {
    Void,
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    ISize,
    USize,
    Pointer,
    String,
    Array(Box<NativeType>),
    Struct(StructLayout),
}

impl NativeType {
    pub fn array_of(element: NativeType) -> Self {
        Self::Array(Box::new(element))
    }

    /// Scalars that map onto a single machine value (integers, floats, pointers, bool).
    pub const fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::I8
                | Self::U8
                | Self::I16
                | Self::U16
                | Self::I32
                | Self::U32
                | Self::I64
                | Self::U64
                | Self::F32
                | Self::F64
                | Self::ISize
                | Self::USize
                | Self::Pointer
        )
    }

    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::U8
                | Self::I16
                | Self::U16
                | Self::I32
                | Self::U32
                | Self::I64
                | Self::U64
                | Self::ISize
                | Self::USize
        )
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Types whose storage is inline and fixed-size, i.e. valid targets for global references.
    pub const fn is_value_type(&self) -> bool {
        self.is_scalar() || matches!(self, Self::Struct(_))
    }

    /// Types that can only cross the boundary through a marshaling step.
    pub const fn needs_marshaling(&self) -> bool {
        matches!(self, Self::String | Self::Array(_))
    }

    /// Size of the inline native representation (`bool` is one byte).
    pub fn size(&self) -> Option<usize> {
        let size = match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
            Self::ISize | Self::USize => size_of::<usize>(),
            Self::Pointer => size_of::<*mut c_void>(),
            Self::Struct(layout) => layout.size(),
            Self::Void | Self::String | Self::Array(_) => return None,
        };
        Some(size)
    }

    pub fn align(&self) -> Option<usize> {
        let align = match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 => align_of::<u64>(),
            Self::F64 => align_of::<f64>(),
            Self::ISize | Self::USize => align_of::<usize>(),
            Self::Pointer => align_of::<*mut c_void>(),
            Self::Struct(layout) => layout.align(),
            Self::Void | Self::String | Self::Array(_) => return None,
        };
        Some(align)
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Bool => write!(f, "bool"),
            Self::I8 => write!(f, "i8"),
            Self::U8 => write!(f, "u8"),
            Self::I16 => write!(f, "i16"),
            Self::U16 => write!(f, "u16"),
            Self::I32 => write!(f, "i32"),
            Self::U32 => write!(f, "u32"),
            Self::I64 => write!(f, "i64"),
            Self::U64 => write!(f, "u64"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
            Self::ISize => write!(f, "isize"),
            Self::USize => write!(f, "usize"),
            Self::Pointer => write!(f, "ptr"),
            Self::String => write!(f, "string"),
            Self::Array(element) => write!(f, "[{element}]"),
            Self::Struct(layout) => {
                write!(f, "struct {{")?;
                for (idx, field) in layout.fields().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Sequential C layout of a struct passed by value or by pointer.
///
/// Fields must be scalars; offsets follow natural alignment with tail padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructLayout {
    fields: Vec<NativeType>,
}

impl StructLayout {
    pub fn new(fields: Vec<NativeType>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[NativeType] {
        &self.fields
    }

    /// True when every field has a fixed scalar representation.
    pub fn is_blittable(&self) -> bool {
        !self.fields.is_empty() && self.fields.iter().all(NativeType::is_scalar)
    }

    pub fn align(&self) -> usize {
        self.fields
            .iter()
            .filter_map(NativeType::align)
            .max()
            .unwrap_or(1)
    }

    pub fn offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.fields.len());
        let mut cursor = 0usize;
        for field in &self.fields {
            let align = field.align().unwrap_or(1);
            cursor = cursor.next_multiple_of(align);
            offsets.push(cursor);
            cursor += field.size().unwrap_or(0);
        }
        offsets
    }

    pub fn size(&self) -> usize {
        let end = self
            .offsets()
            .last()
            .zip(self.fields.last())
            .map(|(offset, field)| offset + field.size().unwrap_or(0))
            .unwrap_or(0);
        end.next_multiple_of(self.align())
    }
}

/// Direction a parameter's data flows in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamDirection {
    #[default]
    In,
    /// Written by the callee; passed as a pointer.
    Out,
    /// Read and written by the callee; passed as a pointer.
    InOut,
}

impl ParamDirection {
    pub const fn is_by_ref(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}
