use std::ffi::c_void;
use std::mem::size_of;

use libffi::middle::Type;
use shimforge_contract::{NativeType, Value};

use crate::translator::NativeTag;

/// In-memory layout of one scalar on the native side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repr {
    /// C `bool`
    Bool8,
    /// Win32 `BOOL`
    Bool32,
    /// `VARIANT_BOOL`: `-1` for true
    VariantBool,
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
    /// `CY`: fixed point scaled by 10 000
    Currency,
}

impl Repr {
    /// Layout used when no directive says otherwise. `bool_repr` picks the boolean width.
    pub const fn natural(ty: &NativeType, bool_repr: Self) -> Option<Self> {
        let repr = match ty {
            NativeType::Bool => bool_repr,
            NativeType::I8 => Self::I8,
            NativeType::U8 => Self::U8,
            NativeType::I16 => Self::I16,
            NativeType::U16 => Self::U16,
            NativeType::I32 => Self::I32,
            NativeType::U32 => Self::U32,
            NativeType::I64 => Self::I64,
            NativeType::U64 => Self::U64,
            NativeType::F32 => Self::F32,
            NativeType::F64 => Self::F64,
            NativeType::ISize => Self::ISize,
            NativeType::USize => Self::USize,
            NativeType::Pointer => Self::Pointer,
            NativeType::Void
            | NativeType::String
            | NativeType::Array(_)
            | NativeType::Struct(_) => {
                return None;
            }
        };
        Some(repr)
    }

    /// Layout requested by a scalar tag; strings and structs have none.
    pub const fn from_tag(tag: NativeTag) -> Option<Self> {
        let repr = match tag {
            NativeTag::Boolean => Self::Bool32,
            NativeTag::VariantBool => Self::VariantBool,
            NativeTag::I1 => Self::I8,
            NativeTag::I2 => Self::I16,
            NativeTag::I4 | NativeTag::Error => Self::I32,
            NativeTag::I8 => Self::I64,
            NativeTag::U1 => Self::U8,
            NativeTag::U2 => Self::U16,
            NativeTag::U4 => Self::U32,
            NativeTag::U8 => Self::U64,
            NativeTag::R4 => Self::F32,
            NativeTag::R8 => Self::F64,
            NativeTag::Int => Self::ISize,
            NativeTag::UInt => Self::USize,
            NativeTag::Currency => Self::Currency,
            NativeTag::Func | NativeTag::AsAny | NativeTag::IDispatch => Self::Pointer,
            NativeTag::AnsiBStr
            | NativeTag::BStr
            | NativeTag::ByValStr
            | NativeTag::LpStr
            | NativeTag::LpStruct
            | NativeTag::LpTStr
            | NativeTag::LpWStr
            | NativeTag::Struct
            | NativeTag::TBStr => return None,
        };
        Some(repr)
    }

    pub const fn size(self) -> usize {
        match self {
            Self::Bool8 | Self::I8 | Self::U8 => 1,
            Self::VariantBool | Self::I16 | Self::U16 => 2,
            Self::Bool32 | Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 | Self::Currency => 8,
            Self::ISize | Self::USize | Self::Pointer => size_of::<usize>(),
        }
    }

    const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn ffi_type(self) -> Type {
        match self {
            Self::Bool8 | Self::U8 => Type::u8(),
            Self::I8 => Type::i8(),
            Self::VariantBool | Self::I16 => Type::i16(),
            Self::U16 => Type::u16(),
            Self::Bool32 | Self::I32 => Type::i32(),
            Self::U32 => Type::u32(),
            Self::I64 | Self::Currency => Type::i64(),
            Self::U64 => Type::u64(),
            Self::F32 => Type::f32(),
            Self::F64 => Type::f64(),
            Self::ISize => Type::isize(),
            Self::USize => Type::usize(),
            Self::Pointer => Type::pointer(),
        }
    }

    /// Whether values declared as `ty` can be carried in this layout.
    ///
    /// Integers may change signedness but never width.
    pub fn accepts(self, ty: &NativeType) -> bool {
        match self {
            Self::Bool8 | Self::Bool32 | Self::VariantBool => *ty == NativeType::Bool,
            Self::F32 => *ty == NativeType::F32,
            Self::F64 => *ty == NativeType::F64,
            Self::Currency => matches!(ty, NativeType::F64 | NativeType::I64),
            Self::Pointer => *ty == NativeType::Pointer,
            _ => ty.is_integer() && ty.size() == Some(self.size()),
        }
    }

    /// Write `value` into the first `size()` bytes of `dst`.
    pub fn encode(self, value: &Value, dst: &mut [u8]) -> Result<(), String> {
        let dst = &mut dst[..self.size()];
        match (self, value) {
            (Self::Bool8, Value::Bool(flag)) => dst.copy_from_slice(&[u8::from(*flag)]),
            (Self::Bool32, Value::Bool(flag)) => {
                dst.copy_from_slice(&i32::from(*flag).to_ne_bytes());
            }
            (Self::VariantBool, Value::Bool(flag)) => {
                dst.copy_from_slice(&(if *flag { -1i16 } else { 0 }).to_ne_bytes());
            }
            (Self::F32, Value::F32(number)) => dst.copy_from_slice(&number.to_ne_bytes()),
            (Self::F64, Value::F64(number)) => dst.copy_from_slice(&number.to_ne_bytes()),
            (Self::Currency, Value::F64(amount)) => {
                let scaled = (amount * 10_000.0).round() as i64;
                dst.copy_from_slice(&scaled.to_ne_bytes());
            }
            (Self::Currency, Value::I64(raw)) => dst.copy_from_slice(&raw.to_ne_bytes()),
            (Self::Pointer, Value::Pointer(ptr)) => {
                dst.copy_from_slice(&(*ptr as usize).to_ne_bytes());
            }
            (repr, value) => {
                let bits = integer_bits(value)
                    .ok_or_else(|| format!("cannot pass {} as {repr:?}", value.type_name()))?;
                write_bits(bits, dst);
            }
        }
        Ok(())
    }

    /// Read a value of declared type `ty` from the first `size()` bytes of `src`.
    pub fn decode(self, src: &[u8], ty: &NativeType) -> Value {
        let bits = read_bits(&src[..self.size()]);
        match self {
            Self::Bool8 | Self::Bool32 | Self::VariantBool => Value::Bool(bits != 0),
            Self::F32 => Value::F32(f32::from_bits(bits as u32)),
            Self::F64 => Value::F64(f64::from_bits(bits)),
            Self::Currency if *ty == NativeType::F64 => Value::F64(bits as i64 as f64 / 10_000.0),
            Self::Pointer => Value::Pointer(bits as usize as *mut c_void),
            _ => integer_value(ty, bits),
        }
    }

    /// Decode a return value; libffi widens small integral returns to a full register.
    pub fn decode_return(self, ret: &[u8], ty: &NativeType) -> Value {
        if self.is_float() || self.size() >= size_of::<usize>() {
            return self.decode(ret, ty);
        }
        let mut register = [0u8; size_of::<usize>()];
        register.copy_from_slice(&ret[..size_of::<usize>()]);
        let widened = usize::from_ne_bytes(register) as u64;
        let mut narrow = [0u8; 8];
        write_bits(widened, &mut narrow[..self.size()]);
        self.decode(&narrow, ty)
    }
}

/// Two's complement bits of an integer value.
fn integer_bits(value: &Value) -> Option<u64> {
    let bits = match *value {
        Value::I8(v) => v as u64,
        Value::U8(v) => u64::from(v),
        Value::I16(v) => v as u64,
        Value::U16(v) => u64::from(v),
        Value::I32(v) => v as u64,
        Value::U32(v) => u64::from(v),
        Value::I64(v) => v as u64,
        Value::U64(v) => v,
        Value::ISize(v) => v as u64,
        Value::USize(v) => v as u64,
        _ => return None,
    };
    Some(bits)
}

/// Store the low `dst.len()` bytes of `bits` in native byte order.
fn write_bits(bits: u64, dst: &mut [u8]) {
    match dst.len() {
        1 => dst.copy_from_slice(&[bits as u8]),
        2 => dst.copy_from_slice(&(bits as u16).to_ne_bytes()),
        4 => dst.copy_from_slice(&(bits as u32).to_ne_bytes()),
        _ => dst.copy_from_slice(&bits.to_ne_bytes()[..dst.len()]),
    }
}

/// Zero-extended bits of a 1, 2, 4 or 8 byte native-endian integer.
fn read_bits(src: &[u8]) -> u64 {
    match src.len() {
        1 => u64::from(src[0]),
        2 => u64::from(u16::from_ne_bytes([src[0], src[1]])),
        4 => u64::from(u32::from_ne_bytes([src[0], src[1], src[2], src[3]])),
        _ => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&src[..8]);
            u64::from_ne_bytes(raw)
        }
    }
}

fn integer_value(ty: &NativeType, bits: u64) -> Value {
    match ty {
        NativeType::I8 => Value::I8(bits as u8 as i8),
        NativeType::U8 => Value::U8(bits as u8),
        NativeType::I16 => Value::I16(bits as u16 as i16),
        NativeType::U16 => Value::U16(bits as u16),
        NativeType::I32 => Value::I32(bits as u32 as i32),
        NativeType::U32 => Value::U32(bits as u32),
        NativeType::I64 => Value::I64(bits as i64),
        NativeType::ISize => Value::ISize(bits as usize as isize),
        NativeType::USize => Value::USize(bits as usize),
        _ => Value::U64(bits),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(repr: Repr, value: Value, ty: &NativeType) -> Value {
        let mut bytes = [0u8; 8];
        repr.encode(&value, &mut bytes).unwrap();
        repr.decode(&bytes, ty)
    }

    #[test]
    fn test_bool_widths() {
        let mut bytes = [0u8; 8];
        Repr::Bool32.encode(&Value::Bool(true), &mut bytes).unwrap();
        assert_eq!(i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 1);

        Repr::VariantBool.encode(&Value::Bool(true), &mut bytes).unwrap();
        assert_eq!(i16::from_ne_bytes([bytes[0], bytes[1]]), -1);

        assert_eq!(
            round_trip(Repr::VariantBool, Value::Bool(false), &NativeType::Bool),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_currency_scaling() {
        let mut bytes = [0u8; 8];
        Repr::Currency.encode(&Value::F64(12.3456), &mut bytes).unwrap();
        assert_eq!(i64::from_ne_bytes(bytes), 123_456);
        assert_eq!(
            Repr::Currency.decode(&bytes, &NativeType::F64),
            Value::F64(12.3456)
        );
        assert_eq!(
            Repr::Currency.decode(&bytes, &NativeType::I64),
            Value::I64(123_456)
        );
    }

    #[test]
    fn test_sign_reinterpretation() {
        assert!(Repr::U32.accepts(&NativeType::I32));
        assert!(!Repr::U32.accepts(&NativeType::I64));
        assert_eq!(
            round_trip(Repr::U32, Value::I32(-1), &NativeType::I32),
            Value::I32(-1)
        );
        assert_eq!(
            round_trip(Repr::I16, Value::I16(-300), &NativeType::I16),
            Value::I16(-300)
        );
    }

    #[test]
    fn test_mismatched_value() {
        let mut bytes = [0u8; 8];
        assert!(Repr::I32.encode(&Value::F32(1.0), &mut bytes).is_err());
    }

    #[test]
    fn test_widened_return() {
        let mut register = [0u8; 8];
        register[..size_of::<usize>()].copy_from_slice(&(0xffff_ff85usize).to_ne_bytes());
        assert_eq!(
            Repr::I8.decode_return(&register, &NativeType::I8),
            Value::I8(-123)
        );
        assert_eq!(
            Repr::Bool8.decode_return(&register, &NativeType::Bool),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_tags() {
        assert_eq!(Repr::from_tag(NativeTag::Boolean), Some(Repr::Bool32));
        assert_eq!(Repr::from_tag(NativeTag::Error), Some(Repr::I32));
        assert_eq!(Repr::from_tag(NativeTag::LpStr), None);
        assert_eq!(
            Repr::natural(&NativeType::Bool, Repr::Bool8),
            Some(Repr::Bool8)
        );
        assert_eq!(Repr::natural(&NativeType::String, Repr::Bool8), None);
    }
}
