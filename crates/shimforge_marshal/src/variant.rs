//! Self-describing arrays of tagged variant elements.

use std::ffi::c_void;
use std::ptr;

use shimforge_contract::{ArrayValue, Value};

use crate::buffer::AlignedBuf;
use crate::repr::Repr;
use crate::strings::{AnsiPolicy, CodePage, NativeString, StringError, StringKind, read_native};
use crate::translator::VariantTag;

/// Header passed to native code in place of a tagged array.
#[repr(C)]
#[derive(Debug)]
pub struct TaggedArray {
    /// `VARTYPE` of every element
    pub vartype: u16,
    pub element_size: u32,
    pub count: usize,
    pub data: *mut c_void,
}

/// A tagged array laid out for one call.
#[derive(Debug)]
pub struct NativeTaggedArray {
    header: Box<TaggedArray>,
    data: AlignedBuf,
    _strings: Vec<NativeString>,
    capacity: usize,
}

impl VariantTag {
    /// Scalar layout of the elements; `BStr` elements are string pointers instead.
    pub const fn repr(self) -> Repr {
        match self {
            Self::Bool => Repr::VariantBool,
            Self::Date | Self::R8 => Repr::F64,
            Self::Error | Self::I4 | Self::Int => Repr::I32,
            Self::I1 => Repr::I8,
            Self::I2 => Repr::I16,
            Self::R4 => Repr::F32,
            Self::UI1 => Repr::U8,
            Self::UI2 => Repr::U16,
            Self::UI4 | Self::UInt => Repr::U32,
            Self::BStr | Self::Decimal | Self::Dispatch | Self::Unknown | Self::Variant => {
                Repr::Pointer
            }
        }
    }
}

impl NativeTaggedArray {
    /// Lay out `array`, whose element type has already been checked against `tag`.
    pub fn new(tag: VariantTag, array: &ArrayValue) -> Result<Self, String> {
        let element_size = tag.element_size();
        let values = array.to_values();
        let mut data = AlignedBuf::zeroed(values.len() * element_size);
        let mut strings = Vec::new();

        for (idx, value) in values.iter().enumerate() {
            let slot = &mut data.bytes_mut()[idx * element_size..(idx + 1) * element_size];
            if tag == VariantTag::BStr {
                let text = match value {
                    Value::String(text) => text.as_deref().unwrap_or_default(),
                    other => {
                        return Err(format!(
                            "expected string element, found {}",
                            other.type_name()
                        ));
                    }
                };
                let mut native =
                    NativeString::new(StringKind::WideBStr, text, &AnsiPolicy::default())
                        .map_err(|err: StringError| err.to_string())?;
                slot.copy_from_slice(&(native.as_mut_ptr() as usize).to_ne_bytes());
                strings.push(native);
            } else {
                tag.repr().encode(value, slot)?;
            }
        }

        let capacity = values.len();
        let header = Box::new(TaggedArray {
            vartype: tag.vartype(),
            element_size: element_size as u32,
            count: capacity,
            data: data.as_mut_ptr().cast(),
        });
        Ok(Self {
            header,
            data,
            _strings: strings,
            capacity,
        })
    }

    pub fn header_ptr(&mut self) -> *mut c_void {
        ptr::from_mut(self.header.as_mut()).cast()
    }

    /// Read the array back after the callee had a chance to modify it.
    ///
    /// # Safety
    ///
    /// If the callee replaced `data`, the new block must hold `count` elements of the tag.
    pub unsafe fn read_back(&self, tag: VariantTag) -> Vec<Value> {
        let ours = self.data.bytes().as_ptr().cast::<c_void>().cast_mut();
        let count = if self.header.data == ours {
            self.header.count.min(self.capacity)
        } else {
            self.header.count
        };
        // SAFETY: forwarded from the caller.
        unsafe { read_elements(tag, self.header.data, count) }
    }
}

/// Decode `count` elements of `tag` starting at `data`.
///
/// # Safety
///
/// `data` must point to `count` readable elements, or be null with `count == 0`.
pub unsafe fn read_elements(tag: VariantTag, data: *const c_void, count: usize) -> Vec<Value> {
    if data.is_null() {
        return Vec::new();
    }
    let element_size = tag.element_size();
    // SAFETY: forwarded from the caller.
    let bytes = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), count * element_size) };
    let element_type = tag.element_type();

    bytes
        .chunks_exact(element_size)
        .map(|chunk| {
            let value = tag.repr().decode(chunk, &element_type);
            match (tag, value) {
                (VariantTag::BStr, Value::Pointer(ptr)) => {
                    // SAFETY: BSTR elements are valid strings or null.
                    let text = unsafe { read_native(StringKind::WideBStr, ptr, CodePage::host()) };
                    Value::String(Some(text.unwrap_or_default()))
                }
                (_, value) => value,
            }
        })
        .collect()
}

/// Read a tagged array returned by native code. Null reads as an empty array.
///
/// # Safety
///
/// A non-null `header` must point to a valid [`TaggedArray`] of elements tagged `tag`.
pub unsafe fn read_returned(tag: VariantTag, header: *const c_void) -> Vec<Value> {
    if header.is_null() {
        return Vec::new();
    }
    // SAFETY: forwarded from the caller.
    let header = unsafe { &*header.cast::<TaggedArray>() };
    // SAFETY: as above.
    unsafe { read_elements(tag, header.data, header.count) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut array =
            NativeTaggedArray::new(VariantTag::I4, &ArrayValue::I32(vec![1, -2, 3])).unwrap();
        let header = unsafe { &*array.header_ptr().cast::<TaggedArray>() };
        assert_eq!(header.vartype, 3);
        assert_eq!(header.element_size, 4);
        assert_eq!(header.count, 3);
        let values = unsafe { array.read_back(VariantTag::I4) };
        assert_eq!(values, vec![Value::I32(1), Value::I32(-2), Value::I32(3)]);
    }

    #[test]
    fn test_variant_bool_elements() {
        let mut array =
            NativeTaggedArray::new(VariantTag::Bool, &ArrayValue::Bool(vec![true, false]))
                .unwrap();
        let header = unsafe { &*array.header_ptr().cast::<TaggedArray>() };
        let raw = unsafe { std::slice::from_raw_parts(header.data.cast::<i16>(), 2) };
        assert_eq!(raw, &[-1, 0]);
    }

    #[test]
    fn test_callee_shrinks_count() {
        let mut array =
            NativeTaggedArray::new(VariantTag::R8, &ArrayValue::F64(vec![1.0, 2.0, 3.0]))
                .unwrap();
        unsafe { (*array.header_ptr().cast::<TaggedArray>()).count = 2 };
        assert_eq!(
            unsafe { array.read_back(VariantTag::R8) },
            vec![Value::F64(1.0), Value::F64(2.0)]
        );
    }

    #[test]
    fn test_bstr_elements() {
        let array = NativeTaggedArray::new(
            VariantTag::BStr,
            &ArrayValue::String(vec!["one".into(), "two".into()]),
        )
        .unwrap();
        assert_eq!(
            unsafe { array.read_back(VariantTag::BStr) },
            vec![Value::from("one"), Value::from("two")]
        );
    }
}
