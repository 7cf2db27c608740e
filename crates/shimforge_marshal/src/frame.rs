//! Argument layout and write-back for a single native call.

use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use shimforge_contract::{
    ArrayValue, CustomMarshaler, NativeType, ParamDirection, StructLayout, Value,
};
use shimforge_utils::{BindingError, Result};

use crate::buffer::AlignedBuf;
use crate::plan::{ArgKind, ArgPlan, ElementPlan, FunctionPlan, ReturnPlan};
use crate::repr::Repr;
use crate::strings::{CodePage, NativeString, read_native};
use crate::variant::{NativeTaggedArray, read_returned};

/// Storage for one call: argument slots, whatever they point to, and the return buffer.
///
/// Build it with [`CallFrame::new`], hand [`arg_pointers`](Self::arg_pointers) and
/// [`return_pointer`](Self::return_pointer) to `ffi_call`, then [`finish`](Self::finish).
pub struct CallFrame<'p> {
    plan: &'p FunctionPlan,
    cells: Vec<ArgCell>,
    arg_ptrs: Vec<*mut c_void>,
    ret: AlignedBuf,
}

struct ArgCell {
    /// Bytes libffi reads the argument from
    slot: AlignedBuf,
    /// Memory the slot points at, for pointer arguments
    data: Option<AlignedBuf>,
    strings: Vec<NativeString>,
    tagged: Option<NativeTaggedArray>,
    custom: Option<CustomCleanup>,
    /// Elements laid out for array arguments
    capacity: usize,
}

struct CustomCleanup {
    marshaler: Arc<dyn CustomMarshaler>,
    cookie: String,
    native: *mut c_void,
    /// Clean up whatever the slot holds after the call, not `native`
    by_ref: bool,
}

impl ArgCell {
    const fn new(slot: AlignedBuf) -> Self {
        Self {
            slot,
            data: None,
            strings: Vec::new(),
            tagged: None,
            custom: None,
            capacity: 0,
        }
    }

    fn pointing_to(mut data: AlignedBuf) -> Self {
        let mut cell = Self::new(AlignedBuf::pointer(data.as_mut_ptr().cast()));
        cell.data = Some(data);
        cell
    }

    fn data_bytes(&self) -> &[u8] {
        self.data.as_ref().map_or(&[], AlignedBuf::bytes)
    }

    fn data_pointer(&self) -> *mut c_void {
        self.data
            .as_ref()
            .map_or(ptr::null_mut(), AlignedBuf::read_pointer)
    }
}

impl Drop for ArgCell {
    fn drop(&mut self) {
        if let Some(custom) = self.custom.take() {
            let native = if custom.by_ref {
                self.data_pointer()
            } else {
                custom.native
            };
            if !native.is_null() {
                custom.marshaler.clean_up_native(native, &custom.cookie);
            }
        }
    }
}

impl<'p> CallFrame<'p> {
    /// Lay out `args` according to `plan`.
    pub fn new(plan: &'p FunctionPlan, args: &[Value]) -> Result<Self> {
        if args.len() != plan.params.len() {
            return Err(BindingError::invalid_call(
                &plan.name,
                format!(
                    "expected {} arguments, got {}",
                    plan.params.len(),
                    args.len()
                ),
            ));
        }

        let mut cells = Vec::with_capacity(args.len());
        for (param, value) in plan.params.iter().zip(args) {
            if !matches!(param.kind, ArgKind::Custom { .. }) && !value.conforms_to(&param.ty) {
                return Err(BindingError::invalid_call(
                    &plan.name,
                    format!(
                        "argument `{}` expects {}, got {}",
                        param.name,
                        param.ty,
                        value.type_name()
                    ),
                ));
            }
            cells.push(encode(plan, param, value)?);
        }

        let arg_ptrs = cells
            .iter_mut()
            .map(|cell| cell.slot.as_mut_ptr().cast())
            .collect();

        Ok(Self {
            plan,
            cells,
            arg_ptrs,
            ret: AlignedBuf::zeroed(plan.ret.buffer_size()),
        })
    }

    pub fn arg_pointers(&mut self) -> *mut *mut c_void {
        self.arg_ptrs.as_mut_ptr()
    }

    pub fn return_pointer(&mut self) -> *mut c_void {
        self.ret.as_mut_ptr().cast()
    }

    /// Copy `Out`/`InOut` results back into `args`, release temporaries and decode the return.
    pub fn finish(self, args: &mut [Value]) -> Result<Value> {
        for arrays in [false, true] {
            for (idx, param) in self.plan.params.iter().enumerate() {
                if param.is_array() != arrays || !param.direction.is_by_ref() {
                    continue;
                }
                let value = self.read_back(idx, param, args)?;
                args[idx] = value;
            }
        }
        self.decode_return()
    }

    fn marshal_error(&self, reason: impl Into<String>) -> BindingError {
        BindingError::marshal(&self.plan.name, reason)
    }

    fn read_back(&self, idx: usize, param: &ArgPlan, args: &[Value]) -> Result<Value> {
        let cell = &self.cells[idx];
        let code_page = self.plan.ansi.code_page;

        match &param.kind {
            ArgKind::Scalar(repr) => Ok(repr.decode(cell.data_bytes(), &param.ty)),
            ArgKind::String {
                kind,
                capacity: Some(_),
            } => Ok(Value::String(
                cell.strings.first().map(|native| native.read(*kind, code_page)),
            )),
            ArgKind::String {
                kind,
                capacity: None,
            } => {
                // SAFETY: the callee leaves a valid string or null in the slot.
                let text = unsafe { read_native(*kind, cell.data_pointer(), code_page) };
                Ok(Value::String(text))
            }
            ArgKind::Array {
                element,
                size_param_index,
                size_const,
            } => {
                // An `In` count only bounds what the callee touches; the caller keeps the rest.
                let out = param.direction == ParamDirection::Out;
                let reported = size_param_index
                    .filter(|&size_idx| out || self.plan.params[size_idx].direction.is_by_ref())
                    .and_then(|size_idx| element_count(&args[size_idx]));
                let count = match reported {
                    Some(count) => count,
                    None if out => size_const.unwrap_or(cell.capacity),
                    None => cell.capacity,
                }
                .min(cell.capacity);
                self.read_elements(param, *element, cell.data_bytes(), count)
            }
            ArgKind::FixedArray { element, size } => {
                self.read_elements(param, *element, cell.data_bytes(), *size)
            }
            ArgKind::Struct { layout, .. } => Ok(decode_struct(layout, cell.data_bytes())),
            ArgKind::Tagged(tag) => {
                let Some(tagged) = &cell.tagged else {
                    return Err(self.marshal_error("tagged array storage missing"));
                };
                // SAFETY: a callee that swaps the data block must keep `count` consistent.
                let values = unsafe { tagged.read_back(*tag) };
                self.rebuild_array(param, &tag.element_type(), values)
            }
            ArgKind::Custom { marshaler, cookie } => marshaler
                .to_managed(cell.data_pointer(), cookie)
                .map_err(|err| self.marshal_error(format!("{}: {err:#}", marshaler.name()))),
        }
    }

    fn read_elements(
        &self,
        param: &ArgPlan,
        element: ElementPlan,
        bytes: &[u8],
        count: usize,
    ) -> Result<Value> {
        let NativeType::Array(element_type) = &param.ty else {
            return Err(self.marshal_error(format!("`{}` is not an array", param.name)));
        };
        let size = element.size();
        let values = bytes
            .chunks_exact(size)
            .take(count)
            .map(|chunk| match element {
                ElementPlan::Scalar(repr) => repr.decode(chunk, element_type),
                ElementPlan::String(kind) => {
                    let ptr = Repr::Pointer.decode(chunk, &NativeType::Pointer);
                    let Value::Pointer(ptr) = ptr else {
                        return Value::String(None);
                    };
                    // SAFETY: string tables hold valid strings or null.
                    Value::String(unsafe { read_native(kind, ptr, self.plan.ansi.code_page) })
                }
            })
            .collect();
        self.rebuild_array(param, element_type, values)
    }

    fn rebuild_array(
        &self,
        param: &ArgPlan,
        element: &NativeType,
        values: Vec<Value>,
    ) -> Result<Value> {
        ArrayValue::from_values(element, values)
            .map(Value::Array)
            .ok_or_else(|| self.marshal_error(format!("`{}` came back malformed", param.name)))
    }

    fn decode_return(&self) -> Result<Value> {
        let ret = self.ret.bytes();
        let returned = self.ret.read_pointer();
        let code_page: CodePage = self.plan.ansi.code_page;

        match &self.plan.ret {
            ReturnPlan::Void => Ok(Value::Void),
            ReturnPlan::Scalar(repr) => Ok(repr.decode_return(ret, &self.plan.returns)),
            ReturnPlan::String(kind) => {
                // SAFETY: the callee returned a valid string or null.
                Ok(Value::String(unsafe { read_native(*kind, returned, code_page) }))
            }
            ReturnPlan::Struct {
                layout,
                by_ref: false,
            } => Ok(decode_struct(layout, ret)),
            ReturnPlan::Struct {
                layout,
                by_ref: true,
            } => {
                if returned.is_null() {
                    return Err(self.marshal_error("returned a null struct pointer"));
                }
                // SAFETY: the callee returned a pointer to a struct of this layout.
                let bytes =
                    unsafe { std::slice::from_raw_parts(returned.cast::<u8>(), layout.size()) };
                Ok(decode_struct(layout, bytes))
            }
            ReturnPlan::Tagged(tag) => {
                // SAFETY: the callee returned a valid header or null.
                let values = unsafe { read_returned(*tag, returned) };
                ArrayValue::from_values(&tag.element_type(), values)
                    .map(Value::Array)
                    .ok_or_else(|| self.marshal_error("returned tagged array is malformed"))
            }
            ReturnPlan::Custom { marshaler, cookie } => marshaler
                .to_managed(returned, cookie)
                .map_err(|err| self.marshal_error(format!("{}: {err:#}", marshaler.name()))),
        }
    }
}

fn encode(plan: &FunctionPlan, param: &ArgPlan, value: &Value) -> Result<ArgCell> {
    let member = plan.name.as_str();
    let by_ref = param.direction.is_by_ref();
    let copy_in = param.direction != ParamDirection::Out;
    let marshal_error = |reason: String| {
        BindingError::marshal(member, format!("argument `{}`: {reason}", param.name))
    };

    match &param.kind {
        ArgKind::Scalar(repr) => {
            let mut data = AlignedBuf::zeroed(repr.size());
            if copy_in {
                repr.encode(value, data.bytes_mut()).map_err(marshal_error)?;
            }
            Ok(if by_ref {
                ArgCell::pointing_to(data)
            } else {
                ArgCell::new(data)
            })
        }
        ArgKind::String { kind, capacity } => {
            let text = match value {
                Value::String(text) if copy_in => text.as_deref(),
                _ => None,
            };

            if let Some(capacity) = capacity {
                let mut native =
                    NativeString::fixed(*kind, text.unwrap_or_default(), *capacity, &plan.ansi)
                        .map_err(|err| marshal_error(err.to_string()))?;
                let mut cell = ArgCell::new(AlignedBuf::pointer(native.as_mut_ptr()));
                cell.strings.push(native);
                return Ok(cell);
            }

            let mut strings = Vec::new();
            let ptr = match text {
                Some(text) => {
                    let mut native = NativeString::new(*kind, text, &plan.ansi)
                        .map_err(|err| marshal_error(err.to_string()))?;
                    let ptr = native.as_mut_ptr();
                    strings.push(native);
                    ptr
                }
                None => ptr::null_mut(),
            };
            let mut cell = if by_ref {
                ArgCell::pointing_to(AlignedBuf::pointer(ptr))
            } else {
                ArgCell::new(AlignedBuf::pointer(ptr))
            };
            cell.strings = strings;
            Ok(cell)
        }
        ArgKind::Array {
            element,
            size_const,
            ..
        } => {
            let values = array_values(value);
            let capacity = values.len().max(size_const.unwrap_or(0));
            lay_out_elements(plan, *element, &values, capacity).map_err(marshal_error)
        }
        ArgKind::FixedArray { element, size } => {
            let values = array_values(value);
            if values.len() > *size {
                return Err(BindingError::invalid_call(
                    member,
                    format!(
                        "argument `{}` holds {} elements but the native array fits {size}",
                        param.name,
                        values.len()
                    ),
                ));
            }
            lay_out_elements(plan, *element, &values, *size).map_err(marshal_error)
        }
        ArgKind::Struct {
            layout,
            by_ref: pointer,
        } => {
            let mut data = AlignedBuf::zeroed(layout.size());
            if copy_in && let Value::Struct(fields) = value {
                encode_struct(layout, fields, data.bytes_mut()).map_err(marshal_error)?;
            }
            Ok(if *pointer || by_ref {
                ArgCell::pointing_to(data)
            } else {
                ArgCell::new(data)
            })
        }
        ArgKind::Tagged(tag) => {
            let Value::Array(array) = value else {
                return Err(marshal_error(format!("expected array, got {}", value.type_name())));
            };
            let mut tagged = NativeTaggedArray::new(*tag, array).map_err(marshal_error)?;
            let mut cell = ArgCell::new(AlignedBuf::pointer(tagged.header_ptr()));
            cell.capacity = array.len();
            cell.tagged = Some(tagged);
            Ok(cell)
        }
        ArgKind::Custom { marshaler, cookie } => {
            let native = if copy_in {
                marshaler
                    .to_native(value, cookie)
                    .map_err(|err| marshal_error(format!("{}: {err:#}", marshaler.name())))?
            } else {
                ptr::null_mut()
            };
            let mut cell = if by_ref {
                ArgCell::pointing_to(AlignedBuf::pointer(native))
            } else {
                ArgCell::new(AlignedBuf::pointer(native))
            };
            cell.custom = Some(CustomCleanup {
                marshaler: Arc::clone(marshaler),
                cookie: cookie.clone(),
                native,
                by_ref,
            });
            Ok(cell)
        }
    }
}

fn array_values(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(array) => array.to_values(),
        _ => Vec::new(),
    }
}

/// Contiguous element buffer with room for `capacity` elements, the first `values.len()` set.
fn lay_out_elements(
    plan: &FunctionPlan,
    element: ElementPlan,
    values: &[Value],
    capacity: usize,
) -> std::result::Result<ArgCell, String> {
    let size = element.size();
    let mut data = AlignedBuf::zeroed(capacity * size);
    let mut strings = Vec::new();

    for (idx, value) in values.iter().enumerate() {
        let slot = &mut data.bytes_mut()[idx * size..(idx + 1) * size];
        match element {
            ElementPlan::Scalar(repr) => repr.encode(value, slot)?,
            ElementPlan::String(kind) => {
                let ptr = match value {
                    Value::String(Some(text)) => {
                        let mut native = NativeString::new(kind, text, &plan.ansi)
                            .map_err(|err| format!("element {idx}: {err}"))?;
                        let ptr = native.as_mut_ptr();
                        strings.push(native);
                        ptr
                    }
                    _ => ptr::null_mut(),
                };
                slot.copy_from_slice(&(ptr as usize).to_ne_bytes());
            }
        }
    }

    let mut cell = ArgCell::pointing_to(data);
    cell.strings = strings;
    cell.capacity = capacity;
    Ok(cell)
}

fn encode_struct(
    layout: &StructLayout,
    fields: &[Value],
    dst: &mut [u8],
) -> std::result::Result<(), String> {
    for ((field, offset), value) in layout.fields().iter().zip(layout.offsets()).zip(fields) {
        let repr = Repr::natural(field, Repr::Bool8)
            .ok_or_else(|| format!("struct field of type {field} has no native form"))?;
        repr.encode(value, &mut dst[offset..])?;
    }
    Ok(())
}

fn decode_struct(layout: &StructLayout, src: &[u8]) -> Value {
    Value::Struct(
        layout
            .fields()
            .iter()
            .zip(layout.offsets())
            .map(|(field, offset)| {
                Repr::natural(field, Repr::Bool8)
                    .map_or(Value::Void, |repr| repr.decode(&src[offset..], field))
            })
            .collect(),
    )
}

/// Element count carried by a size parameter; negative counts read as zero.
fn element_count(value: &Value) -> Option<usize> {
    match *value {
        Value::I8(n) => usize::try_from(n).ok().or(Some(0)),
        Value::I16(n) => usize::try_from(n).ok().or(Some(0)),
        Value::I32(n) => usize::try_from(n).ok().or(Some(0)),
        Value::I64(n) => usize::try_from(n).ok().or(Some(0)),
        Value::ISize(n) => usize::try_from(n).ok().or(Some(0)),
        Value::U8(n) => Some(usize::from(n)),
        Value::U16(n) => Some(usize::from(n)),
        Value::U32(n) => usize::try_from(n).ok(),
        Value::U64(n) => usize::try_from(n).ok(),
        Value::USize(n) => Some(n),
        _ => None,
    }
}
