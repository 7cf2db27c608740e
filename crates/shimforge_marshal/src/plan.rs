//! Per-member marshaling plans, checked once at synthesis.

use std::fmt;
use std::mem::size_of;
use std::sync::Arc;

use libffi::middle::Type;
use shimforge_contract::{
    CharSet, CustomMarshaler, FunctionMember, ImportSpec, MarshalDirective, NativeType, Param,
    ParamDirection, StructLayout,
};
use shimforge_utils::{BindingError, Result};
use tracing::debug;

use crate::repr::Repr;
use crate::strings::{AnsiPolicy, StringKind};
use crate::translator::{NativeDescriptor, NativeTag, VariantTag, translate};

/// String policy of one import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarshalPolicy {
    pub char_set: CharSet,
    pub ansi: AnsiPolicy,
}

impl MarshalPolicy {
    pub const fn from_import(import: &ImportSpec) -> Self {
        Self {
            char_set: import.char_set,
            ansi: AnsiPolicy::new(import.best_fit_mapping, import.throw_on_unmappable_char),
        }
    }
}

impl Default for MarshalPolicy {
    fn default() -> Self {
        Self::from_import(&ImportSpec::default())
    }
}

/// Which conversions a plan may use.
#[derive(Debug, Clone, Copy)]
pub enum PlanMode {
    /// Values that already have a native layout; no directives.
    Direct,
    /// Full directive set under the given string policy.
    Declared(MarshalPolicy),
}

/// Layout of one array element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementPlan {
    Scalar(Repr),
    /// Element is a pointer to a string of this layout
    String(StringKind),
}

impl ElementPlan {
    pub const fn size(self) -> usize {
        match self {
            Self::Scalar(repr) => repr.size(),
            Self::String(_) => size_of::<usize>(),
        }
    }
}

#[derive(Clone)]
pub enum ArgKind {
    Scalar(Repr),
    /// `capacity` is set for inline fixed-size strings
    String {
        kind: StringKind,
        capacity: Option<usize>,
    },
    Array {
        element: ElementPlan,
        size_param_index: Option<usize>,
        size_const: Option<usize>,
    },
    FixedArray {
        element: ElementPlan,
        size: usize,
    },
    Struct {
        layout: StructLayout,
        by_ref: bool,
    },
    Tagged(VariantTag),
    Custom {
        marshaler: Arc<dyn CustomMarshaler>,
        cookie: String,
    },
}

impl fmt::Debug for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(repr) => f.debug_tuple("Scalar").field(repr).finish(),
            Self::String { kind, capacity } => f
                .debug_struct("String")
                .field("kind", kind)
                .field("capacity", capacity)
                .finish(),
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
            Self::FixedArray { element, size } => f
                .debug_struct("FixedArray")
                .field("element", element)
                .field("size", size)
                .finish(),
            Self::Struct { layout, by_ref } => f
                .debug_struct("Struct")
                .field("layout", layout)
                .field("by_ref", by_ref)
                .finish(),
            Self::Tagged(tag) => f.debug_tuple("Tagged").field(tag).finish(),
            Self::Custom { marshaler, cookie } => f
                .debug_struct("Custom")
                .field("marshaler", &marshaler.name())
                .field("cookie", cookie)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArgPlan {
    pub name: String,
    pub ty: NativeType,
    pub direction: ParamDirection,
    pub kind: ArgKind,
}

impl ArgPlan {
    /// Whether libffi receives the value itself rather than a pointer to it.
    pub const fn by_value(&self) -> bool {
        !self.direction.is_by_ref()
            && matches!(
                self.kind,
                ArgKind::Scalar(_) | ArgKind::Struct { by_ref: false, .. }
            )
    }

    /// Arrays are written back after everything else so their size parameters are final.
    pub const fn is_array(&self) -> bool {
        matches!(
            self.kind,
            ArgKind::Array { .. } | ArgKind::FixedArray { .. } | ArgKind::Tagged(_)
        )
    }

    pub fn ffi_type(&self) -> Type {
        if !self.by_value() {
            return Type::pointer();
        }
        match &self.kind {
            ArgKind::Scalar(repr) => repr.ffi_type(),
            ArgKind::Struct { layout, .. } => struct_type(layout),
            _ => Type::pointer(),
        }
    }
}

#[derive(Clone)]
pub enum ReturnPlan {
    Void,
    Scalar(Repr),
    String(StringKind),
    Struct {
        layout: StructLayout,
        by_ref: bool,
    },
    Tagged(VariantTag),
    Custom {
        marshaler: Arc<dyn CustomMarshaler>,
        cookie: String,
    },
}

impl fmt::Debug for ReturnPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("Void"),
            Self::Scalar(repr) => f.debug_tuple("Scalar").field(repr).finish(),
            Self::String(kind) => f.debug_tuple("String").field(kind).finish(),
            Self::Struct { layout, by_ref } => f
                .debug_struct("Struct")
                .field("layout", layout)
                .field("by_ref", by_ref)
                .finish(),
            Self::Tagged(tag) => f.debug_tuple("Tagged").field(tag).finish(),
            Self::Custom { marshaler, cookie } => f
                .debug_struct("Custom")
                .field("marshaler", &marshaler.name())
                .field("cookie", cookie)
                .finish(),
        }
    }
}

impl ReturnPlan {
    pub fn ffi_type(&self) -> Type {
        match self {
            Self::Void => Type::void(),
            Self::Scalar(repr) => repr.ffi_type(),
            Self::Struct {
                layout,
                by_ref: false,
            } => struct_type(layout),
            _ => Type::pointer(),
        }
    }

    /// Bytes libffi may write for this return, never less than one register.
    pub fn buffer_size(&self) -> usize {
        let size = match self {
            Self::Struct {
                layout,
                by_ref: false,
            } => layout.size(),
            _ => 0,
        };
        size.max(size_of::<u64>())
    }
}

/// Everything a call site needs to marshal one function member.
#[derive(Debug, Clone)]
pub struct FunctionPlan {
    pub name: String,
    pub params: Vec<ArgPlan>,
    pub returns: NativeType,
    pub ret: ReturnPlan,
    pub ansi: AnsiPolicy,
}

impl FunctionPlan {
    pub fn arg_types(&self) -> Vec<Type> {
        self.params.iter().map(ArgPlan::ffi_type).collect()
    }

    pub fn ret_type(&self) -> Type {
        self.ret.ffi_type()
    }
}

/// libffi description of a C struct with scalar fields.
pub fn struct_type(layout: &StructLayout) -> Type {
    Type::structure(
        layout
            .fields()
            .iter()
            .map(|field| {
                Repr::natural(field, Repr::Bool8).map_or_else(Type::pointer, Repr::ffi_type)
            })
            .collect::<Vec<_>>(),
    )
}

/// Plan `function` of `contract`, rejecting every type and directive combination that cannot
/// be marshaled.
pub fn plan_function(
    contract: &str,
    function: &FunctionMember,
    mode: &PlanMode,
) -> Result<FunctionPlan> {
    let planner = Planner {
        contract,
        member: &function.name,
        mode: *mode,
    };

    let params = function
        .params
        .iter()
        .map(|param| planner.param(param))
        .collect::<Result<Vec<_>>>()?;
    planner.check_size_params(&params)?;

    let ret = planner.ret(&function.returns, function.return_marshal.as_ref())?;
    let ansi = match mode {
        PlanMode::Direct => AnsiPolicy::default(),
        PlanMode::Declared(policy) => policy.ansi,
    };

    debug!(
        contract,
        member = %function.name,
        params = params.len(),
        ret = ?ret,
        "planned member"
    );

    Ok(FunctionPlan {
        name: function.name.clone(),
        params,
        returns: function.returns.clone(),
        ret,
        ansi,
    })
}

struct Planner<'a> {
    contract: &'a str,
    member: &'a str,
    mode: PlanMode,
}

impl Planner<'_> {
    fn error(&self, reason: impl fmt::Display) -> BindingError {
        BindingError::contract(self.contract, format!("`{}`: {reason}", self.member))
    }

    fn descriptor(&self, directive: &MarshalDirective) -> Result<NativeDescriptor> {
        translate(directive).map_err(|err| err.into_binding_error(self.contract, self.member))
    }

    fn param(&self, param: &Param) -> Result<ArgPlan> {
        let slot = &param.name;
        let kind = match self.mode {
            PlanMode::Direct => self.direct(slot, &param.ty, param.marshal.as_ref())?,
            PlanMode::Declared(policy) => match &param.marshal {
                Some(directive) => self.directed(slot, &param.ty, directive, policy)?,
                None => self.default(slot, &param.ty, policy)?,
            },
        };

        Ok(ArgPlan {
            name: param.name.clone(),
            ty: param.ty.clone(),
            direction: param.direction,
            kind,
        })
    }

    fn direct(
        &self,
        slot: &str,
        ty: &NativeType,
        directive: Option<&MarshalDirective>,
    ) -> Result<ArgKind> {
        if directive.is_some() {
            return Err(self.error(format!(
                "`{slot}` carries a marshal directive; direct bindings only pass native values"
            )));
        }
        match ty {
            NativeType::Struct(layout) => Ok(ArgKind::Struct {
                layout: layout.clone(),
                by_ref: false,
            }),
            _ => Repr::natural(ty, Repr::Bool8)
                .map(ArgKind::Scalar)
                .ok_or_else(|| {
                    self.error(format!(
                        "`{slot}` of type {ty} needs marshaling; use a declared binding"
                    ))
                }),
        }
    }

    fn default(&self, slot: &str, ty: &NativeType, policy: MarshalPolicy) -> Result<ArgKind> {
        match ty {
            NativeType::String => Ok(ArgKind::String {
                kind: StringKind::for_char_set(policy.char_set),
                capacity: None,
            }),
            NativeType::Array(element) => Ok(ArgKind::Array {
                element: self.default_element(slot, element, policy)?,
                size_param_index: None,
                size_const: None,
            }),
            NativeType::Struct(layout) => Ok(ArgKind::Struct {
                layout: layout.clone(),
                by_ref: false,
            }),
            _ => Repr::natural(ty, Repr::Bool32)
                .map(ArgKind::Scalar)
                .ok_or_else(|| self.error(format!("`{slot}` has no native form for {ty}"))),
        }
    }

    fn default_element(
        &self,
        slot: &str,
        element: &NativeType,
        policy: MarshalPolicy,
    ) -> Result<ElementPlan> {
        if *element == NativeType::String {
            return Ok(ElementPlan::String(StringKind::for_char_set(policy.char_set)));
        }
        Repr::natural(element, Repr::Bool32)
            .map(ElementPlan::Scalar)
            .ok_or_else(|| self.error(format!("`{slot}` has unsupported element type {element}")))
    }

    fn element_from_tag(
        &self,
        slot: &str,
        tag: NativeTag,
        element: &NativeType,
    ) -> Result<ElementPlan> {
        if tag.is_string() && tag != NativeTag::ByValStr && *element == NativeType::String {
            return Ok(ElementPlan::String(string_kind(tag, CharSet::Ansi)));
        }
        Repr::from_tag(tag)
            .filter(|repr| repr.accepts(element))
            .map(ElementPlan::Scalar)
            .ok_or_else(|| self.error(format!("`{slot}`: {tag:?} cannot carry {element} elements")))
    }

    fn array_element<'t>(&self, slot: &str, ty: &'t NativeType) -> Result<&'t NativeType> {
        match ty {
            NativeType::Array(element) => Ok(element),
            other => Err(self.error(format!("`{slot}`: array directive on {other}"))),
        }
    }

    fn directed(
        &self,
        slot: &str,
        ty: &NativeType,
        directive: &MarshalDirective,
        policy: MarshalPolicy,
    ) -> Result<ArgKind> {
        match self.descriptor(directive)? {
            NativeDescriptor::Scalar(tag) if tag.is_string() => {
                if *ty != NativeType::String {
                    return Err(self.error(format!("`{slot}`: {tag:?} applied to {ty}")));
                }
                let capacity = if tag == NativeTag::ByValStr {
                    Some(directive.size_const.ok_or_else(|| {
                        self.error(format!("`{slot}`: fixed string needs a size_const"))
                    })?)
                } else {
                    None
                };
                Ok(ArgKind::String {
                    kind: string_kind(tag, policy.char_set),
                    capacity,
                })
            }
            NativeDescriptor::Scalar(tag) if tag.is_struct() => match ty {
                NativeType::Struct(layout) => Ok(ArgKind::Struct {
                    layout: layout.clone(),
                    by_ref: tag == NativeTag::LpStruct,
                }),
                other => Err(self.error(format!("`{slot}`: {tag:?} applied to {other}"))),
            },
            NativeDescriptor::Scalar(tag) => Repr::from_tag(tag)
                .filter(|repr| repr.accepts(ty))
                .map(ArgKind::Scalar)
                .ok_or_else(|| self.error(format!("`{slot}`: {tag:?} cannot carry {ty}"))),
            NativeDescriptor::Array {
                element,
                size_param_index,
                size_const,
            } => {
                let element_type = self.array_element(slot, ty)?;
                let element = match element {
                    Some(tag) => self.element_from_tag(slot, tag, element_type)?,
                    None => self.default_element(slot, element_type, policy)?,
                };
                Ok(ArgKind::Array {
                    element,
                    size_param_index,
                    size_const,
                })
            }
            NativeDescriptor::FixedArray { size, element } => {
                let element_type = self.array_element(slot, ty)?;
                Ok(ArgKind::FixedArray {
                    element: self.element_from_tag(slot, element, element_type)?,
                    size,
                })
            }
            NativeDescriptor::TaggedArray { element } => {
                let element_type = self.array_element(slot, ty)?;
                if *element_type != element.element_type() {
                    return Err(self.error(format!(
                        "`{slot}`: {} arrays hold {} elements, not {element_type}",
                        element.kind(),
                        element.element_type()
                    )));
                }
                Ok(ArgKind::Tagged(element))
            }
            NativeDescriptor::Custom { cookie, marshaler } => {
                Ok(ArgKind::Custom { marshaler, cookie })
            }
        }
    }

    fn check_size_params(&self, params: &[ArgPlan]) -> Result<()> {
        for (idx, param) in params.iter().enumerate() {
            let ArgKind::Array {
                size_param_index: Some(size_idx),
                ..
            } = param.kind
            else {
                continue;
            };
            let Some(size_param) = params.get(size_idx).filter(|_| size_idx != idx) else {
                return Err(self.error(format!(
                    "`{}`: size_param_index {size_idx} does not name another parameter",
                    param.name
                )));
            };
            if !size_param.ty.is_integer() {
                return Err(self.error(format!(
                    "`{}`: size parameter `{}` is {}, not an integer",
                    param.name, size_param.name, size_param.ty
                )));
            }
        }
        Ok(())
    }

    fn ret(&self, ty: &NativeType, directive: Option<&MarshalDirective>) -> Result<ReturnPlan> {
        if *ty == NativeType::Void {
            return match directive {
                Some(_) => Err(self.error("void return carries a marshal directive")),
                None => Ok(ReturnPlan::Void),
            };
        }

        let policy = match self.mode {
            PlanMode::Direct => {
                return match self.direct("<return>", ty, directive)? {
                    ArgKind::Scalar(repr) => Ok(ReturnPlan::Scalar(repr)),
                    ArgKind::Struct { layout, by_ref } => Ok(ReturnPlan::Struct { layout, by_ref }),
                    _ => Err(self.error("unsupported return")),
                };
            }
            PlanMode::Declared(policy) => policy,
        };

        let kind = match directive {
            Some(directive) => self.directed("<return>", ty, directive, policy)?,
            None => self.default("<return>", ty, policy)?,
        };
        match kind {
            ArgKind::Scalar(repr) => Ok(ReturnPlan::Scalar(repr)),
            ArgKind::String {
                kind,
                capacity: None,
            } => Ok(ReturnPlan::String(kind)),
            ArgKind::Struct { layout, by_ref } => Ok(ReturnPlan::Struct { layout, by_ref }),
            ArgKind::Tagged(tag) => Ok(ReturnPlan::Tagged(tag)),
            ArgKind::Custom { marshaler, cookie } => Ok(ReturnPlan::Custom { marshaler, cookie }),
            ArgKind::String {
                capacity: Some(_), ..
            } => Err(self.error("fixed strings cannot be returned")),
            ArgKind::Array { .. } | ArgKind::FixedArray { .. } => {
                Err(self.error("arrays without a tag cannot be returned"))
            }
        }
    }
}

/// String layout requested by a string tag.
const fn string_kind(tag: NativeTag, char_set: CharSet) -> StringKind {
    match tag {
        NativeTag::LpWStr => StringKind::Wide,
        NativeTag::LpTStr => StringKind::platform(),
        NativeTag::BStr => StringKind::WideBStr,
        NativeTag::AnsiBStr => StringKind::AnsiBStr,
        NativeTag::TBStr => StringKind::platform_bstr(),
        NativeTag::ByValStr => StringKind::for_char_set(char_set),
        _ => StringKind::Ansi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shimforge_contract::{UnmanagedKind, VariantKind};

    fn declared() -> PlanMode {
        PlanMode::Declared(MarshalPolicy::default())
    }

    fn plan(function: &FunctionMember, mode: &PlanMode) -> Result<FunctionPlan> {
        plan_function("Test", function, mode)
    }

    fn reason(err: BindingError) -> String {
        match err {
            BindingError::ContractDefinition { reason, .. } => reason,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_direct_scalars() {
        let function = FunctionMember::new("f")
            .param(Param::new("flag", NativeType::Bool))
            .param(Param::out("out", NativeType::I32))
            .returns(NativeType::F64);
        let plan = plan(&function, &PlanMode::Direct).unwrap();
        assert!(matches!(plan.params[0].kind, ArgKind::Scalar(Repr::Bool8)));
        assert!(plan.params[0].by_value());
        assert!(!plan.params[1].by_value());
        assert!(matches!(plan.ret, ReturnPlan::Scalar(Repr::F64)));
    }

    #[test]
    fn test_direct_rejects_marshaling() {
        let strings = FunctionMember::new("strlen").param(Param::new("s", NativeType::String));
        let err = plan(&strings, &PlanMode::Direct).unwrap_err();
        assert!(reason(err).contains("needs marshaling"));

        let directed = FunctionMember::new("f")
            .param(Param::new("b", NativeType::Bool).marshal(UnmanagedKind::VariantBool));
        let err = plan(&directed, &PlanMode::Direct).unwrap_err();
        assert!(reason(err).contains("marshal directive"));
    }

    #[test]
    fn test_declared_defaults() {
        let function = FunctionMember::new("f")
            .param(Param::new("flag", NativeType::Bool))
            .param(Param::new("name", NativeType::String))
            .param(Param::new("xs", NativeType::array_of(NativeType::F32)));
        let plan = plan(&function, &declared()).unwrap();
        assert!(matches!(plan.params[0].kind, ArgKind::Scalar(Repr::Bool32)));
        assert!(matches!(
            plan.params[1].kind,
            ArgKind::String {
                kind: StringKind::Ansi,
                capacity: None
            }
        ));
        assert!(matches!(
            plan.params[2].kind,
            ArgKind::Array {
                element: ElementPlan::Scalar(Repr::F32),
                ..
            }
        ));
    }

    #[test]
    fn test_unicode_char_set() {
        let mode = PlanMode::Declared(MarshalPolicy::from_import(
            &ImportSpec::new().char_set(CharSet::Unicode),
        ));
        let function = FunctionMember::new("f").param(Param::new("s", NativeType::String));
        let plan = plan(&function, &mode).unwrap();
        assert!(matches!(
            plan.params[0].kind,
            ArgKind::String {
                kind: StringKind::Wide,
                ..
            }
        ));
    }

    #[test]
    fn test_type_directive_mismatch() {
        let function = FunctionMember::new("f")
            .param(Param::new("n", NativeType::I64).marshal(UnmanagedKind::I4));
        assert!(reason(plan(&function, &declared()).unwrap_err()).contains("I4 cannot carry i64"));

        let function = FunctionMember::new("f")
            .param(Param::new("n", NativeType::I32).marshal(UnmanagedKind::LpWStr));
        let err = plan(&function, &declared()).unwrap_err();
        assert!(reason(err).contains("LpWStr applied to i32"));
    }

    #[test]
    fn test_unsupported_kind_surfaces() {
        let function = FunctionMember::new("f")
            .param(Param::new("p", NativeType::Pointer).marshal(UnmanagedKind::IUnknown));
        assert!(matches!(
            plan(&function, &declared()),
            Err(BindingError::UnsupportedMarshalKind { .. })
        ));
    }

    #[test]
    fn test_size_param_checks() {
        let bytes = || NativeType::array_of(NativeType::U8);
        let ok = FunctionMember::new("fill")
            .param(Param::in_out("buf", bytes()).marshal(MarshalDirective::array(1)))
            .param(Param::new("len", NativeType::USize));
        plan(&ok, &declared()).unwrap();

        let self_ref = FunctionMember::new("fill")
            .param(Param::new("buf", bytes()).marshal(MarshalDirective::array(0)));
        assert!(reason(plan(&self_ref, &declared()).unwrap_err()).contains("does not name"));

        let not_int = FunctionMember::new("fill")
            .param(Param::new("buf", bytes()).marshal(MarshalDirective::array(1)))
            .param(Param::new("len", NativeType::F32));
        assert!(reason(plan(&not_int, &declared()).unwrap_err()).contains("not an integer"));
    }

    #[test]
    fn test_tagged_array_element_check() {
        let ok = FunctionMember::new("f").param(
            Param::new("xs", NativeType::array_of(NativeType::F64))
                .marshal(MarshalDirective::safe_array(VariantKind::Date)),
        );
        assert!(matches!(
            plan(&ok, &declared()).unwrap().params[0].kind,
            ArgKind::Tagged(VariantTag::Date)
        ));

        let wrong = FunctionMember::new("f").param(
            Param::new("xs", NativeType::array_of(NativeType::I64))
                .marshal(MarshalDirective::safe_array(VariantKind::I4)),
        );
        assert!(reason(plan(&wrong, &declared()).unwrap_err()).contains("VT_I4 arrays hold i32"));
    }

    #[test]
    fn test_fixed_string_needs_size() {
        let function = FunctionMember::new("f")
            .param(Param::new("s", NativeType::String).marshal(UnmanagedKind::FixedString));
        assert!(reason(plan(&function, &declared()).unwrap_err()).contains("size_const"));

        let function = FunctionMember::new("f").param(
            Param::out("s", NativeType::String)
                .marshal(MarshalDirective::new(UnmanagedKind::FixedString).with_size_const(32)),
        );
        assert!(matches!(
            plan(&function, &declared()).unwrap().params[0].kind,
            ArgKind::String {
                capacity: Some(32),
                ..
            }
        ));
    }

    #[test]
    fn test_returns() {
        let string = FunctionMember::new("getenv")
            .param(Param::new("name", NativeType::String))
            .returns(NativeType::String);
        assert!(matches!(
            plan(&string, &declared()).unwrap().ret,
            ReturnPlan::String(StringKind::Ansi)
        ));

        let void_directive = FunctionMember::new("f").return_marshal(UnmanagedKind::I4);
        assert!(reason(plan(&void_directive, &declared()).unwrap_err()).contains("void return"));

        let fixed = FunctionMember::new("f")
            .returns(NativeType::array_of(NativeType::I32))
            .return_marshal(MarshalDirective::fixed_array(4, UnmanagedKind::I4));
        assert!(reason(plan(&fixed, &declared()).unwrap_err()).contains("cannot be returned"));
    }

    #[test]
    fn test_struct_abi() {
        let layout = StructLayout::new(vec![NativeType::I32, NativeType::F64]);
        let function = FunctionMember::new("f")
            .param(Param::new("by_value", NativeType::Struct(layout.clone())))
            .param(
                Param::new("by_pointer", NativeType::Struct(layout.clone()))
                    .marshal(UnmanagedKind::LpStruct),
            )
            .returns(NativeType::Struct(layout.clone()));
        let plan = plan(&function, &declared()).unwrap();
        assert!(plan.params[0].by_value());
        assert!(!plan.params[1].by_value());
        assert_eq!(plan.ret.buffer_size(), layout.size());
        assert_eq!(plan.arg_types().len(), 2);
    }
}
