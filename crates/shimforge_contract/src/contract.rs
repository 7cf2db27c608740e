//! Contract tables: one library, many members.

use std::collections::HashSet;

use shimforge_utils::{BindingError, Result};

use crate::import::ImportSpec;
use crate::marshal::{MarshalDirective, UnmanagedKind};
use crate::types::{NativeType, ParamDirection};
use crate::version::LibraryVersion;

/// A native library and the members bound to its exports.
#[derive(Debug, Clone)]
pub struct LibraryContract {
    name: String,
    library_name: String,
    version: Option<LibraryVersion>,
    members: Vec<Member>,
}

/// One exported symbol.
#[derive(Debug, Clone)]
pub enum Member {
    Function(FunctionMember),
    Global(GlobalMember),
}

#[derive(Debug, Clone)]
pub struct FunctionMember {
    pub name: String,
    pub import: Option<ImportSpec>,
    pub params: Vec<Param>,
    pub returns: NativeType,
    pub return_marshal: Option<MarshalDirective>,
    /// Native variable-argument functions cannot be bound.
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: NativeType,
    pub direction: ParamDirection,
    pub marshal: Option<MarshalDirective>,
}

/// A property exposing a native global variable.
#[derive(Debug, Clone)]
pub struct GlobalMember {
    pub name: String,
    pub import: Option<ImportSpec>,
    pub ty: NativeType,
    /// Globals are only exposed as references into the library's memory.
    pub by_ref: bool,
    pub writable: bool,
}

impl LibraryContract {
    /// `library_name` excludes platform prefixes and suffixes (`dl`, not `libdl.so`).
    pub fn new(name: impl Into<String>, library_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            library_name: library_name.into(),
            version: None,
            members: Vec::new(),
        }
    }

    pub fn version(mut self, version: LibraryVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn function(mut self, function: FunctionMember) -> Self {
        self.members.push(Member::Function(function));
        self
    }

    pub fn global(mut self, global: GlobalMember) -> Self {
        self.members.push(Member::Global(global));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn library_name(&self) -> &str {
        &self.library_name
    }

    pub const fn library_version(&self) -> Option<LibraryVersion> {
        self.version
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionMember> {
        self.members.iter().filter_map(|member| match member {
            Member::Function(function) => Some(function),
            Member::Global(_) => None,
        })
    }

    pub fn globals(&self) -> impl Iterator<Item = &GlobalMember> {
        self.members.iter().filter_map(|member| match member {
            Member::Global(global) => Some(global),
            Member::Function(_) => None,
        })
    }

    pub fn error(&self, reason: impl Into<String>) -> BindingError {
        BindingError::contract(&self.name, reason)
    }

    /// Structural checks shared by every binding strategy.
    ///
    /// Runs before any library is loaded, so a malformed contract never touches native code.
    pub fn validate(&self) -> Result<()> {
        if self.library_name.trim().is_empty() {
            return Err(self.error("library name is empty"));
        }

        let mut seen = HashSet::new();
        for member in &self.members {
            let name = member.name();
            if name.is_empty() {
                return Err(self.error("member with an empty name"));
            }
            if !seen.insert(name) {
                return Err(self.error(format!("member `{name}` is declared more than once")));
            }

            match member {
                Member::Function(function) => self.validate_function(function)?,
                Member::Global(global) => self.validate_global(global)?,
            }
        }

        Ok(())
    }

    fn validate_function(&self, function: &FunctionMember) -> Result<()> {
        let name = &function.name;
        if function.variadic {
            return Err(self.error(format!("`{name}` uses a variable-argument convention")));
        }
        let import = function
            .import
            .as_ref()
            .ok_or_else(|| self.error(format!("`{name}` has no import spec")))?;
        if import.resolve_entry_point(name).is_empty() {
            return Err(self.error(format!("`{name}` has an empty entry point")));
        }

        for param in &function.params {
            self.validate_type(name, &param.name, &param.ty)?;
            if param.ty == NativeType::Void {
                return Err(self.error(format!("`{name}`: parameter `{}` is void", param.name)));
            }
        }

        let tagged_return = function
            .return_marshal
            .as_ref()
            .is_some_and(|directive| directive.kind == UnmanagedKind::SafeArray);
        if matches!(function.returns, NativeType::Array(_)) && !tagged_return {
            return Err(self.error(format!(
                "`{name}` returns an array; only tagged arrays carry their length back"
            )));
        }
        self.validate_type(name, "<return>", &function.returns)
    }

    fn validate_type(&self, member: &str, slot: &str, ty: &NativeType) -> Result<()> {
        match ty {
            NativeType::Array(element) => {
                if !(element.is_scalar() || **element == NativeType::String) {
                    return Err(self.error(format!(
                        "`{member}`: `{slot}` has unsupported array element {element}"
                    )));
                }
            }
            NativeType::Struct(layout) => {
                if !layout.is_blittable() {
                    return Err(self.error(format!(
                        "`{member}`: `{slot}` struct fields must be scalars"
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn validate_global(&self, global: &GlobalMember) -> Result<()> {
        let name = &global.name;
        let import = global
            .import
            .as_ref()
            .ok_or_else(|| self.error(format!("`{name}` has no import spec")))?;
        if import.resolve_entry_point(name).is_empty() {
            return Err(self.error(format!("`{name}` has an empty entry point")));
        }
        if !global.by_ref {
            return Err(self.error(format!("global `{name}` must be exposed by reference")));
        }
        if global.writable {
            return Err(self.error(format!("global `{name}` cannot have a setter")));
        }
        if !global.ty.is_value_type() {
            return Err(self.error(format!(
                "global `{name}` must reference a value type, not {}",
                global.ty
            )));
        }
        self.validate_type(name, name, &global.ty)
    }
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Self::Function(function) => &function.name,
            Self::Global(global) => &global.name,
        }
    }

    pub fn import(&self) -> Option<&ImportSpec> {
        match self {
            Self::Function(function) => function.import.as_ref(),
            Self::Global(global) => global.import.as_ref(),
        }
    }

    /// Symbol the member binds to, if it carries an import spec.
    pub fn entry_point(&self) -> Option<&str> {
        self.import()
            .map(|import| import.resolve_entry_point(self.name()))
    }
}

impl FunctionMember {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            import: None,
            params: Vec::new(),
            returns: NativeType::Void,
            return_marshal: None,
            variadic: false,
        }
    }

    pub fn import(mut self, import: ImportSpec) -> Self {
        self.import = Some(import);
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ty: NativeType) -> Self {
        self.returns = ty;
        self
    }

    pub fn return_marshal(mut self, directive: impl Into<MarshalDirective>) -> Self {
        self.return_marshal = Some(directive.into());
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Entry point this member binds to; falls back to the member name.
    pub fn entry_point(&self) -> &str {
        self.import
            .as_ref()
            .map_or(self.name.as_str(), |import| {
                import.resolve_entry_point(&self.name)
            })
    }
}

impl Param {
    pub fn new(name: impl Into<String>, ty: NativeType) -> Self {
        Self {
            name: name.into(),
            ty,
            direction: ParamDirection::In,
            marshal: None,
        }
    }

    pub fn out(name: impl Into<String>, ty: NativeType) -> Self {
        Self {
            direction: ParamDirection::Out,
            ..Self::new(name, ty)
        }
    }

    pub fn in_out(name: impl Into<String>, ty: NativeType) -> Self {
        Self {
            direction: ParamDirection::InOut,
            ..Self::new(name, ty)
        }
    }

    pub fn marshal(mut self, directive: impl Into<MarshalDirective>) -> Self {
        self.marshal = Some(directive.into());
        self
    }
}

impl GlobalMember {
    pub fn new(name: impl Into<String>, ty: NativeType) -> Self {
        Self {
            name: name.into(),
            import: None,
            ty,
            by_ref: true,
            writable: false,
        }
    }

    pub fn import(mut self, import: ImportSpec) -> Self {
        self.import = Some(import);
        self
    }

    /// Declares the global as returned by value, which bindings reject.
    pub fn by_value(mut self) -> Self {
        self.by_ref = false;
        self
    }

    /// Declares a setter, which bindings reject.
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    pub fn entry_point(&self) -> &str {
        self.import
            .as_ref()
            .map_or(self.name.as_str(), |import| {
                import.resolve_entry_point(&self.name)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StructLayout;

    fn dl_contract() -> LibraryContract {
        LibraryContract::new("TestBindingUnix", "dl")
            .version(LibraryVersion::new(2, 0, 0))
            .global(GlobalMember::new("dlsym", NativeType::Pointer).import(ImportSpec::new()))
            .function(
                FunctionMember::new("dlopen")
                    .import(ImportSpec::new())
                    .param(Param::new("path", NativeType::String))
                    .param(Param::new("flag", NativeType::I32))
                    .returns(NativeType::Pointer),
            )
    }

    fn reason(err: BindingError) -> String {
        match err {
            BindingError::ContractDefinition { reason, .. } => reason,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_contract() {
        let contract = dl_contract();
        contract.validate().unwrap();
        assert_eq!(contract.functions().count(), 1);
        assert_eq!(contract.globals().count(), 1);
        assert_eq!(contract.members()[0].entry_point(), Some("dlsym"));
    }

    #[test]
    fn test_missing_import_spec() {
        let contract = dl_contract().function(FunctionMember::new("dlclose"));
        assert_eq!(
            reason(contract.validate().unwrap_err()),
            "`dlclose` has no import spec"
        );
    }

    #[test]
    fn test_variadic_rejected() {
        let contract = LibraryContract::new("C", "c").function(
            FunctionMember::new("printf")
                .import(ImportSpec::new())
                .variadic(),
        );
        assert!(reason(contract.validate().unwrap_err()).contains("variable-argument"));
    }

    #[test]
    fn test_duplicate_member() {
        let contract =
            dl_contract().function(FunctionMember::new("dlopen").import(ImportSpec::new()));
        assert!(reason(contract.validate().unwrap_err()).contains("more than once"));
    }

    #[test]
    fn test_global_shape_rules() {
        let environ = || GlobalMember::new("environ", NativeType::Pointer);
        let by_value = LibraryContract::new("C", "c")
            .global(environ().import(ImportSpec::new()).by_value());
        assert!(reason(by_value.validate().unwrap_err()).contains("by reference"));

        let writable = LibraryContract::new("C", "c")
            .global(environ().import(ImportSpec::new()).writable());
        assert!(reason(writable.validate().unwrap_err()).contains("setter"));

        let reference_type = LibraryContract::new("C", "c")
            .global(GlobalMember::new("name", NativeType::String).import(ImportSpec::new()));
        assert!(reason(reference_type.validate().unwrap_err()).contains("value type"));

        let missing_import = LibraryContract::new("C", "c").global(environ());
        assert!(reason(missing_import.validate().unwrap_err()).contains("no import spec"));
    }

    #[test]
    fn test_type_rules() {
        let array_return = LibraryContract::new("C", "c").function(
            FunctionMember::new("f")
                .import(ImportSpec::new())
                .returns(NativeType::array_of(NativeType::I32)),
        );
        assert!(reason(array_return.validate().unwrap_err()).contains("returns an array"));

        let tagged_return = LibraryContract::new("C", "c").function(
            FunctionMember::new("f")
                .import(ImportSpec::new())
                .returns(NativeType::array_of(NativeType::I32))
                .return_marshal(MarshalDirective::safe_array(crate::VariantKind::I4)),
        );
        tagged_return.validate().unwrap();

        let nested = LibraryContract::new("C", "c").function(
            FunctionMember::new("f")
                .import(ImportSpec::new())
                .param(Param::new(
                    "xs",
                    NativeType::array_of(NativeType::array_of(NativeType::I32)),
                )),
        );
        assert!(reason(nested.validate().unwrap_err()).contains("array element"));

        let bad_struct = LibraryContract::new("C", "c").function(
            FunctionMember::new("f")
                .import(ImportSpec::new())
                .param(Param::new(
                    "s",
                    NativeType::Struct(StructLayout::new(vec![NativeType::String])),
                )),
        );
        assert!(reason(bad_struct.validate().unwrap_err()).contains("struct fields"));
    }

    #[test]
    fn test_empty_library_name() {
        let err = LibraryContract::new("C", " ").validate().unwrap_err();
        assert!(reason(err).contains("library name"));
    }

    #[test]
    fn test_entry_point_override() {
        let function = FunctionMember::new("GetVersion")
            .import(ImportSpec::new().entry_point("ebur128_get_version"));
        assert_eq!(function.entry_point(), "ebur128_get_version");
        assert_eq!(FunctionMember::new("abs").entry_point(), "abs");
    }
}
