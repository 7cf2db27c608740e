//! Declared strategy: each member is a stub bound to a (library, entry point) pair and carries
//! the full marshaling directive set.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use shimforge_config::BindingConfig;
use shimforge_contract::{CharSet, FunctionMember, ImportSpec, LibraryContract, Member};
use shimforge_loader::{LibraryHandle, load_library};
use shimforge_marshal::{FunctionPlan, MarshalPolicy, PlanMode, plan_function};
use shimforge_utils::Result;
use tracing::debug;

use crate::binding::{Binding, BindingBuilder};
use crate::callsite::{CallAbi, CallSite, CodeAddress};
use crate::kind::BindingKind;
use crate::{BindingFactory, synthesize};

/// Everything an import stub records about its native target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDescriptor {
    pub library: String,
    pub entry_point: String,
    pub abi: CallAbi,
    pub char_set: CharSet,
    pub best_fit_mapping: bool,
    pub throw_on_unmappable_char: bool,
    pub set_last_error: bool,
}

impl ImportDescriptor {
    pub fn new(library: impl Into<String>, member: &str, import: &ImportSpec) -> Self {
        Self {
            library: library.into(),
            entry_point: import.resolve_entry_point(member).to_string(),
            abi: CallAbi::declared(import.calling_convention),
            char_set: import.char_set,
            best_fit_mapping: import.best_fit_mapping,
            throw_on_unmappable_char: import.throw_on_unmappable_char,
            set_last_error: import.set_last_error,
        }
    }
}

/// An import whose address is looked up on first call.
pub(crate) struct DeclaredImport {
    library: Arc<LibraryHandle>,
    descriptor: ImportDescriptor,
    address: OnceCell<CodeAddress>,
}

impl DeclaredImport {
    pub(crate) fn new(library: Arc<LibraryHandle>, descriptor: ImportDescriptor) -> Self {
        Self {
            library,
            descriptor,
            address: OnceCell::new(),
        }
    }

    /// Fail synthesis now if the entry point is missing, without caching the address.
    pub(crate) fn probe(&self) -> Result<NonNull<c_void>> {
        let entry_point = &self.descriptor.entry_point;
        self.library
            .symbol_address(entry_point)
            .ok_or_else(|| self.library.missing(entry_point))
    }

    pub(crate) fn address(&self) -> Result<CodeAddress> {
        self.address
            .get_or_try_init(|| self.probe().map(CodeAddress::new))
            .copied()
    }
}

/// Builds bindings through declared imports with full marshaling support.
///
/// Available on every platform.
#[derive(Debug, Clone, Default)]
pub struct DeclaredBindingFactory {
    config: BindingConfig,
}

impl DeclaredBindingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: BindingConfig) -> Self {
        self.config = config;
        self
    }

    fn build(&self, contract: &LibraryContract) -> Result<Binding> {
        contract.validate()?;

        let plans = contract
            .functions()
            .map(|function| {
                let policy = function
                    .import
                    .as_ref()
                    .map(MarshalPolicy::from_import)
                    .unwrap_or_default();
                plan_function(contract.name(), function, &PlanMode::Declared(policy))
            })
            .collect::<Result<Vec<_>>>()?;

        let library = load_library(
            contract.library_name(),
            contract.library_version(),
            &self.config,
        )?;
        let mut builder = BindingBuilder::new(contract.name(), BindingKind::Declared, library);
        let mut plans = plans.into_iter();

        for member in contract.members() {
            match member {
                Member::Function(function) => {
                    let Some(plan) = plans.next() else {
                        return Err(contract.error("member plans out of step with members"));
                    };
                    bind_import(&mut builder, contract, function, plan)?;
                }
                Member::Global(global) => {
                    builder.global(&global.name, global.entry_point(), &global.ty)?;
                }
            }
        }

        Ok(builder.finish())
    }
}

fn bind_import(
    builder: &mut BindingBuilder,
    contract: &LibraryContract,
    function: &FunctionMember,
    plan: FunctionPlan,
) -> Result<()> {
    let import = function.import.clone().unwrap_or_default();
    let descriptor = ImportDescriptor::new(contract.library_name(), &function.name, &import);
    let site = CallSite::new(plan, descriptor.abi, descriptor.set_last_error);
    let stub = DeclaredImport::new(Arc::clone(builder.library_arc()), descriptor);

    let address = stub.probe()?;
    debug!(
        member = %function.name,
        symbol = %stub.descriptor.entry_point,
        address = ?address,
        "probed import"
    );

    builder.function(
        &function.name,
        Box::new(move |args| {
            let address = stub.address()?;
            // SAFETY: the plan was checked against the contract, which vouches for the signature.
            unsafe { site.invoke(address, args) }
        }),
    );
    Ok(())
}

impl BindingFactory for DeclaredBindingFactory {
    fn kind(&self) -> BindingKind {
        BindingKind::Declared
    }

    fn create_binding(&self, contract: &LibraryContract) -> Result<Binding> {
        synthesize(contract, BindingKind::Declared, || self.build(contract))
    }
}
