//! Direct strategy: symbol addresses are resolved at synthesis and baked into each call site.

use std::env::consts::ARCH;

use shimforge_config::BindingConfig;
use shimforge_contract::{FunctionMember, LibraryContract, Member};
use shimforge_loader::load_library;
use shimforge_marshal::{FunctionPlan, PlanMode, plan_function};
use shimforge_utils::{BindingError, Result};
use tracing::debug;

use crate::binding::{Binding, BindingBuilder};
use crate::callsite::{CallAbi, CallSite, CodeAddress};
use crate::kind::BindingKind;
use crate::{BindingFactory, synthesize};

/// Builds bindings that call native entry points through precomputed addresses.
///
/// Only values with a native layout may cross the boundary; strings, arrays and marshal
/// directives need a [`DeclaredBindingFactory`](crate::DeclaredBindingFactory).
#[derive(Debug, Clone)]
pub struct DirectBindingFactory {
    config: BindingConfig,
    target_arch: String,
}

impl Default for DirectBindingFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectBindingFactory {
    pub fn new() -> Self {
        Self {
            config: BindingConfig::default(),
            target_arch: ARCH.to_string(),
        }
    }

    pub fn with_config(mut self, config: BindingConfig) -> Self {
        self.config = config;
        self
    }

    /// Pretend to run on `arch` (as named by `std::env::consts::ARCH`).
    pub fn with_target_arch(mut self, arch: impl Into<String>) -> Self {
        self.target_arch = arch.into();
        self
    }

    fn build(&self, contract: &LibraryContract) -> Result<Binding> {
        if self.target_arch == "x86" {
            return Err(BindingError::PlatformNotSupported {
                arch: self.target_arch.clone(),
            });
        }
        contract.validate()?;

        let plans = contract
            .functions()
            .map(|function| plan_function(contract.name(), function, &PlanMode::Direct))
            .collect::<Result<Vec<_>>>()?;

        let library = load_library(
            contract.library_name(),
            contract.library_version(),
            &self.config,
        )?;
        let mut builder = BindingBuilder::new(contract.name(), BindingKind::Direct, library);
        let mut plans = plans.into_iter();

        for member in contract.members() {
            match member {
                Member::Function(function) => {
                    let Some(plan) = plans.next() else {
                        return Err(contract.error("member plans out of step with members"));
                    };
                    bind_function(&mut builder, function, plan)?;
                }
                Member::Global(global) => {
                    builder.global(&global.name, global.entry_point(), &global.ty)?;
                }
            }
        }

        Ok(builder.finish())
    }
}

fn bind_function(
    builder: &mut BindingBuilder,
    function: &FunctionMember,
    plan: FunctionPlan,
) -> Result<()> {
    let entry_point = function.entry_point();
    let library = builder.library();
    let address = library
        .symbol_address(entry_point)
        .ok_or_else(|| library.missing(entry_point))?;
    debug!(
        member = %function.name,
        symbol = entry_point,
        address = ?address,
        "resolved entry point"
    );

    let convention = function
        .import
        .as_ref()
        .map(|import| import.calling_convention)
        .unwrap_or_default();
    let site = CallSite::new(plan, CallAbi::direct(convention), false);
    let address = CodeAddress::new(address);

    builder.function(
        &function.name,
        Box::new(move |args| {
            // SAFETY: the plan was checked against the contract, which vouches for the signature.
            unsafe { site.invoke(address, args) }
        }),
    );
    Ok(())
}

impl BindingFactory for DirectBindingFactory {
    fn kind(&self) -> BindingKind {
        BindingKind::Direct
    }

    fn create_binding(&self, contract: &LibraryContract) -> Result<Binding> {
        synthesize(contract, BindingKind::Direct, || self.build(contract))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shimforge_contract::{ImportSpec, NativeType, Param};

    #[test]
    fn test_x86_is_rejected_before_anything_else() {
        let contract = LibraryContract::new("Broken", "");
        let err = DirectBindingFactory::new()
            .with_target_arch("x86")
            .create_binding(&contract)
            .unwrap_err();
        assert!(matches!(err, BindingError::PlatformNotSupported { arch } if arch == "x86"));
    }

    #[test]
    fn test_missing_import_fails_before_load() {
        let contract = LibraryContract::new("Ghost", "shimforge_not_installed")
            .function(FunctionMember::new("Run").returns(NativeType::I32));
        let err = DirectBindingFactory::new()
            .create_binding(&contract)
            .unwrap_err();
        assert!(matches!(err, BindingError::ContractDefinition { .. }), "{err}");
    }

    #[test]
    fn test_strings_need_marshaling() {
        let contract = LibraryContract::new("Ghost", "shimforge_not_installed").function(
            FunctionMember::new("puts")
                .import(ImportSpec::new())
                .param(Param::new("s", NativeType::String)),
        );
        let err = DirectBindingFactory::new()
            .create_binding(&contract)
            .unwrap_err();
        assert!(err.to_string().contains("declared binding"), "{err}");
    }

    #[test]
    fn test_missing_library() {
        let contract = LibraryContract::new("Ghost", "shimforge_not_installed").function(
            FunctionMember::new("Run")
                .import(ImportSpec::new())
                .returns(NativeType::I32),
        );
        let err = DirectBindingFactory::new()
            .create_binding(&contract)
            .unwrap_err();
        assert!(matches!(err, BindingError::LibraryNotFound { .. }));
    }
}
