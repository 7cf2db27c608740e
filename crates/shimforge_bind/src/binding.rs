use std::ffi::c_void;
use std::fmt;
use std::mem::size_of;
use std::ptr::NonNull;
use std::sync::Arc;

use ahash::AHashMap;
use shimforge_contract::{NativeType, Value};
use shimforge_loader::{GlobalRef, LibraryHandle};
use shimforge_utils::{BindingError, Result};

use crate::kind::BindingKind;

/// Call entry for one function member.
pub(crate) type Invoker = Box<dyn Fn(&mut [Value]) -> Result<Value> + Send + Sync>;

enum Slot {
    Function(Invoker),
    Global { address: GlobalAddress, ty: NativeType },
}

struct GlobalAddress(NonNull<c_void>);

// SAFETY: points into a library that is never unloaded; access goes through `GlobalRef`.
unsafe impl Send for GlobalAddress {}
// SAFETY: as above.
unsafe impl Sync for GlobalAddress {}

struct BoundMember {
    name: String,
    slot: Slot,
}

/// A synthesized implementation of one contract.
///
/// Members are looked up by name in an immutable dispatch table; calls take no locks.
pub struct Binding {
    contract: String,
    kind: BindingKind,
    library: Arc<LibraryHandle>,
    members: Vec<BoundMember>,
    index: AHashMap<String, usize>,
}

impl Binding {
    /// Invoke function member `member`. `Out`/`InOut` arguments are updated in place.
    pub fn call(&self, member: &str, args: &mut [Value]) -> Result<Value> {
        match &self.lookup(member)?.slot {
            Slot::Function(invoke) => invoke(args),
            Slot::Global { .. } => Err(BindingError::invalid_call(
                member,
                "is a global, not a function",
            )),
        }
    }

    /// Reference to global member `member`.
    ///
    /// # Safety
    ///
    /// `T` must have the layout of the member's declared value type.
    pub unsafe fn global<T: Copy>(&self, member: &str) -> Result<GlobalRef<'_, T>> {
        let Slot::Global { address, ty } = &self.lookup(member)?.slot else {
            return Err(BindingError::invalid_call(member, "is a function, not a global"));
        };
        if ty.size() != Some(size_of::<T>()) {
            return Err(BindingError::invalid_call(
                member,
                format!(
                    "declared as {ty}, which does not fit a {}-byte type",
                    size_of::<T>()
                ),
            ));
        }
        // SAFETY: the address stays valid while `self` holds the library; layout is on the caller.
        Ok(unsafe { GlobalRef::from_raw(address.0.cast()) })
    }

    /// Member names in contract order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|member| member.name.as_str())
    }

    pub fn has_member(&self, member: &str) -> bool {
        self.index.contains_key(member)
    }

    pub const fn kind(&self) -> BindingKind {
        self.kind
    }

    pub fn library(&self) -> &LibraryHandle {
        &self.library
    }

    pub fn contract_name(&self) -> &str {
        &self.contract
    }

    fn lookup(&self, member: &str) -> Result<&BoundMember> {
        self.index
            .get(member)
            .map(|&idx| &self.members[idx])
            .ok_or_else(|| {
                BindingError::invalid_call(
                    member,
                    format!("contract `{}` has no such member", self.contract),
                )
            })
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("contract", &self.contract)
            .field("kind", &self.kind)
            .field("library", &self.library.path())
            .field("members", &self.members().collect::<Vec<_>>())
            .finish()
    }
}

/// Assembles a [`Binding`] once every member has been resolved.
pub(crate) struct BindingBuilder {
    binding: Binding,
}

impl BindingBuilder {
    pub(crate) fn new(contract: &str, kind: BindingKind, library: Arc<LibraryHandle>) -> Self {
        Self {
            binding: Binding {
                contract: contract.to_string(),
                kind,
                library,
                members: Vec::new(),
                index: AHashMap::new(),
            },
        }
    }

    pub(crate) fn library(&self) -> &LibraryHandle {
        &self.binding.library
    }

    pub(crate) const fn library_arc(&self) -> &Arc<LibraryHandle> {
        &self.binding.library
    }

    pub(crate) fn function(&mut self, name: &str, invoke: Invoker) {
        self.push(name, Slot::Function(invoke));
    }

    /// Resolve global `name` at `entry_point` now; a missing export aborts synthesis.
    pub(crate) fn global(&mut self, name: &str, entry_point: &str, ty: &NativeType) -> Result<()> {
        let library = self.library();
        let address = library
            .symbol_address(entry_point)
            .ok_or_else(|| library.missing(entry_point))?;
        self.push(
            name,
            Slot::Global {
                address: GlobalAddress(address),
                ty: ty.clone(),
            },
        );
        Ok(())
    }

    fn push(&mut self, name: &str, slot: Slot) {
        let binding = &mut self.binding;
        binding
            .index
            .insert(name.to_string(), binding.members.len());
        binding.members.push(BoundMember {
            name: name.to_string(),
            slot,
        });
    }

    pub(crate) fn finish(self) -> Binding {
        self.binding
    }
}
