use std::ffi::c_void;
use std::ptr::NonNull;

use libffi::middle::{Cif, CodePtr};
use libffi::raw;
use shimforge_contract::{CallingConvention, Value};
use shimforge_marshal::{CallFrame, FunctionPlan};
use shimforge_utils::Result;

use crate::last_error;

/// Machine-level calling convention of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallAbi {
    C,
    StdCall,
    FastCall,
    ThisCall,
}

impl CallAbi {
    /// Direct bindings treat `Winapi` as `stdcall`.
    pub const fn direct(convention: CallingConvention) -> Self {
        match convention {
            CallingConvention::C => Self::C,
            CallingConvention::FastCall => Self::FastCall,
            CallingConvention::StdCall | CallingConvention::Winapi => Self::StdCall,
            CallingConvention::ThisCall => Self::ThisCall,
        }
    }

    /// Declared bindings resolve `Winapi` to the platform default.
    pub const fn declared(convention: CallingConvention) -> Self {
        match convention {
            CallingConvention::Winapi => Self::platform_default(),
            other => Self::direct(other),
        }
    }

    pub const fn platform_default() -> Self {
        if cfg!(all(windows, target_arch = "x86")) {
            Self::StdCall
        } else {
            Self::C
        }
    }
}

/// Address of a native function inside a library that is never unloaded.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CodeAddress(NonNull<c_void>);

// SAFETY: the address is immutable and the code behind it outlives every binding.
unsafe impl Send for CodeAddress {}
// SAFETY: as above.
unsafe impl Sync for CodeAddress {}

impl CodeAddress {
    pub(crate) const fn new(address: NonNull<c_void>) -> Self {
        Self(address)
    }

    pub(crate) const fn get(self) -> NonNull<c_void> {
        self.0
    }
}

/// A prepared libffi call interface plus the marshaling plan it was built from.
pub(crate) struct CallSite {
    cif: Cif,
    plan: FunctionPlan,
    set_last_error: bool,
}

// SAFETY: the CIF is built once and only read afterwards; libffi never mutates it during a call.
unsafe impl Send for CallSite {}
// SAFETY: as above.
unsafe impl Sync for CallSite {}

impl CallSite {
    pub(crate) fn new(plan: FunctionPlan, abi: CallAbi, set_last_error: bool) -> Self {
        #[cfg_attr(not(target_arch = "x86"), allow(unused_mut))]
        let mut cif = Cif::new(plan.arg_types(), plan.ret_type());
        #[cfg(target_arch = "x86")]
        cif.set_abi(match abi {
            CallAbi::C => raw::ffi_abi_FFI_DEFAULT_ABI,
            CallAbi::StdCall => raw::ffi_abi_FFI_STDCALL,
            CallAbi::FastCall => raw::ffi_abi_FFI_FASTCALL,
            CallAbi::ThisCall => raw::ffi_abi_FFI_THISCALL,
        });
        #[cfg(not(target_arch = "x86"))]
        let _ = abi;

        Self {
            cif,
            plan,
            set_last_error,
        }
    }

    /// Marshal `args`, call `address` and copy results back.
    ///
    /// # Safety
    ///
    /// `address` must be a function whose native signature matches the plan.
    pub(crate) unsafe fn invoke(&self, address: CodeAddress, args: &mut [Value]) -> Result<Value> {
        let mut frame = CallFrame::new(&self.plan, args)?;
        let code = CodePtr(address.get().as_ptr());

        if self.set_last_error {
            last_error::clear();
        }
        // SAFETY: the CIF matches the frame layout and the caller vouches for the signature.
        unsafe {
            raw::ffi_call(
                self.cif.as_raw_ptr(),
                Some(*code.as_safe_fun()),
                frame.return_pointer(),
                frame.arg_pointers(),
            );
        }
        if self.set_last_error {
            last_error::capture();
        }

        frame.finish(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convention_mapping() {
        assert_eq!(CallAbi::direct(CallingConvention::Winapi), CallAbi::StdCall);
        assert_eq!(CallAbi::direct(CallingConvention::ThisCall), CallAbi::ThisCall);
        assert_eq!(CallAbi::declared(CallingConvention::FastCall), CallAbi::FastCall);
        assert_eq!(
            CallAbi::declared(CallingConvention::Winapi),
            CallAbi::platform_default()
        );
        #[cfg(not(all(windows, target_arch = "x86")))]
        assert_eq!(CallAbi::platform_default(), CallAbi::C);
    }
}
