//! Marshaling between [`Value`](shimforge_contract::Value)s and native memory.
//!
//! Directives are first translated into native descriptors, then combined with the declared
//! parameter types into per-member plans. A plan is checked once, when a binding is
//! synthesized; at call time a [`CallFrame`] follows it to lay arguments out for libffi and to
//! copy results back.

pub mod buffer;
pub mod frame;
pub mod plan;
pub mod repr;
pub mod strings;
pub mod translator;
pub mod variant;

pub use buffer::AlignedBuf;
pub use frame::CallFrame;
pub use plan::{
    ArgKind, ArgPlan, ElementPlan, FunctionPlan, MarshalPolicy, PlanMode, ReturnPlan,
    plan_function,
};
pub use repr::Repr;
pub use strings::{AnsiPolicy, CodePage, NativeString, StringError, StringKind};
pub use translator::{NativeDescriptor, NativeTag, TranslateError, VariantTag, translate};
pub use variant::TaggedArray;
