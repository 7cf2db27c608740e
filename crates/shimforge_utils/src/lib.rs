//! Shared error taxonomy and logging bootstrap for the shimforge crates.

pub mod errors;
pub mod logger;

pub use errors::{BindingError, Result};
pub use logger::init_logging;
