//! Shared value types for the amx formula installer.
//!
//! Everything here is plain data: architectures, platforms, digests and the
//! newtypes used to name packages. Parsing formulas and performing IO lives
//! in `amx-core`.

pub mod arch;
pub mod hash;
pub mod platform;
pub mod types;

// Re-exports
pub use arch::*;
pub use hash::*;
pub use platform::*;
pub use types::*;
