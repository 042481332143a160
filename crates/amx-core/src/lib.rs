//! Core library for amx.
//!
//! Turns a formula (a TOML package descriptor) into an installed, executable
//! binary: download and verify the declared archive, optionally run the
//! external build tool, place the binary in its keg and link it into `bin/`.
//! Post-install checks live in [`verify`].

pub mod builder;
pub mod deps;
pub mod error;
pub mod formula;
pub mod install;
pub mod io;
pub mod paths;
pub mod reporter;
pub mod types;
pub mod verify;

pub use error::InstallError;
pub use formula::Formula;
pub use install::{InstalledPath, Installer};
pub use paths::Layout;
pub use reporter::{NullReporter, Reporter};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("amx-core/", env!("CARGO_PKG_VERSION"));
