//! amx - installer for the AMX command-line tools
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Installs `amx-coder` and `amx-operator` from TOML formulas.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.amx/
//! ├── bin/                          # Links to installed binaries
//! ├── store/<name>/<version>/bin/   # Installed binaries
//! ├── tmp/                          # Download and build staging
//! └── logs/                         # Build logs
//! ```
//!
//! Formulas are looked up by path, or by name in the tap directory
//! (`--tap`, `$AMX_TAP`, default `formulas/`).

pub mod cmd;
pub mod ui;

use std::path::PathBuf;

use amx_core::Layout;
use amx_schema::Arch;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "amx")]
#[command(author, version, about = "amx - installer for the AMX Coder and AMX Operator CLIs")]
pub struct Cli {
    /// Show what would happen without making changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Installation root (defaults to ~/.amx)
    #[arg(long, global = true, env = "AMX_HOME")]
    pub home: Option<PathBuf>,

    /// Directory holding <name>.toml formulas
    #[arg(long, global = true, env = "AMX_TAP", default_value = "formulas")]
    pub tap: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install one or more formulas
    Install {
        /// Formula name (looked up in the tap) or path to a .toml file
        #[arg(required = true)]
        formulas: Vec<String>,
        /// Target architecture (arm64, x64); defaults to the host
        #[arg(long)]
        arch: Option<Arch>,
        /// Skip the post-install checks
        #[arg(long)]
        skip_test: bool,
        /// Stream build tool output instead of writing it to a log
        #[arg(short, long)]
        verbose: bool,
        /// Home of a build dependency, e.g. openjdk=/opt/jdk-17 (repeatable)
        #[arg(long = "dep-home", value_name = "NAME=PATH", value_parser = parse_dep_home)]
        dep_homes: Vec<(String, PathBuf)>,
    },
    /// Run a formula's checks against its installed binary
    Test {
        /// Formula name or path
        formula: String,
        /// Per-check timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    /// Validate a formula and show what an install would use
    Check {
        /// Formula name or path
        formula: String,
        /// Architecture to resolve the build target for
        #[arg(long)]
        arch: Option<Arch>,
    },
    /// Compute SHA256 hash of a file (for formula authoring)
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List installed packages
    List,
}

/// Parse `name=path` for `--dep-home`.
pub fn parse_dep_home(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got '{s}'")),
    }
}

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub layout: Layout,
    pub tap: PathBuf,
    pub dry_run: bool,
}

impl Context {
    /// Resolve the install root from `--home`/`AMX_HOME`, else `~/.amx`.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let layout = match &cli.home {
            Some(home) => Layout::new(home),
            None => Layout::try_from_env()
                .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?,
        };
        Ok(Self {
            layout,
            tap: cli.tap.clone(),
            dry_run: cli.dry_run,
        })
    }
}
