//! Command implementations

pub mod check;
pub mod hash;
pub mod install;
pub mod list;
pub mod test;

use amx_core::Formula;
use anyhow::{Context as _, Result};

use crate::Context;

/// Locate and parse a formula reference (path or tap name).
pub(crate) fn load_formula(ctx: &Context, reference: &str) -> Result<Formula> {
    let path = amx_core::formula::locate(reference, &ctx.tap)?;
    let formula =
        Formula::from_file(&path).with_context(|| format!("Invalid formula {}", path.display()))?;
    tracing::debug!(formula = %path.display(), name = %formula.package.name, "loaded formula");
    Ok(formula)
}
