//! Test command

use std::time::Duration;

use amx_core::verify::verify;
use anyhow::{Result, bail};

use super::load_formula;
use crate::Context;
use crate::ui::Output;

/// Run a formula's checks against the binary already in the store.
pub fn test(ctx: &Context, reference: &str, timeout_secs: u64) -> Result<()> {
    let formula = load_formula(ctx, reference)?;
    let binary = ctx
        .layout
        .keg_path(&formula.package.name, &formula.package.version)
        .join("bin")
        .join(formula.binary_name());

    if !binary.is_file() {
        bail!(
            "{} {} is not installed (expected {})",
            formula.package.name,
            formula.package.version,
            binary.display()
        );
    }

    let output = Output::new();
    if formula.tests.is_empty() {
        output.warning(&format!("{} declares no checks", formula.package.name));
        return Ok(());
    }

    let timeout = Duration::from_secs(timeout_secs);
    for case in &formula.tests {
        verify(&binary, std::slice::from_ref(case), timeout)?;
        output.success(&format!(
            "{} {} contains {:?}",
            formula.binary_name(),
            case.args.join(" "),
            case.contains
        ));
    }
    Ok(())
}
