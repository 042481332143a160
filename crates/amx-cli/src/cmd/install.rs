//! Install command

use std::path::PathBuf;
use std::sync::Arc;

use amx_core::deps::BuildEnv;
use amx_core::formula::ArtifactSource;
use amx_core::verify::{DEFAULT_TIMEOUT, verify};
use amx_core::{Installer, Reporter};
use amx_schema::{Arch, Platform};
use anyhow::{Context as _, Result};

use super::load_formula;
use crate::Context;
use crate::ui::{Output, TerminalReporter};

/// Install formulas one after another, running their checks unless skipped.
pub async fn install(
    ctx: &Context,
    references: &[String],
    arch: Option<Arch>,
    skip_test: bool,
    verbose: bool,
    dep_homes: &[(String, PathBuf)],
) -> Result<()> {
    let platform = arch.map_or_else(Platform::current, |a| Platform::current().with_arch(a));

    // Parse everything up front so a typo in the last formula fails before any download
    let formulas = references
        .iter()
        .map(|r| load_formula(ctx, r))
        .collect::<Result<Vec<_>>>()?;

    if ctx.dry_run {
        let output = Output::new();
        for formula in &formulas {
            let dest = ctx
                .layout
                .keg_path(&formula.package.name, &formula.package.version)
                .join("bin")
                .join(formula.binary_name());
            output.info(&format!(
                "Would install {} {} from {}",
                formula.package.name,
                formula.package.version,
                formula.source.url()
            ));
            if let ArtifactSource::BuildFromSource(build) = &formula.source {
                println!(
                    "  build: {} {} {}",
                    build.tool,
                    build.task_for(&platform.target()),
                    build.args.join(" ")
                );
            }
            println!("  into:  {}", dest.display());
        }
        return Ok(());
    }

    let reporter = Arc::new(TerminalReporter::new());
    let build_env = dep_homes
        .iter()
        .fold(BuildEnv::from_process(), |env, (name, home)| {
            env.with_home(name.clone(), home.clone())
        });
    let installer = Installer::new(ctx.layout.clone(), reporter.clone())?
        .with_build_env(build_env)
        .verbose(verbose);

    reporter.section(&format!("Installing for {platform}"));
    for formula in &formulas {
        let installed = installer
            .install(formula, platform)
            .await
            .with_context(|| format!("Failed to install {}", formula.package.name))?;

        if skip_test || formula.tests.is_empty() {
            continue;
        }
        verify(&installed.binary, &formula.tests, DEFAULT_TIMEOUT)
            .with_context(|| format!("{} installed but failed its checks", formula.package.name))?;
        reporter.success(&format!(
            "{} passed {} check(s)",
            formula.display_name(),
            formula.tests.len()
        ));
    }

    Ok(())
}
