//! Check command

use amx_core::deps::{BuildEnv, resolve_dependencies};
use amx_core::formula::ArtifactSource;
use amx_schema::{Arch, Platform};
use anyhow::Result;

use super::load_formula;
use crate::Context;
use crate::ui::Output;

/// Validate a formula and print what an install on this host would use.
pub fn check(ctx: &Context, reference: &str, arch: Option<Arch>) -> Result<()> {
    let formula = load_formula(ctx, reference)?;
    let platform = arch.map_or_else(Platform::current, |a| Platform::current().with_arch(a));
    let output = Output::new();

    output.success("Formula is valid");
    println!("  Name:     {}", formula.package.name);
    println!("  Version:  {}", formula.package.version);
    println!("  Binary:   {}", formula.binary_name());
    println!("  Source:   {} ({})", formula.source.url(), formula.source.kind());
    println!("  SHA256:   {}", formula.source.sha256());
    println!("  Checks:   {}", formula.tests.len());

    if let ArtifactSource::BuildFromSource(build) = &formula.source {
        let target = platform.target();
        println!("  Platform: {platform}");
        println!("  Task:     {}", build.task_for(&target));
        println!("  Artifact: {}", build.artifact_for(&target).display());
        if let Some(legacy) = platform.legacy_target() {
            println!("  Fallback: {}", build.artifact_for(&legacy).display());
        }
        output.warning("Building from source is a legacy install path");

        for dep in &build.dependencies {
            match resolve_dependencies(std::slice::from_ref(dep), &BuildEnv::from_process()) {
                Ok(found) => {
                    let version = found[0]
                        .version
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    println!(
                        "  Requires: {} {} ({})",
                        dep.name,
                        version,
                        found[0].executable.display()
                    );
                }
                Err(e) => output.warning(&e.to_string()),
            }
        }
    }

    Ok(())
}
