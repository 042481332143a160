//! List command

use std::path::Path;

use amx_schema::Version;
use anyhow::Result;
use crossterm::style::Stylize;

use crate::Context;
use crate::ui::{NAME_WIDTH, Theme, VERSION_WIDTH, format_size};

/// One installed version in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledKeg {
    pub name: String,
    pub version: Version,
    pub size: u64,
    pub installed: String,
}

/// List all installed packages
pub fn list(ctx: &Context) -> Result<()> {
    let kegs = scan_store(&ctx.layout.store_path())?;

    if kegs.is_empty() {
        println!();
        println!("  No packages installed.");
        println!("  Run 'amx install amx-coder' to get started.");
        return Ok(());
    }

    let theme = Theme::default();
    let header = format!(
        "  {:<NAME_WIDTH$} {:<VERSION_WIDTH$} {:>8}   installed",
        "name", "version", "size",
    );
    println!("{}", header.dark_grey());

    let mut total_size = 0;
    for keg in &kegs {
        total_size += keg.size;
        println!(
            "  {} {} {}   {}",
            format!("{:<NAME_WIDTH$}", keg.name).with(theme.package_name),
            format!("{:<VERSION_WIDTH$}", keg.version).with(theme.version),
            format!("{:>8}", format_size(keg.size)).with(theme.secondary),
            keg.installed.as_str().with(theme.secondary),
        );
    }

    println!();
    let footer = format!("  {} packages, {}", kegs.len(), format_size(total_size));
    println!("{}", footer.dark_grey());
    Ok(())
}

/// Walk `store/<name>/<version>/bin`, sorted by name then version.
pub fn scan_store(store: &Path) -> Result<Vec<InstalledKeg>> {
    let mut kegs = Vec::new();
    if !store.is_dir() {
        return Ok(kegs);
    }

    for name_entry in std::fs::read_dir(store)? {
        let name_entry = name_entry?;
        if !name_entry.file_type()?.is_dir() {
            continue;
        }
        for version_entry in std::fs::read_dir(name_entry.path())? {
            let version_entry = version_entry?;
            let bin = version_entry.path().join("bin");
            if !bin.is_dir() {
                continue;
            }

            let mut size = 0;
            let mut newest = None;
            for file in std::fs::read_dir(&bin)? {
                let meta = file?.metadata()?;
                if !meta.is_file() {
                    continue;
                }
                size += meta.len();
                let modified = meta.modified().ok();
                newest = newest.max(modified);
            }

            let installed = newest
                .map(|t| {
                    chrono::DateTime::<chrono::Local>::from(t)
                        .format("%Y-%m-%d")
                        .to_string()
                })
                .unwrap_or_default();

            kegs.push(InstalledKeg {
                name: name_entry.file_name().to_string_lossy().into_owned(),
                version: Version::new(&version_entry.file_name().to_string_lossy()),
                size,
                installed,
            });
        }
    }

    kegs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));
    Ok(kegs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_store(&dir.path().join("store")).unwrap().is_empty());
    }

    #[test]
    fn scans_kegs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        for (name, version, bytes) in [
            ("amx-operator", "1.0.3", 7usize),
            ("amx-coder", "1.0.2", 3),
        ] {
            let bin = store.join(name).join(version).join("bin");
            std::fs::create_dir_all(&bin).unwrap();
            std::fs::write(bin.join(name), vec![0u8; bytes]).unwrap();
        }
        // stray file at the name level is ignored
        std::fs::write(store.join("README"), "x").unwrap();

        let kegs = scan_store(&store).unwrap();
        assert_eq!(kegs.len(), 2);
        assert_eq!(kegs[0].name, "amx-coder");
        assert_eq!(kegs[0].size, 3);
        assert_eq!(kegs[1].version.as_str(), "1.0.3");
        assert!(!kegs[1].installed.is_empty());
    }

    #[test]
    fn versions_sort_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        for version in ["1.0.10", "1.0.9", "1.0.2"] {
            let bin = store.join("amx-coder").join(version).join("bin");
            std::fs::create_dir_all(&bin).unwrap();
            std::fs::write(bin.join("amx-coder"), "x").unwrap();
        }

        let versions: Vec<_> = scan_store(&store)
            .unwrap()
            .into_iter()
            .map(|k| k.version.to_string())
            .collect();
        assert_eq!(versions, ["1.0.2", "1.0.9", "1.0.10"]);
    }
}
