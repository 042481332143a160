//! Installer progress rendered to the terminal.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use amx_core::Reporter;
use amx_core::types::{PackageName, Version};
use crossterm::style::Stylize;
use crossterm::tty::IsTty;

use super::{Theme, format_size, icons};

/// One status line per phase; download progress redraws in place on a TTY.
#[derive(Debug)]
pub struct TerminalReporter {
    theme: Theme,
    tty: bool,
    // Last download percentage drawn, to avoid redrawing per chunk
    last_percent: AtomicU64,
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self {
            theme: Theme::default(),
            tty: std::io::stdout().is_tty(),
            last_percent: AtomicU64::new(u64::MAX),
        }
    }

    fn label(&self, name: &PackageName, version: &Version) -> String {
        format!(
            "{} {}",
            name.as_str().with(self.theme.package_name),
            version.as_str().with(self.theme.version)
        )
    }

    fn status(&self, name: &PackageName, version: &Version, msg: &str) {
        self.end_progress();
        println!(
            "{} {} {}",
            icons::ACTIVE.with(self.theme.active),
            self.label(name, version),
            msg.with(self.theme.secondary)
        );
    }

    fn end_progress(&self) {
        if self.last_percent.swap(u64::MAX, Ordering::Relaxed) != u64::MAX && self.tty {
            println!();
        }
    }
}

impl Reporter for TerminalReporter {
    fn section(&self, title: &str) {
        self.end_progress();
        println!();
        println!("{}", title.bold());
    }

    fn downloading(&self, name: &PackageName, version: &Version, current: u64, total: Option<u64>) {
        let percent = match total {
            Some(total) if total > 0 => current.saturating_mul(100) / total,
            _ => 0,
        };
        if self.last_percent.swap(percent, Ordering::Relaxed) == percent {
            return;
        }
        if !self.tty {
            if current == 0 {
                println!(
                    "{} {} downloading",
                    icons::ACTIVE.with(self.theme.active),
                    self.label(name, version)
                );
            }
            return;
        }

        let progress = match total {
            Some(total) => format!("{} / {}", format_size(current), format_size(total)),
            None => format_size(current),
        };
        print!(
            "\r{} {} downloading {}",
            icons::ACTIVE.with(self.theme.active),
            self.label(name, version),
            progress.with(self.theme.secondary)
        );
        std::io::stdout().flush().ok();
    }

    fn extracting(&self, name: &PackageName, version: &Version) {
        self.status(name, version, "extracting");
    }

    fn building(&self, name: &PackageName, version: &Version, target: &str) {
        self.status(name, version, &format!("building for {target}"));
    }

    fn installing(&self, name: &PackageName, version: &Version) {
        self.status(name, version, "installing");
    }

    fn done(&self, name: &PackageName, version: &Version, detail: &str, size: Option<u64>) {
        self.end_progress();
        let size = size.map(format_size).unwrap_or_default();
        println!(
            "{} {} {} {}",
            icons::SUCCESS.with(self.theme.success),
            self.label(name, version),
            detail.with(self.theme.secondary),
            size.with(self.theme.secondary)
        );
    }

    fn failed(&self, name: &PackageName, version: &Version, reason: &str) {
        self.end_progress();
        eprintln!(
            "{} {} {}",
            icons::ERROR.with(self.theme.error),
            self.label(name, version),
            reason.with(self.theme.error)
        );
    }

    fn info(&self, msg: &str) {
        self.end_progress();
        println!("{} {msg}", icons::INFO.with(self.theme.secondary));
    }

    fn success(&self, msg: &str) {
        self.end_progress();
        println!("{} {msg}", icons::SUCCESS.with(self.theme.success));
    }

    fn warning(&self, msg: &str) {
        self.end_progress();
        println!("{} {msg}", icons::WARNING.with(self.theme.warning));
    }

    fn error(&self, msg: &str) {
        self.end_progress();
        eprintln!("{} {msg}", icons::ERROR.with(self.theme.error));
    }
}
