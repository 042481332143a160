//! Terminal output
//!
//! Colors, icons and size formatting shared by the commands, plus the
//! [`TerminalReporter`] that renders installer progress.

mod reporter;

pub use reporter::TerminalReporter;

use crossterm::style::{Color, Stylize};

/// Colors for different UI elements
#[derive(Debug, Clone)]
pub struct Theme {
    pub package_name: Color,
    pub version: Color,
    pub secondary: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub active: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            package_name: Color::Cyan,
            version: Color::White,
            secondary: Color::DarkGrey,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            active: Color::Blue,
        }
    }
}

/// Status icons
pub mod icons {
    pub const ACTIVE: &str = "●";
    pub const SUCCESS: &str = "✓";
    pub const ERROR: &str = "✗";
    pub const WARNING: &str = "⚠";
    pub const INFO: &str = "ℹ";
}

/// Width of the name column in `amx list`
pub const NAME_WIDTH: usize = 16;
/// Width of the version column in `amx list`
pub const VERSION_WIDTH: usize = 12;

/// Simple line-oriented output for commands that don't install anything.
#[derive(Debug, Default, Clone)]
pub struct Output {
    theme: Theme,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, msg: &str) {
        println!("{} {msg}", icons::INFO.with(self.theme.secondary));
    }

    pub fn success(&self, msg: &str) {
        println!("{} {msg}", icons::SUCCESS.with(self.theme.success));
    }

    pub fn warning(&self, msg: &str) {
        println!("{} {msg}", icons::WARNING.with(self.theme.warning));
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{} {msg}", icons::ERROR.with(self.theme.error));
    }
}

/// Format bytes for human-readable display
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else if kb >= 1024.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}
