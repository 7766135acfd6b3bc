//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying spinners, status
//! prefixes, and formatted messages to the user.

use std::sync::OnceLock;

use indicatif::{ProgressBar, ProgressStyle};

static GLOBAL: OnceLock<OutputConfig> = OnceLock::new();

/// How much the CLI prints and in which format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputConfig {
    /// Only errors
    pub quiet: bool,
    /// Machine-readable output
    pub json: bool,
    /// Verbosity count from `-v`
    pub verbose: u8,
}

impl OutputConfig {
    /// Create an output configuration from the global flags
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Default log filter when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    /// Whether human-oriented progress and summaries should be shown
    pub fn interactive(&self) -> bool {
        !self.quiet && !self.json
    }

    /// Make this configuration visible to every command
    pub fn apply_global(self) {
        let _ = GLOBAL.set(self);
    }

    /// Configuration set by [`OutputConfig::apply_global`], or the default
    pub fn global() -> Self {
        GLOBAL.get().copied().unwrap_or_default()
    }
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} Error: {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  Caused by: {cause}");
    }
}

/// Create a spinner for operations with unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    if !OutputConfig::global().interactive() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(OutputConfig::new(false, false, 0).filter_directive(), "warn");
        assert_eq!(OutputConfig::new(false, false, 1).filter_directive(), "info");
        assert_eq!(OutputConfig::new(false, false, 3).filter_directive(), "debug");
        assert_eq!(OutputConfig::new(true, false, 2).filter_directive(), "error");
    }

    #[test]
    fn test_interactive() {
        assert!(OutputConfig::default().interactive());
        assert!(!OutputConfig::new(false, true, 0).interactive());
        assert!(!OutputConfig::new(true, false, 0).interactive());
    }
}
