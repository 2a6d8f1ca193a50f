//! Output layer for the wireprobe CLI.
//!
//! Keeps stdout/stderr separation in one place:
//! - stdout: the run itself (section headers, check lines, summary)
//! - stderr: diagnostics (progress, verbose messages, errors)
//!
//! Check lines are emitted by the reporter (see `report.rs`); everything else
//! that a phase prints goes through `Output`.

use colored::Colorize;
use std::io::{self, Write};

/// Width of the `=====` rule under section headers.
const RULE_WIDTH: usize = 50;

/// Output helper shared by the orchestrator and phases.
#[derive(Debug, Clone)]
pub struct Output {
    pub quiet: bool,
    pub verbose: bool,
}

impl Output {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self { quiet, verbose }
    }

    /// Banner printed once at the start of a run.
    pub fn title(&self, title: &str) {
        if self.quiet {
            return;
        }
        self.line(&title.bold().to_string());
        self.line(&"=".repeat(RULE_WIDTH));
    }

    /// Header separating phases.
    pub fn section(&self, title: &str) {
        if self.quiet {
            return;
        }
        self.line("");
        self.line(&title.bold().to_string());
        self.line(&"=".repeat(RULE_WIDTH));
    }

    /// Informational line on stdout that is not itself a check
    /// (pool settings, completion counts).
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&format!("  {}", message));
    }

    /// Verbose diagnostic on stderr, only with --verbose.
    pub fn verbose(&self, message: &str) {
        if self.quiet || !self.verbose {
            return;
        }
        eprintln!("{}", message);
    }

    /// Line on stdout that is always shown, even with --quiet.
    pub fn always(&self, message: &str) {
        self.line(message);
    }

    fn line(&self, message: &str) {
        // A closed stdout (e.g. `| head`) must not abort the run.
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", message);
    }

    /// Flush stdout before exiting.
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}
