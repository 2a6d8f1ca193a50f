//! Pass/fail reporting for individual checks.

use colored::{ColoredString, Colorize};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Substituted when a check has nothing to say.
const EMPTY_DETAIL: &str = "(no detail)";

/// Outcome of one connection attempt or one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub label: String,
    pub success: bool,
    pub detail: String,
}

impl ProbeResult {
    pub fn pass(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            success: true,
            detail: detail.into(),
        }
    }

    pub fn fail(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            success: false,
            detail: detail.into(),
        }
    }

    /// Failure whose detail is the full error chain.
    pub fn from_error(label: impl Into<String>, context: &str, err: &anyhow::Error) -> Self {
        Self::fail(label, format!("{}: {:#}", context, err))
    }

    /// Render as a report line, without color.
    pub fn format_line(&self) -> String {
        format!("  {} {}: {}", icon(self.success), self.label, self.detail())
    }

    fn detail(&self) -> &str {
        if self.detail.trim().is_empty() {
            EMPTY_DETAIL
        } else {
            &self.detail
        }
    }
}

fn icon(success: bool) -> &'static str {
    if success {
        "✓"
    } else {
        "✗"
    }
}

/// Sink for check outcomes. Shared by concurrent pool tasks, so it must be
/// usable through `&self` from any thread. Reporting never fails.
pub trait Reporter: Send + Sync {
    fn report(&self, result: &ProbeResult);
}

/// Pass/fail tallies for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
}

impl Summary {
    pub fn format_human(&self) -> String {
        if self.failed == 0 {
            format!("Summary: {} passed", self.passed)
        } else {
            format!("Summary: {} passed, {} failed", self.passed, self.failed)
        }
    }
}

/// Writes one line per check to stdout and keeps tallies.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    quiet: bool,
    passed: AtomicUsize,
    failed: AtomicUsize,
}

impl ConsoleReporter {
    /// With `quiet`, passing checks are counted but not printed.
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            ..Self::default()
        }
    }

    pub fn summary(&self) -> Summary {
        Summary {
            passed: self.passed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

fn styled_line(result: &ProbeResult) -> ColoredString {
    let line = result.format_line();
    if result.success {
        line.as_str().green()
    } else {
        line.as_str().red()
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, result: &ProbeResult) {
        if result.success {
            self.passed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        if self.quiet && result.success {
            return;
        }

        let line = styled_line(result);

        // One locked write per line keeps concurrent tasks from interleaving.
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Reporter that remembers everything it was given, in arrival order.
    #[derive(Debug, Default)]
    pub struct RecordingReporter {
        results: Mutex<Vec<ProbeResult>>,
    }

    impl RecordingReporter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn results(&self) -> Vec<ProbeResult> {
            self.results.lock().unwrap().clone()
        }

        pub fn labels(&self) -> Vec<String> {
            self.results().into_iter().map(|r| r.label).collect()
        }

        pub fn passed(&self) -> usize {
            self.results().iter().filter(|r| r.success).count()
        }

        pub fn failed(&self) -> usize {
            self.results().iter().filter(|r| !r.success).count()
        }
    }

    impl Reporter for RecordingReporter {
        fn report(&self, result: &ProbeResult) {
            self.results.lock().unwrap().push(result.clone());
        }
    }
}
