//! Output collaborator for the `print` statement.
//!
//! The interpreter never writes to stdout directly; it writes through an injectable
//! `PrintWriter` (`StdPrint` / `CollectStringPrint` / `NoPrint`) instead, so tests can
//! capture output without touching the process's real streams.

use std::fmt;

/// Receives one line of text per executed `print` statement.
pub trait PrintWriter {
    /// Writes `line` followed by a newline.
    fn print_line(&mut self, line: &str);
}

/// Default `PrintWriter` that writes to real stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn print_line(&mut self, line: &str) {
        println!("{line}");
    }
}

/// A `PrintWriter` that collects all output into a string, one line per call.
///
/// Used by tests and by embedders who want to capture program output instead of
/// writing to a real stream.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn output(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn print_line(&mut self, line: &str) {
        self.0.push_str(line);
        self.0.push('\n');
    }
}

impl fmt::Display for CollectStringPrint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `PrintWriter` that discards all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn print_line(&mut self, _line: &str) {}
}
