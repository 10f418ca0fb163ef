//! Line console running beside the scan

use core::fmt::Write;

use super::{execute, parse_line, CommandOutcome};
use crate::shared::ScanShared;

/// Version string (set by build.rs, includes git hash)
pub const VERSION: &str = env!("VERSION_STRING");

/// Executes operator lines against a running scan.
pub struct Console {
    executed: u32,
    errors: u32,
}

impl Console {
    /// Create new console
    pub const fn new() -> Self {
        Self { executed: 0, errors: 0 }
    }

    /// Handle one input line (without its line terminator).
    ///
    /// Errors are printed as `E0x: message` and never stop the scan.
    pub fn handle_line(&mut self, line: &str, shared: &ScanShared, out: &mut dyn Write) -> CommandOutcome {
        let cmd = parse_line(line);
        self.executed += 1;
        match execute(&cmd, shared, out) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.errors += 1;
                let _ = writeln!(out, "{}", e);
                CommandOutcome::Continue
            }
        }
    }

    /// Lines handled so far, and how many of them failed.
    pub fn counts(&self) -> (u32, u32) {
        (self.executed, self.errors)
    }

    /// Print welcome banner
    pub fn print_banner(&self, out: &mut dyn Write) {
        let _ = writeln!(out, "Multibeam Activity Detector Control Program");
        let _ = writeln!(out, "=========================================");
        let _ = writeln!(out, "{}", VERSION);
        let _ = writeln!(out);
    }

    /// Print how to control a running acquisition.
    pub fn print_usage(&self, out: &mut dyn Write) {
        let _ = writeln!(out, "Starting acquisition. Press Enter to stop, type 'help' for commands.");
        let _ = writeln!(out);
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
