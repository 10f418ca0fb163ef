//! Command line parser
//!
//! Split on whitespace, at most 2 arguments.

/// Parsed command with up to 2 arguments
#[derive(Debug, Clone)]
pub struct ParsedCommand<'a> {
    /// The command name (first token, empty for a blank line)
    pub command: &'a str,
    pub args: [Option<&'a str>; 2],
}

impl<'a> ParsedCommand<'a> {
    /// Create empty command
    pub const fn empty() -> Self {
        Self {
            command: "",
            args: [None, None],
        }
    }

    /// Get argument by index (0-based)
    pub fn arg(&self, idx: usize) -> Option<&'a str> {
        self.args.get(idx).copied().flatten()
    }

    /// Blank line.
    pub fn is_empty(&self) -> bool {
        self.command.is_empty()
    }
}

/// Parse a command line into command and arguments
pub fn parse_line(line: &str) -> ParsedCommand<'_> {
    let mut parts = line.split_whitespace();

    let command = parts.next().unwrap_or("");

    let mut args = [None, None];
    for (i, arg) in parts.take(2).enumerate() {
        args[i] = Some(arg);
    }

    ParsedCommand { command, args }
}
