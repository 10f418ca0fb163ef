//! Operator console.
//!
//! Line oriented: the time base menu before acquisition, then one command
//! per line while the scan runs. An empty line stops the acquisition.

pub mod commands;
pub mod console;
pub mod error;
pub mod parser;
pub mod prompt;

pub use commands::{execute, CommandOutcome, COMMANDS};
pub use console::{Console, VERSION};
pub use error::ConsoleError;
pub use parser::{parse_line, ParsedCommand};
pub use prompt::prompt_time_base;
