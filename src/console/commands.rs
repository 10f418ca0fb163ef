//! Command handlers

use core::fmt::Write;

use super::parser::ParsedCommand;
use super::ConsoleError;
use crate::channels::CHANNEL_COUNT;
use crate::reporter::{render_table, TubeStatus};
use crate::shared::ScanShared;

/// What the caller should do after a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    /// Stop the acquisition.
    Stop,
}

type Handler = fn(&ParsedCommand<'_>, &ScanShared, &mut dyn Write) -> Result<CommandOutcome, ConsoleError>;

/// Command descriptor
pub struct CommandDescriptor {
    pub name: &'static str,
    pub brief: &'static str,
    pub handler: Handler,
}

/// All available commands
pub static COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor { name: "help", brief: "List commands", handler: cmd_help },
    CommandDescriptor { name: "stop", brief: "Stop acquisition (or press Enter)", handler: cmd_stop },
    CommandDescriptor { name: "quit", brief: "Same as stop", handler: cmd_stop },
    CommandDescriptor { name: "stats", brief: "Scan and fault counters", handler: cmd_stats },
    CommandDescriptor { name: "show", brief: "Print the tube table", handler: cmd_show },
    CommandDescriptor { name: "tube", brief: "Show one tube (1-16)", handler: cmd_tube },
];

/// Execute a parsed command. A blank line stops the acquisition.
pub fn execute(
    cmd: &ParsedCommand<'_>,
    shared: &ScanShared,
    out: &mut dyn Write,
) -> Result<CommandOutcome, ConsoleError> {
    if cmd.is_empty() {
        return Ok(CommandOutcome::Stop);
    }

    let handler = COMMANDS
        .iter()
        .find(|c| c.name == cmd.command)
        .ok_or(ConsoleError::UnknownCommand)?;

    (handler.handler)(cmd, shared, out)
}

// --- Command Implementations ---

fn cmd_help(cmd: &ParsedCommand<'_>, _: &ScanShared, out: &mut dyn Write) -> Result<CommandOutcome, ConsoleError> {
    if let Some(name) = cmd.arg(0) {
        let c = COMMANDS
            .iter()
            .find(|c| c.name == name)
            .ok_or(ConsoleError::UnknownCommand)?;
        let _ = writeln!(out, "{}: {}", c.name, c.brief);
    } else {
        for c in COMMANDS {
            let _ = writeln!(out, "  {:<8} {}", c.name, c.brief);
        }
    }
    Ok(CommandOutcome::Continue)
}

fn cmd_stop(_: &ParsedCommand<'_>, _: &ScanShared, _: &mut dyn Write) -> Result<CommandOutcome, ConsoleError> {
    Ok(CommandOutcome::Stop)
}

fn cmd_stats(_: &ParsedCommand<'_>, shared: &ScanShared, out: &mut dyn Write) -> Result<CommandOutcome, ConsoleError> {
    let fault = shared.fault.snapshot();

    let _ = writeln!(out, "time base:     {}", shared.config.time_base);
    let _ = writeln!(out, "phase:         {}", shared.phase.current());
    let _ = writeln!(out, "cycles:        {}", shared.cycles_sampled());
    let _ = writeln!(out, "read timeouts: {}", fault.read_timeouts);
    let _ = writeln!(out, "read failures: {}", fault.read_failures);
    let _ = writeln!(out, "window misses: {}", fault.window_misses);
    if let Some(channel) = fault.last_channel {
        let _ = writeln!(out, "last fault:    {} on tube {}", fault.last_transient.as_str(), channel + 1);
    }
    if fault.active {
        let _ = writeln!(out, "FAULT:         {} (status {})", fault.code.as_str(), fault.status);
    }
    Ok(CommandOutcome::Continue)
}

fn cmd_show(_: &ParsedCommand<'_>, shared: &ScanShared, out: &mut dyn Write) -> Result<CommandOutcome, ConsoleError> {
    let _ = render_table(&shared.table.snapshot(), out);
    Ok(CommandOutcome::Continue)
}

fn cmd_tube(cmd: &ParsedCommand<'_>, shared: &ScanShared, out: &mut dyn Write) -> Result<CommandOutcome, ConsoleError> {
    let arg = cmd.arg(0).ok_or(ConsoleError::MissingArg)?;
    let tube: usize = arg.parse().map_err(|_| ConsoleError::InvalidValue)?;
    if !(1..=CHANNEL_COUNT).contains(&tube) {
        return Err(ConsoleError::OutOfRange);
    }

    let state = shared.table.get(tube - 1);
    let _ = writeln!(
        out,
        "tube {}: position={} feeding={} status={}",
        tube,
        state.position,
        state.feeding,
        TubeStatus::of_state(&state).label()
    );
    Ok(CommandOutcome::Continue)
}
