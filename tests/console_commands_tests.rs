//! Command handler tests

use multibeam_scan::console::commands::{execute, CommandOutcome, COMMANDS};
use multibeam_scan::console::parser::parse_line;
use multibeam_scan::console::{Console, ConsoleError};
use multibeam_scan::fault::FaultCode;
use multibeam_scan::sample::BusSample;
use multibeam_scan::shared::ScanShared;
use multibeam_scan::ScanConfig;

fn shared() -> ScanShared {
    ScanShared::new(ScanConfig::default())
}

#[test]
fn test_command_registry_has_all_commands() {
    let expected = ["help", "stop", "quit", "stats", "show", "tube"];

    for name in expected {
        assert!(
            COMMANDS.iter().any(|c| c.name == name),
            "Command '{}' should be in registry",
            name
        );
    }
}

#[test]
fn test_execute_unknown_command() {
    let cmd = parse_line("foobar");
    let result = execute(&cmd, &shared(), &mut TestOutput::new());

    assert_eq!(result, Err(ConsoleError::UnknownCommand));
}

#[test]
fn test_execute_help() {
    let cmd = parse_line("help");
    let mut output = TestOutput::new();
    let result = execute(&cmd, &shared(), &mut output);

    assert_eq!(result, Ok(CommandOutcome::Continue));
    assert!(output.contains("stats"));
    assert!(output.contains("tube"));
}

#[test]
fn test_help_for_unknown_command() {
    let cmd = parse_line("help nothing");
    let result = execute(&cmd, &shared(), &mut TestOutput::new());

    assert_eq!(result, Err(ConsoleError::UnknownCommand));
}

#[test]
fn test_empty_line_stops() {
    for line in ["", "   ", "stop", "quit"] {
        let cmd = parse_line(line);
        let result = execute(&cmd, &shared(), &mut TestOutput::new());
        assert_eq!(result, Ok(CommandOutcome::Stop), "line {:?}", line);
    }
}

#[test]
fn test_tube_argument_errors() {
    let state = shared();
    let cases = [
        ("tube", ConsoleError::MissingArg),
        ("tube x", ConsoleError::InvalidValue),
        ("tube 0", ConsoleError::OutOfRange),
        ("tube 17", ConsoleError::OutOfRange),
    ];

    for (line, expected) in cases {
        let result = execute(&parse_line(line), &state, &mut TestOutput::new());
        assert_eq!(result, Err(expected), "line {:?}", line);
    }
}

#[test]
fn test_tube_shows_decoded_state() {
    let state = shared();
    state.table.apply(2, BusSample::position(1));
    state.table.apply(2, BusSample::FEEDING);

    let mut output = TestOutput::new();
    let result = execute(&parse_line("tube 3"), &state, &mut output);

    assert_eq!(result, Ok(CommandOutcome::Continue));
    assert!(output.contains("tube 3: position=1 feeding=true status=EATING"));
}

#[test]
fn test_stats_reports_faults() {
    let state = shared();
    state.fault.record(FaultCode::ReadTimeout, 6);
    state.fault.set(FaultCode::WriteFailed, -200);

    let mut output = TestOutput::new();
    execute(&parse_line("stats"), &state, &mut output).unwrap();

    assert!(output.contains("read timeouts: 1"));
    assert!(output.contains("read timeout on tube 7"));
    assert!(output.contains("FAULT:         write failed (status -200)"));
}

#[test]
fn test_show_prints_table() {
    let mut output = TestOutput::new();
    execute(&parse_line("show"), &shared(), &mut output).unwrap();

    assert!(output.contains("Tube | Position | Status | Activity"));
    assert!(output.contains("  16 |        - | IDLE"));
}

#[test]
fn test_console_prints_coded_errors() {
    let state = shared();
    let mut console = Console::new();
    let mut output = TestOutput::new();

    assert_eq!(console.handle_line("bogus", &state, &mut output), CommandOutcome::Continue);
    assert_eq!(console.handle_line("tube 99", &state, &mut output), CommandOutcome::Continue);
    assert_eq!(console.handle_line("", &state, &mut output), CommandOutcome::Stop);

    assert!(output.contains("E01: unknown command"));
    assert!(output.contains("E04: out of range"));
    assert_eq!(console.counts(), (3, 2));
}

// Test output buffer
struct TestOutput {
    buf: [u8; 4096],
    len: usize,
}

impl TestOutput {
    fn new() -> Self {
        Self { buf: [0u8; 4096], len: 0 }
    }

    fn contains(&self, s: &str) -> bool {
        if let Ok(content) = core::str::from_utf8(&self.buf[..self.len]) {
            content.contains(s)
        } else {
            false
        }
    }
}

impl core::fmt::Write for TestOutput {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let available = self.buf.len() - self.len;
        let to_copy = bytes.len().min(available);
        self.buf[self.len..self.len + to_copy].copy_from_slice(&bytes[..to_copy]);
        self.len += to_copy;
        Ok(())
    }
}
