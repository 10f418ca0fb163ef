//! Time base selection menu.

use std::io::{self, BufRead, Write};

use crate::config::TimeBase;

/// Print the time base menu and read the operator's choice.
///
/// A blank, invalid or missing answer (EOF) selects
/// [`TimeBase::DEFAULT`] and prints a notice.
pub fn prompt_time_base<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<TimeBase> {
    writeln!(out, "Select timebase (milliseconds):")?;
    for (i, tb) in TimeBase::MENU.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, tb.secs() * 1000.0)?;
    }
    write!(out, "Choice: ")?;
    out.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    match TimeBase::parse_choice(&line) {
        Some(tb) => {
            writeln!(out, "Using timebase {}", tb)?;
            Ok(tb)
        }
        None => {
            writeln!(out, "Using default timebase ({})", TimeBase::DEFAULT)?;
            Ok(TimeBase::DEFAULT)
        }
    }
}
