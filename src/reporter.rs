//! Periodic reporting.
//!
//! The reporter thread owns the reading ends of the generator and sampler
//! log streams. On every tick it drains both into its sink, then renders a
//! snapshot of the channel table. It never writes to the table.
//!
//! ```text
//! Generator ──LogStream──┐
//!                        ├──▶ Reporter ──▶ ReportSink (tracing + terminal)
//! Sampler ───LogStream──┘        ▲
//!                                │ snapshot every interval
//!                          ChannelTable
//! ```

use core::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::channels::{ChannelReading, TableSnapshot};
use crate::decoder::{ChannelState, FEEDING_POSITION};
use crate::engine::RoleLogs;
use crate::logging::{LogEntry, LogLevel};
use crate::shared::ScanShared;

/// Default render interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// How often dropped log messages are reported.
const DROPPED_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Scan role a log entry came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Generator,
    Sampler,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Generator => f.write_str("generator"),
            Role::Sampler => f.write_str("sampler"),
        }
    }
}

/// Where the reporter sends its output.
pub trait ReportSink: Send {
    /// Show the channel table.
    fn render(&mut self, snapshot: &TableSnapshot);

    /// Forward one log entry from a scan role.
    fn log(&mut self, role: Role, entry: &LogEntry) {
        let t_us = entry.timestamp_us;
        let msg = entry.message();
        match entry.level {
            LogLevel::Error => error!(%role, t_us, "{}", msg),
            LogLevel::Warn => warn!(%role, t_us, "{}", msg),
            LogLevel::Info => info!(%role, t_us, "{}", msg),
            LogLevel::Debug => debug!(%role, t_us, "{}", msg),
            LogLevel::Trace => trace!(%role, t_us, "{}", msg),
        }
    }

    /// Report log messages lost to full rings since the last report.
    fn dropped(&mut self, generator: u32, sampler: u32) {
        warn!("log messages dropped: generator={}, sampler={}", generator, sampler);
    }
}

/// Display status of one tube.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TubeStatus {
    /// Feeding latch set.
    Feeding,
    /// Fly seen at this beam position.
    Active(u8),
    /// Nothing reported.
    Idle,
}

impl TubeStatus {
    pub fn of(reading: &ChannelReading) -> Self {
        Self::of_state(&ChannelState::new(reading.position, reading.feeding))
    }

    pub fn of_state(state: &ChannelState) -> Self {
        if state.feeding {
            TubeStatus::Feeding
        } else if state.position > 0 {
            TubeStatus::Active(state.position)
        } else {
            TubeStatus::Idle
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TubeStatus::Feeding => "EATING",
            TubeStatus::Active(_) => "ACTIVE",
            TubeStatus::Idle => "IDLE",
        }
    }
}

/// Write the monitoring table.
///
/// Tubes are numbered from 1. A feeding tube always shows position 1.
pub fn render_table(snapshot: &TableSnapshot, out: &mut dyn fmt::Write) -> fmt::Result {
    writeln!(out, "Multibeam Activity Detector - Real-time Monitoring")?;
    writeln!(out, "===============================================")?;
    writeln!(out)?;
    writeln!(out, "Tube | Position | Status | Activity")?;
    writeln!(out, "-----|----------|---------|----------")?;

    for reading in snapshot.iter() {
        let status = TubeStatus::of(&reading);
        write!(out, "{:4} | ", reading.index + 1)?;
        match status {
            TubeStatus::Feeding => writeln!(
                out,
                "{:8} | {:<7} | Feeding at position {}",
                FEEDING_POSITION,
                status.label(),
                FEEDING_POSITION
            )?,
            TubeStatus::Active(position) => writeln!(
                out,
                "{:8} | {:<7} | Moving at position {}",
                position,
                status.label(),
                position
            )?,
            TubeStatus::Idle => writeln!(out, "{:>8} | {:<7} | No activity detected", "-", status.label())?,
        }
    }

    writeln!(out)?;
    writeln!(out, "Legend:")?;
    writeln!(out, "- EATING: Fly is feeding at position 1")?;
    writeln!(out, "- ACTIVE: Fly is moving, position indicates beam location")?;
    writeln!(out, "- IDLE: No fly detected at this tube")?;
    writeln!(out)
}

/// Renders the table to a terminal, optionally clearing it first.
pub struct ConsoleSink<W: io::Write + Send> {
    out: W,
    clear: bool,
    frame: String,
}

impl<W: io::Write + Send> ConsoleSink<W> {
    pub fn new(out: W, clear: bool) -> Self {
        Self {
            out,
            clear,
            frame: String::with_capacity(2048),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: io::Write + Send> ReportSink for ConsoleSink<W> {
    fn render(&mut self, snapshot: &TableSnapshot) {
        self.frame.clear();
        if self.clear {
            self.frame.push_str("\x1b[2J\x1b[H");
        }
        // Writing into a String cannot fail
        let _ = render_table(snapshot, &mut self.frame);

        if let Err(e) = self.out.write_all(self.frame.as_bytes()).and_then(|_| self.out.flush()) {
            debug!("table render failed: {}", e);
        }
    }
}

/// Drains role logs and renders the table until the generator halts.
pub struct Reporter<S: ReportSink> {
    shared: Arc<ScanShared>,
    logs: RoleLogs,
    sink: S,
    interval: Duration,
}

impl<S: ReportSink + 'static> Reporter<S> {
    pub fn new(shared: Arc<ScanShared>, logs: RoleLogs, sink: S, interval: Duration) -> Self {
        Self {
            shared,
            logs,
            sink,
            interval,
        }
    }

    /// Run on a named thread. The handle returns the sink.
    pub fn spawn(self) -> io::Result<JoinHandle<S>> {
        thread::Builder::new()
            .name("reporter".into())
            .spawn(move || self.run())
    }

    /// Report until the generator halts, then drain and render once more.
    pub fn run(mut self) -> S {
        let mut last_dropped_report = Instant::now();

        loop {
            self.drain();
            self.sink.render(&self.shared.table.snapshot());

            if last_dropped_report.elapsed() >= DROPPED_REPORT_INTERVAL {
                self.report_dropped();
                last_dropped_report = Instant::now();
            }

            if self.shared.phase.wait_halted(self.interval) {
                break;
            }
        }

        self.drain();
        self.report_dropped();
        self.sink.render(&self.shared.table.snapshot());
        self.sink
    }

    fn drain(&mut self) {
        // Generator first: its messages mark cycle boundaries
        while let Some(entry) = self.logs.generator.drain() {
            self.sink.log(Role::Generator, &entry);
        }
        while let Some(entry) = self.logs.sampler.drain() {
            self.sink.log(Role::Sampler, &entry);
        }
    }

    fn report_dropped(&mut self) {
        let generator = self.logs.generator.dropped();
        let sampler = self.logs.sampler.dropped();
        if generator > 0 || sampler > 0 {
            self.sink.dropped(generator, sampler);
            self.logs.generator.reset_dropped();
            self.logs.sampler.reset_dropped();
        }
    }
}
