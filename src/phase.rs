//! Waveform phase signal.
//!
//! The generator is the only writer: it publishes every phase right before
//! it drives the matching line levels. The sampler blocks on the condition
//! variable until the phase it needs is reached. The run flag lives under the
//! same mutex so a waiting sampler sees a stop request and a phase change in
//! the same order the generator made them.
//!
//! # Ordering
//!
//! ```text
//! cycle n:  ResetActive → Idle → ClockHigh(0) → ClockLow(0) → … → ClockLow(15)
//! cycle n+1: ResetActive → …
//! ```
//!
//! Every published phase carries the cycle number, which increments on each
//! `ResetActive`. A stamp compares by `(cycle, position in cycle)`.
//!
//! # Read gating
//!
//! The only way to sample the data lines is [`ReadWindow::read`], and the
//! only way to get a `ReadWindow` is [`PhaseSignal::wait_clock_high`]
//! returning [`Gate::Open`] while the expected `ClockHigh` is current. The
//! window is consumed by the read and checked against the current phase
//! right before and right after the bus call.

use core::cmp::Ordering;
use core::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::SampleError;
use crate::hal::bus::{BusDriver, TaskHandle};
use crate::sample::{BusSample, BUS_LINE_COUNT};

/// Current state of the reset/clock waveform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaveformPhase {
    /// No pulse asserted (before the first reset and during reset release).
    Idle,
    /// Reset line high.
    ResetActive,
    /// Clock line high, channel's data valid on the bus.
    ClockHigh(u8),
    /// Clock line low after the channel's high half.
    ClockLow(u8),
}

impl WaveformPhase {
    /// Position within a scan cycle.
    pub const fn ordinal(self) -> u16 {
        match self {
            WaveformPhase::ResetActive => 0,
            WaveformPhase::Idle => 1,
            WaveformPhase::ClockHigh(ch) => 2 + 2 * ch as u16,
            WaveformPhase::ClockLow(ch) => 3 + 2 * ch as u16,
        }
    }
}

impl fmt::Display for WaveformPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaveformPhase::Idle => f.write_str("idle"),
            WaveformPhase::ResetActive => f.write_str("reset"),
            WaveformPhase::ClockHigh(ch) => write!(f, "clock-high({})", ch),
            WaveformPhase::ClockLow(ch) => write!(f, "clock-low({})", ch),
        }
    }
}

/// A phase together with the scan cycle it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseStamp {
    pub cycle: u64,
    pub phase: WaveformPhase,
}

impl PhaseStamp {
    pub const fn new(cycle: u64, phase: WaveformPhase) -> Self {
        Self { cycle, phase }
    }

    fn key(&self) -> (u64, u16) {
        (self.cycle, self.phase.ordinal())
    }
}

impl PartialOrd for PhaseStamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PhaseStamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for PhaseStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle {} {}", self.cycle, self.phase)
    }
}

struct PhaseState {
    stamp: PhaseStamp,
    running: bool,
    halted: bool,
}

/// Result of waiting for a channel's clock-high phase.
#[derive(Debug)]
pub enum Gate {
    /// The phase is current; the window allows exactly one read.
    Open(ReadWindow),
    /// The waveform is already past the phase.
    Missed(PhaseStamp),
    /// Acquisition is stopping.
    Closed,
}

/// Phase + run flag shared by the generator and the sampler.
pub struct PhaseSignal {
    state: Mutex<PhaseState>,
    changed: Condvar,
}

impl PhaseSignal {
    /// Idle, cycle 0, not running.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PhaseState {
                stamp: PhaseStamp::new(0, WaveformPhase::Idle),
                running: false,
                halted: false,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PhaseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_until(&self, mut ready: impl FnMut(&PhaseState) -> bool) -> MutexGuard<'_, PhaseState> {
        self.changed
            .wait_while(self.lock(), |s| !ready(s))
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut PhaseState)) {
        f(&mut self.lock());
        self.changed.notify_all();
    }

    // --- Lifecycle ---

    /// Set the run flag for a new acquisition.
    pub fn arm(&self) {
        self.update(|s| {
            s.running = true;
            s.halted = false;
        });
    }

    /// Clear the run flag. Returns `true` if it was set.
    pub fn request_stop(&self) -> bool {
        let mut was_running = false;
        self.update(|s| {
            was_running = s.running;
            s.running = false;
        });
        was_running
    }

    /// Mark the waveform as finished. Wakes every waiter for good.
    pub fn halt(&self) {
        self.update(|s| {
            s.running = false;
            s.halted = true;
        });
    }

    /// Check the run flag.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Check if the generator has exited.
    pub fn is_halted(&self) -> bool {
        self.lock().halted
    }

    /// Block until the generator has exited or `timeout` elapses.
    ///
    /// Returns `true` if halted.
    pub fn wait_halted(&self, timeout: Duration) -> bool {
        let (state, _) = self
            .changed
            .wait_timeout_while(self.lock(), timeout, |s| !s.halted)
            .unwrap_or_else(PoisonError::into_inner);
        state.halted
    }

    // --- Generator side ---

    /// Publish the next phase. `ResetActive` starts a new cycle.
    pub fn publish(&self, phase: WaveformPhase) -> PhaseStamp {
        let mut stamp = PhaseStamp::new(0, phase);
        self.update(|s| {
            if phase == WaveformPhase::ResetActive {
                s.stamp.cycle += 1;
            }
            s.stamp.phase = phase;
            stamp = s.stamp;
        });
        stamp
    }

    /// Most recently published phase.
    pub fn current(&self) -> PhaseStamp {
        self.lock().stamp
    }

    // --- Sampler side ---

    /// Block until a cycle newer than `after` is at its reset or reset
    /// release. A cycle that is already clocking channels is skipped.
    ///
    /// Returns the cycle number, or `None` once stopping.
    pub fn wait_cycle_start(&self, after: u64) -> Option<u64> {
        let state = self.wait_until(|s| {
            !s.running
                || s.halted
                || (s.stamp.cycle > after && s.stamp.phase.ordinal() <= WaveformPhase::Idle.ordinal())
        });
        if !state.running || state.halted {
            None
        } else {
            Some(state.stamp.cycle)
        }
    }

    /// Block until `ClockHigh(channel)` of `cycle` is reached.
    pub fn wait_clock_high(&self, cycle: u64, channel: u8) -> Gate {
        let target = PhaseStamp::new(cycle, WaveformPhase::ClockHigh(channel));
        let state = self.wait_until(|s| !s.running || s.halted || s.stamp >= target);

        if !state.running || state.halted {
            Gate::Closed
        } else if state.stamp == target {
            Gate::Open(ReadWindow { stamp: target, channel })
        } else {
            Gate::Missed(state.stamp)
        }
    }

    /// Block until `ClockLow(channel)` of `cycle` is reached.
    ///
    /// Ignores the run flag: the generator always finishes a clock pulse.
    /// Returns `false` if the generator exited first.
    pub fn wait_clock_low(&self, cycle: u64, channel: u8) -> bool {
        let target = PhaseStamp::new(cycle, WaveformPhase::ClockLow(channel));
        let state = self.wait_until(|s| s.halted || s.stamp >= target);
        state.stamp >= target
    }
}

impl Default for PhaseSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Permission to sample the data lines once, inside one clock-high window.
#[derive(Debug)]
pub struct ReadWindow {
    stamp: PhaseStamp,
    channel: u8,
}

impl ReadWindow {
    /// Channel whose data is on the bus.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Cycle the window belongs to.
    pub fn cycle(&self) -> u64 {
        self.stamp.cycle
    }

    /// Sample the data lines.
    ///
    /// Fails without touching the bus if the window has closed since it was
    /// issued. A sample is also dropped if the window closed while the read
    /// was in progress.
    pub fn read<B: BusDriver + ?Sized>(
        self,
        signal: &PhaseSignal,
        bus: &B,
        task: TaskHandle,
        timeout: Duration,
    ) -> Result<BusSample, SampleError> {
        self.check(signal)?;

        let mut levels = [0u8; BUS_LINE_COUNT];
        bus.read_lines(task, &mut levels, timeout)?;

        self.check(signal)?;
        Ok(BusSample::from_levels(&levels))
    }

    fn check(&self, signal: &PhaseSignal) -> Result<(), SampleError> {
        let now = signal.current();
        if now == self.stamp {
            Ok(())
        } else {
            Err(SampleError::WindowClosed {
                channel: self.channel,
                now,
            })
        }
    }
}
