//! Reset/clock waveform generator.
//!
//! Sole writer of the control lines and of the phase signal. One scan cycle:
//!
//! ```text
//!            ┌──────┐
//! RESET  ────┘ 3 Tb └──────────────────────────────────────────────
//!                          ┌──────┐      ┌──────┐            ┌──────┐
//! CLOCK  ──────────────────┘2.5 Tb└2.5 Tb┘      └─── ... ────┘      └──
//!                   1 Tb    ch 0          ch 1                ch 15
//! ```
//!
//! 3 + 1 + 16 × 5 = 84 `Tb` per cycle.
//!
//! Each phase is published before its levels are written, so the sampler
//! may see `ClockHigh(n)` a few microseconds before the clock edge; it
//! waits one `Tb` to settle before reading.
//!
//! The run flag is only checked after a pulse has been completed (lines
//! back to released). A stop request never truncates a pulse.

use std::sync::Arc;
use std::time::Duration;

use crate::channels::CHANNEL_COUNT;
use crate::config::TimeBase;
use crate::error::ScanError;
use crate::fault::FaultCode;
use crate::hal::bus::{BusDriver, TaskHandle};
use crate::logging::LogProducer;
use crate::phase::WaveformPhase;
use crate::sample::ControlLines;
use crate::shared::ScanShared;
use crate::{rt_debug, rt_error, rt_info};

/// Reset high, in half `Tb`.
pub const RESET_HOLD: u32 = 6;

/// Released after reset, in half `Tb`.
pub const RESET_RELEASE_HOLD: u32 = 2;

/// Clock high, in half `Tb`.
pub const CLOCK_HIGH_HOLD: u32 = 5;

/// Clock low, in half `Tb`.
pub const CLOCK_LOW_HOLD: u32 = 5;

/// Full cycle, in half `Tb`.
pub const CYCLE_HALF_PERIODS: u32 =
    RESET_HOLD + RESET_RELEASE_HOLD + CHANNEL_COUNT as u32 * (CLOCK_HIGH_HOLD + CLOCK_LOW_HOLD);

/// One write of the control lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PulseStep {
    pub phase: WaveformPhase,
    pub lines: ControlLines,
    pub half_periods: u32,
    /// Lines are back to released after this step.
    pub ends_pulse: bool,
}

impl PulseStep {
    /// Hold time at time base `tb`.
    pub fn hold(&self, tb: TimeBase) -> Duration {
        tb.half_periods(self.half_periods)
    }
}

/// The write sequence of one scan cycle.
pub fn cycle_schedule() -> impl Iterator<Item = PulseStep> {
    let reset = [
        PulseStep {
            phase: WaveformPhase::ResetActive,
            lines: ControlLines::RESET,
            half_periods: RESET_HOLD,
            ends_pulse: false,
        },
        PulseStep {
            phase: WaveformPhase::Idle,
            lines: ControlLines::RELEASED,
            half_periods: RESET_RELEASE_HOLD,
            ends_pulse: true,
        },
    ];

    let clocks = (0..CHANNEL_COUNT as u8).flat_map(|ch| {
        [
            PulseStep {
                phase: WaveformPhase::ClockHigh(ch),
                lines: ControlLines::CLOCK,
                half_periods: CLOCK_HIGH_HOLD,
                ends_pulse: false,
            },
            PulseStep {
                phase: WaveformPhase::ClockLow(ch),
                lines: ControlLines::RELEASED,
                half_periods: CLOCK_LOW_HOLD,
                ends_pulse: true,
            },
        ]
    });

    reset.into_iter().chain(clocks)
}

/// Drives the waveform until stopped.
pub struct Generator<B: BusDriver + ?Sized> {
    bus: Arc<B>,
    output: TaskHandle,
    shared: Arc<ScanShared>,
    log: LogProducer,
}

impl<B: BusDriver + ?Sized> Generator<B> {
    pub fn new(bus: Arc<B>, output: TaskHandle, shared: Arc<ScanShared>, log: LogProducer) -> Self {
        Self {
            bus,
            output,
            shared,
            log,
        }
    }

    /// Run cycles until the run flag is cleared or a write fails.
    ///
    /// Always marks the phase signal halted on the way out, so the sampler
    /// can never wait on a phase that will not come.
    pub fn run(mut self) -> Result<(), ScanError> {
        let ts = self.shared.elapsed_us();
        rt_info!(self.log, ts, "generator: started, Tb={}", self.shared.config.time_base);

        let result = self.emit();

        if let Err(ScanError::Write { at, source }) = &result {
            self.shared.fault.set(FaultCode::WriteFailed, source.code());
            let ts = self.shared.elapsed_us();
            rt_error!(self.log, ts, "generator: write failed at {}: {}", at, source);

            // Best effort: leave the detector with both lines low
            let _ = self.bus.write_lines(
                self.output,
                &ControlLines::RELEASED.to_levels(),
                Duration::ZERO,
            );
        }

        self.shared.phase.halt();
        let ts = self.shared.elapsed_us();
        rt_info!(self.log, ts, "generator: stopped at {}", self.shared.phase.current());
        result
    }

    fn emit(&mut self) -> Result<(), ScanError> {
        let tb = self.shared.config.time_base;

        loop {
            for step in cycle_schedule() {
                let at = self.shared.phase.publish(step.phase);
                if step.phase == WaveformPhase::ResetActive {
                    let ts = self.shared.elapsed_us();
                    rt_debug!(self.log, ts, "generator: cycle {}", at.cycle);
                }

                self.bus
                    .write_lines(self.output, &step.lines.to_levels(), step.hold(tb))
                    .map_err(|source| ScanError::Write { at, source })?;

                if step.ends_pulse && !self.shared.phase.is_running() {
                    return Ok(());
                }
            }
        }
    }
}
