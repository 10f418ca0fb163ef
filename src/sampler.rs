//! Phase-synchronized bus sampler.
//!
//! Follows the generator one channel at a time: wait for the channel's
//! clock-high window, let the bus settle for one `Tb`, read once, decode
//! into the channel table, then wait for the clock to drop before moving on.
//!
//! Read problems never stop the scan. The channel keeps its previous state,
//! the fault counters are bumped, and a warning goes to the sampler's log
//! stream.

use std::sync::Arc;
use std::thread;

use crate::channels::CHANNEL_COUNT;
use crate::decoder::ChannelState;
use crate::fault::FaultCode;
use crate::hal::bus::{BusDriver, TaskHandle};
use crate::logging::LogProducer;
use crate::phase::Gate;
use crate::shared::ScanShared;
use crate::{rt_debug, rt_info, rt_warn};

/// What happened to one channel in one cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelOutcome {
    /// Sample read and decoded.
    Decoded(ChannelState),
    /// No sample this cycle; the channel kept its state.
    Skipped(FaultCode),
    /// Acquisition is stopping.
    Closed,
}

pub struct Sampler<B: BusDriver + ?Sized> {
    bus: Arc<B>,
    input: TaskHandle,
    shared: Arc<ScanShared>,
    log: LogProducer,
}

impl<B: BusDriver + ?Sized> Sampler<B> {
    pub fn new(bus: Arc<B>, input: TaskHandle, shared: Arc<ScanShared>, log: LogProducer) -> Self {
        Self {
            bus,
            input,
            shared,
            log,
        }
    }

    /// Sample every cycle from the next reset on, until stopped.
    pub fn run(mut self) {
        let ts = self.shared.elapsed_us();
        rt_info!(self.log, ts, "sampler: started");

        let mut last = self.shared.phase.current().cycle;
        let mut scanned = None;
        while let Some(cycle) = self.shared.phase.wait_cycle_start(last) {
            if scanned.is_some_and(|prev| cycle > prev + 1) {
                let ts = self.shared.elapsed_us();
                rt_warn!(self.log, ts, "sampler: fell behind, skipped to cycle {}", cycle);
            }
            last = cycle;
            scanned = Some(cycle);
            if !self.scan_cycle(cycle) {
                break;
            }
        }

        let ts = self.shared.elapsed_us();
        rt_info!(self.log, ts, "sampler: stopped after cycle {}", last);
    }

    /// Visit channels 0-15 of `cycle`. Returns `false` once stopping.
    ///
    /// The cycle is counted as sampled only if at least one channel was
    /// decoded.
    pub fn scan_cycle(&mut self, cycle: u64) -> bool {
        let mut decoded = 0;
        for channel in 0..CHANNEL_COUNT as u8 {
            match self.sample_channel(cycle, channel) {
                ChannelOutcome::Closed => return false,
                ChannelOutcome::Decoded(_) => decoded += 1,
                ChannelOutcome::Skipped(_) => {}
            }
            // Next channel only after this clock pulse is over
            if !self.shared.phase.wait_clock_low(cycle, channel) {
                return false;
            }
        }

        let ts = self.shared.elapsed_us();
        if decoded > 0 {
            self.shared.count_cycle();
            rt_debug!(self.log, ts, "sampler: cycle {} done, {} channels", cycle, decoded);
        } else {
            rt_warn!(self.log, ts, "sampler: cycle {} had no readable channel", cycle);
        }
        true
    }

    /// Read and decode one channel inside its clock-high window.
    ///
    /// Returns as soon as the sample is decoded; does not wait for the
    /// clock to drop.
    pub fn sample_channel(&mut self, cycle: u64, channel: u8) -> ChannelOutcome {
        let window = match self.shared.phase.wait_clock_high(cycle, channel) {
            Gate::Open(window) => window,
            Gate::Missed(now) => {
                self.shared.fault.record(FaultCode::WindowMissed, channel);
                let ts = self.shared.elapsed_us();
                rt_warn!(self.log, ts, "sampler: ch{} missed window (now {})", channel, now);
                return ChannelOutcome::Skipped(FaultCode::WindowMissed);
            }
            Gate::Closed => return ChannelOutcome::Closed,
        };

        thread::sleep(self.shared.config.settle());

        let timeout = self.shared.config.read_timeout();
        match window.read(&self.shared.phase, &*self.bus, self.input, timeout) {
            Ok(sample) => ChannelOutcome::Decoded(self.shared.table.apply(channel as usize, sample)),
            Err(e) => {
                let code = e.fault_code();
                self.shared.fault.record(code, channel);
                let ts = self.shared.elapsed_us();
                rt_warn!(self.log, ts, "sampler: ch{} cycle {}: {}", channel, cycle, e);
                ChannelOutcome::Skipped(code)
            }
        }
    }
}
