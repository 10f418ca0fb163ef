//! State shared by every role of one scanner.
//!
//! Handed out as `Arc<ScanShared>` at spawn time; there are no globals.

use core::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::channels::ChannelTable;
use crate::config::ScanConfig;
use crate::fault::FaultState;
use crate::phase::PhaseSignal;

pub struct ScanShared {
    pub config: ScanConfig,
    pub phase: PhaseSignal,
    pub table: ChannelTable,
    pub fault: FaultState,
    started: Instant,
    cycles_sampled: AtomicU64,
}

impl ScanShared {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            phase: PhaseSignal::new(),
            table: ChannelTable::new(),
            fault: FaultState::new(),
            started: Instant::now(),
            cycles_sampled: AtomicU64::new(0),
        }
    }

    /// Microseconds since the scanner was created. Log timestamp base.
    pub fn elapsed_us(&self) -> i64 {
        i64::try_from(self.started.elapsed().as_micros()).unwrap_or(i64::MAX)
    }

    /// Cycles in which the sampler decoded at least one channel.
    pub fn cycles_sampled(&self) -> u64 {
        self.cycles_sampled.load(Ordering::Relaxed)
    }

    pub(crate) fn count_cycle(&self) {
        self.cycles_sampled.fetch_add(1, Ordering::Relaxed);
    }
}
