//! Channel state table.
//!
//! One mutex per tube. The sampler holds a single channel's lock for one
//! decode step; the reporter takes each lock in turn to build a snapshot.
//! Nothing ever holds two channel locks at once.

use std::sync::{Mutex, PoisonError};

use crate::decoder::{decode, ChannelState};
use crate::sample::BusSample;

/// Number of tubes on the bus.
pub const CHANNEL_COUNT: usize = 16;

/// Per-tube decoded state, independently lockable.
pub struct ChannelTable {
    channels: [Mutex<ChannelState>; CHANNEL_COUNT],
}

impl ChannelTable {
    /// Create a table with every channel at its startup state.
    pub fn new() -> Self {
        Self {
            channels: std::array::from_fn(|_| Mutex::new(ChannelState::INITIAL)),
        }
    }

    /// Decode `sample` into `channel` under that channel's lock.
    ///
    /// Returns the new state.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= CHANNEL_COUNT`.
    pub fn apply(&self, channel: usize, sample: BusSample) -> ChannelState {
        let mut state = self.channels[channel]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *state = decode(*state, sample);
        *state
    }

    /// Current state of one channel.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= CHANNEL_COUNT`.
    pub fn get(&self, channel: usize) -> ChannelState {
        *self.channels[channel]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy every channel, locking one at a time.
    ///
    /// Channels are copied in index order, so the snapshot may straddle a
    /// scan cycle: channel 0 can be newer than channel 15.
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            states: std::array::from_fn(|channel| self.get(channel)),
        }
    }
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}

/// One channel in a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelReading {
    /// Zero-based channel index.
    pub index: usize,
    pub position: u8,
    pub feeding: bool,
}

/// Read-only copy of the whole table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableSnapshot {
    states: [ChannelState; CHANNEL_COUNT],
}

impl TableSnapshot {
    /// State of one channel, `None` if out of range.
    pub fn state(&self, channel: usize) -> Option<ChannelState> {
        self.states.get(channel).copied()
    }

    /// All channels in index order.
    pub fn iter(&self) -> impl Iterator<Item = ChannelReading> + '_ {
        self.states.iter().enumerate().map(|(index, state)| ChannelReading {
            index,
            position: state.position,
            feeding: state.feeding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_starts_initial() {
        let table = ChannelTable::new();
        let snapshot = table.snapshot();

        assert_eq!(snapshot.iter().count(), CHANNEL_COUNT);
        assert!(snapshot.iter().all(|r| r.position == 0 && !r.feeding));
    }

    #[test]
    fn test_apply_only_touches_one_channel() {
        let table = ChannelTable::new();

        let state = table.apply(3, BusSample::position(12));
        assert_eq!(state, ChannelState::new(12, false));

        let snapshot = table.snapshot();
        for reading in snapshot.iter() {
            let expected = if reading.index == 3 { 12 } else { 0 };
            assert_eq!(reading.position, expected);
        }
    }

    #[test]
    fn test_apply_uses_prior_state() {
        let table = ChannelTable::new();

        table.apply(0, BusSample::position(1));
        let state = table.apply(0, BusSample::FEEDING);
        assert!(state.feeding);
        assert!(table.get(0).feeding);
    }

    #[test]
    fn test_snapshot_out_of_range() {
        let snapshot = ChannelTable::new().snapshot();
        assert!(snapshot.state(CHANNEL_COUNT).is_none());
        assert_eq!(snapshot.state(0), Some(ChannelState::INITIAL));
    }
}
