//! Tube channel decoder.
//!
//! Pure logic, no hardware dependencies. Consumes the previous channel state
//! and one bus sample, produces the next channel state. Fully testable on
//! host.
//!
//! # Line semantics
//!
//! - **DV low**: D0-D3 carry the beam position of the fly in the tube.
//! - **DV high, D0-D3 low**: the fly is at the food end. This only counts as
//!   feeding when the last reported position was 1.
//!
//! The feeding flag is a latch: with DV high and the precondition unmet the
//! previous state is kept as is, including a previously set feeding flag.

use crate::sample::BusSample;

/// Position that precedes feeding.
pub const FEEDING_POSITION: u8 = 1;

/// Decoded state of one tube.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelState {
    /// Last decoded beam position (0-15).
    pub position: u8,

    /// Feeding latch.
    pub feeding: bool,
}

impl ChannelState {
    /// Startup state: position 0, not feeding.
    pub const INITIAL: Self = Self { position: 0, feeding: false };

    /// Create a state with the given position and feeding flag.
    pub const fn new(position: u8, feeding: bool) -> Self {
        Self { position, feeding }
    }
}

/// Compute the next channel state from the previous one and a bus sample.
///
/// # Example
///
/// ```
/// use multibeam_scan::decoder::{decode, ChannelState};
/// use multibeam_scan::sample::BusSample;
///
/// let moving = decode(ChannelState::INITIAL, BusSample::position(1));
/// assert_eq!(moving.position, 1);
///
/// let feeding = decode(moving, BusSample::FEEDING);
/// assert!(feeding.feeding);
/// assert_eq!(feeding.position, 1);
/// ```
#[inline]
pub fn decode(prev: ChannelState, sample: BusSample) -> ChannelState {
    if !sample.dv() {
        return ChannelState {
            position: sample.position_bits(),
            feeding: false,
        };
    }

    if sample.position_bits() == 0 && prev.position == FEEDING_POSITION {
        ChannelState {
            position: prev.position,
            feeding: true,
        }
    } else {
        prev
    }
}
