//! Module: config
//!
//! Purpose: Acquisition configuration.
//!
//! - [`TimeBase`]: the clock time base `Tb`, chosen from a fixed menu
//! - [`ScanConfig`]: time base plus the data and control line groups
//!
//! Every waveform duration is derived from `Tb`; nothing else is tunable.

use core::fmt;
use std::time::Duration;

use crate::hal::bus::LineSpec;
use crate::sample::{BUS_LINE_COUNT, CONTROL_LINE_COUNT};

/// Clock time base `Tb`, in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeBase(f64);

impl TimeBase {
    /// Used when the menu choice is missing or invalid (0.2 ms).
    pub const DEFAULT: Self = Self(0.0002);

    /// Menu entries, in seconds: 0.01 ms, 0.1 ms, 1 ms, 10 ms.
    pub const MENU: [Self; 4] = [Self(0.00001), Self(0.0001), Self(0.001), Self(0.01)];

    /// Time base for menu entry 1-4.
    pub fn from_menu_index(index: u8) -> Option<Self> {
        match index {
            1..=4 => Some(Self::MENU[index as usize - 1]),
            _ => None,
        }
    }

    /// Menu selection typed at the prompt.
    ///
    /// The first whitespace-separated token must be exactly `1`..`4`.
    pub fn parse_choice(line: &str) -> Option<Self> {
        let index = match line.split_whitespace().next()? {
            "1" => 1,
            "2" => 2,
            "3" => 3,
            "4" => 4,
            _ => return None,
        };
        Self::from_menu_index(index)
    }

    /// Like [`parse_choice`](Self::parse_choice), falling back to
    /// [`TimeBase::DEFAULT`].
    pub fn from_choice(line: &str) -> Self {
        Self::parse_choice(line).unwrap_or(Self::DEFAULT)
    }

    /// Arbitrary time base. Returns `None` unless `secs` is finite and > 0.
    pub fn from_secs(secs: f64) -> Option<Self> {
        (secs.is_finite() && secs > 0.0).then_some(Self(secs))
    }

    pub fn secs(&self) -> f64 {
        self.0
    }

    /// One `Tb`.
    pub fn period(&self) -> Duration {
        self.half_periods(2)
    }

    /// `n` half periods (`n · Tb / 2`).
    ///
    /// Rounded to the nanosecond.
    pub fn half_periods(&self, n: u32) -> Duration {
        let nanos = self.0 * 1e9 * n as f64 / 2.0;
        Duration::from_nanos(nanos.round() as u64)
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0 * 1000.0)
    }
}

/// Everything an acquisition needs.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanConfig {
    pub time_base: TimeBase,
    /// D0-D3 and DV, in bit order.
    pub data_lines: LineSpec,
    /// Reset then clock.
    pub control_lines: LineSpec,
}

impl ScanConfig {
    /// Standard wiring on `device`: data on port 0, control on port 1.
    pub fn new(device: &str, time_base: TimeBase) -> Self {
        Self {
            time_base,
            data_lines: LineSpec::new(device, 0, 0, BUS_LINE_COUNT as u8),
            control_lines: LineSpec::new(device, 1, 0, CONTROL_LINE_COUNT as u8),
        }
    }

    /// Delay between the clock-high edge and the data read (1 `Tb`).
    pub fn settle(&self) -> Duration {
        self.time_base.period()
    }

    /// Data read timeout (2 `Tb`).
    pub fn read_timeout(&self) -> Duration {
        self.time_base.half_periods(4)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new("Dev1", TimeBase::DEFAULT)
    }
}
