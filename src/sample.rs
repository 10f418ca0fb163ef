//! Module: sample
//!
//! Purpose: Raw line levels exchanged with the bus adapter. One `BusSample`
//! is what the detector drives onto the five data lines for the tube whose
//! clock pulse is active; one `ControlLines` is what the scanner drives onto
//! the reset and clock lines.
//!
//! Architecture:
//! - One byte per sample, bit `n` = data line `P0.n`
//! - Adapters exchange one byte per line (`0` low, non-zero high), the
//!   helpers here convert both ways
//!
//! Safety: Safe. No unsafe blocks. Copy types only.

/// Number of data lines on the shared bus (D0-D3 plus DV).
pub const BUS_LINE_COUNT: usize = 5;

/// Number of control lines (reset, clock).
pub const CONTROL_LINE_COUNT: usize = 2;

/// Levels of the five data lines sampled during one clock-high window.
///
/// Bit layout:
/// - Bits 0-3: D0-D3, the 4-bit beam position (D0 least significant)
/// - Bit 4: DV, data-valid flag (high while the fly blocks the feeding beam)
/// - Bits 5-7: unused, always zero
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusSample(u8);

impl BusSample {
    /// D0-D3 mask.
    pub const POSITION_MASK: u8 = 0x0F;

    /// DV bit mask (bit 4).
    pub const DV: u8 = 0x10;

    /// All lines low.
    pub const IDLE: Self = Self(0);

    /// DV high with all position bits low: the feeding pattern.
    pub const FEEDING: Self = Self(Self::DV);

    /// Create from raw bits. Bits above DV are discarded.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & (Self::POSITION_MASK | Self::DV))
    }

    /// DV low with the given position on D0-D3.
    pub const fn position(position: u8) -> Self {
        Self(position & Self::POSITION_MASK)
    }

    /// Build from one byte per line, in line order D0, D1, D2, D3, DV.
    pub fn from_levels(levels: &[u8; BUS_LINE_COUNT]) -> Self {
        let bits = levels
            .iter()
            .enumerate()
            .fold(0u8, |acc, (line, &level)| if level != 0 { acc | (1 << line) } else { acc });
        Self(bits)
    }

    /// One byte per line, in line order D0, D1, D2, D3, DV.
    pub fn to_levels(self) -> [u8; BUS_LINE_COUNT] {
        let mut levels = [0u8; BUS_LINE_COUNT];
        for (line, level) in levels.iter_mut().enumerate() {
            *level = (self.0 >> line) & 1;
        }
        levels
    }

    /// Raw bits value.
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Level of data line `line` (0-4) as 0 or 1.
    pub const fn line(&self, line: usize) -> u8 {
        (self.0 >> line) & 1
    }

    /// DV flag.
    pub const fn dv(&self) -> bool {
        (self.0 & Self::DV) != 0
    }

    /// The 4-bit value on D0-D3.
    pub const fn position_bits(&self) -> u8 {
        self.0 & Self::POSITION_MASK
    }
}

/// Levels driven onto the reset (P1.0) and clock (P1.1) lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlLines {
    pub reset: bool,
    pub clock: bool,
}

impl ControlLines {
    /// Both lines low. The bus is left in this state between scans.
    pub const RELEASED: Self = Self { reset: false, clock: false };

    /// Reset asserted, clock low.
    pub const RESET: Self = Self { reset: true, clock: false };

    /// Clock asserted, reset low.
    pub const CLOCK: Self = Self { reset: false, clock: true };

    /// One byte per line, in line order reset, clock.
    pub const fn to_levels(self) -> [u8; CONTROL_LINE_COUNT] {
        [self.reset as u8, self.clock as u8]
    }

    /// Build from one byte per line, in line order reset, clock.
    pub fn from_levels(levels: &[u8]) -> Self {
        Self {
            reset: levels.first().is_some_and(|&l| l != 0),
            clock: levels.get(1).is_some_and(|&l| l != 0),
        }
    }

    /// Check if both lines are low.
    pub const fn is_released(&self) -> bool {
        !self.reset && !self.clock
    }
}

// ============================================================================
// Tests
// ============================================================================
