//! Fault state for the scanner.
//!
//! Two kinds of fault:
//!
//! - **Fatal**: the generator could not drive the control lines. The
//!   acquisition stops, the lines are released, and the fault stays active
//!   until the next start.
//! - **Transient**: one channel could not be sampled in one cycle. The
//!   channel keeps its previous state and the scan goes on; only counters
//!   and the last occurrence are kept.
//!
//! All fields are atomics so any thread can record or read without locking.

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, AtomicU8, Ordering};

/// Fault codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// No fault (normal operation).
    None = 0,

    /// Data read did not complete within its timeout.
    ReadTimeout = 1,

    /// Data read failed for any other reason.
    ReadFailed = 2,

    /// Sampler reached a channel after its clock-high window closed.
    WindowMissed = 3,

    /// Control line write failed. Fatal.
    WriteFailed = 4,
}

impl FaultCode {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => FaultCode::None,
            1 => FaultCode::ReadTimeout,
            2 => FaultCode::ReadFailed,
            3 => FaultCode::WindowMissed,
            4 => FaultCode::WriteFailed,
            _ => FaultCode::None,
        }
    }

    /// Whether this fault ends the acquisition.
    pub fn is_fatal(self) -> bool {
        matches!(self, FaultCode::WriteFailed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::None => "none",
            FaultCode::ReadTimeout => "read timeout",
            FaultCode::ReadFailed => "read failed",
            FaultCode::WindowMissed => "window missed",
            FaultCode::WriteFailed => "write failed",
        }
    }
}

/// Sentinel for "no channel" in `last_channel`.
const NO_CHANNEL: u8 = u8::MAX;

/// Thread-safe fault state.
///
/// # Usage
///
/// ```
/// use multibeam_scan::fault::{FaultCode, FaultState};
///
/// let fault = FaultState::new();
///
/// // Sampler: channel 7 timed out this cycle
/// fault.record(FaultCode::ReadTimeout, 7);
/// assert!(!fault.is_active());
///
/// // Generator: write failed, acquisition over
/// fault.set(FaultCode::WriteFailed, -50103);
/// assert!(fault.is_active());
/// assert_eq!(fault.status(), -50103);
/// ```
pub struct FaultState {
    /// True if a fatal fault is active.
    active: AtomicBool,

    /// Fatal fault code.
    code: AtomicU8,

    /// Driver status of the fatal fault.
    status: AtomicI32,

    /// Total fatal fault count since process start (never cleared).
    count: AtomicU32,

    read_timeouts: AtomicU64,
    read_failures: AtomicU64,
    window_misses: AtomicU64,

    last_transient: AtomicU8,
    last_channel: AtomicU8,
}

impl FaultState {
    /// Create new fault state (no fault).
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            code: AtomicU8::new(0),
            status: AtomicI32::new(0),
            count: AtomicU32::new(0),
            read_timeouts: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            window_misses: AtomicU64::new(0),
            last_transient: AtomicU8::new(0),
            last_channel: AtomicU8::new(NO_CHANNEL),
        }
    }

    /// Set a fatal fault with the driver status that caused it.
    #[inline]
    pub fn set(&self, code: FaultCode, status: i32) {
        self.code.store(code as u8, Ordering::Release);
        self.status.store(status, Ordering::Release);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    /// Record a transient fault on one channel.
    #[inline]
    pub fn record(&self, code: FaultCode, channel: u8) {
        let counter = match code {
            FaultCode::ReadTimeout => &self.read_timeouts,
            FaultCode::ReadFailed => &self.read_failures,
            FaultCode::WindowMissed => &self.window_misses,
            FaultCode::None | FaultCode::WriteFailed => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.last_channel.store(channel, Ordering::Relaxed);
        self.last_transient.store(code as u8, Ordering::Release);
    }

    /// Check if a fatal fault is currently active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Fatal fault code (only meaningful if `is_active()` is true).
    #[inline]
    pub fn code(&self) -> FaultCode {
        FaultCode::from_u8(self.code.load(Ordering::Acquire))
    }

    /// Driver status of the fatal fault.
    #[inline]
    pub fn status(&self) -> i32 {
        self.status.load(Ordering::Acquire)
    }

    /// Total fatal fault count.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Total transient faults of all kinds.
    pub fn transient_total(&self) -> u64 {
        self.read_timeouts.load(Ordering::Relaxed)
            + self.read_failures.load(Ordering::Relaxed)
            + self.window_misses.load(Ordering::Relaxed)
    }

    /// Clear the active flag before a new acquisition.
    ///
    /// Counters are kept.
    #[inline]
    pub fn clear(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Get a snapshot of the current fault state.
    pub fn snapshot(&self) -> FaultSnapshot {
        let channel = self.last_channel.load(Ordering::Relaxed);
        FaultSnapshot {
            active: self.is_active(),
            code: self.code(),
            status: self.status(),
            count: self.count(),
            read_timeouts: self.read_timeouts.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            window_misses: self.window_misses.load(Ordering::Relaxed),
            last_transient: FaultCode::from_u8(self.last_transient.load(Ordering::Acquire)),
            last_channel: (channel != NO_CHANNEL).then_some(channel),
        }
    }
}

impl Default for FaultState {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of fault state at a point in time.
#[derive(Clone, Copy, Debug)]
pub struct FaultSnapshot {
    pub active: bool,
    pub code: FaultCode,
    pub status: i32,
    pub count: u32,
    pub read_timeouts: u64,
    pub read_failures: u64,
    pub window_misses: u64,
    pub last_transient: FaultCode,
    pub last_channel: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_state_basic() {
        let fault = FaultState::new();

        assert!(!fault.is_active());
        assert_eq!(fault.code(), FaultCode::None);
        assert_eq!(fault.count(), 0);

        fault.set(FaultCode::WriteFailed, -200);

        assert!(fault.is_active());
        assert_eq!(fault.code(), FaultCode::WriteFailed);
        assert_eq!(fault.status(), -200);
        assert_eq!(fault.count(), 1);

        fault.clear();

        assert!(!fault.is_active());
        assert_eq!(fault.count(), 1); // Count preserved
    }

    #[test]
    fn test_transient_faults_never_activate() {
        let fault = FaultState::new();

        fault.record(FaultCode::ReadTimeout, 7);
        fault.record(FaultCode::ReadTimeout, 7);
        fault.record(FaultCode::WindowMissed, 2);

        let snap = fault.snapshot();
        assert!(!snap.active);
        assert_eq!(snap.read_timeouts, 2);
        assert_eq!(snap.window_misses, 1);
        assert_eq!(snap.last_transient, FaultCode::WindowMissed);
        assert_eq!(snap.last_channel, Some(2));
        assert_eq!(fault.transient_total(), 3);
    }

    #[test]
    fn test_record_ignores_fatal_codes() {
        let fault = FaultState::new();
        fault.record(FaultCode::WriteFailed, 1);
        fault.record(FaultCode::None, 1);

        let snap = fault.snapshot();
        assert_eq!(fault.transient_total(), 0);
        assert_eq!(snap.last_channel, None);
    }

    #[test]
    fn test_from_u8_roundtrip() {
        for code in [
            FaultCode::None,
            FaultCode::ReadTimeout,
            FaultCode::ReadFailed,
            FaultCode::WindowMissed,
            FaultCode::WriteFailed,
        ] {
            assert_eq!(FaultCode::from_u8(code as u8), code);
        }
        assert_eq!(FaultCode::from_u8(99), FaultCode::None);
        assert!(FaultCode::WriteFailed.is_fatal());
        assert!(!FaultCode::ReadTimeout.is_fatal());
    }
}
