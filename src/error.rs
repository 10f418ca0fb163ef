//! Scan error types.

use std::io;

use thiserror::Error;

use crate::fault::FaultCode;
use crate::hal::bus::{BusError, Direction};
use crate::phase::PhaseStamp;

/// Errors that end an acquisition.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A task could not be acquired. Nothing was started.
    #[error("failed to acquire {direction} task: {source}")]
    Init {
        direction: Direction,
        #[source]
        source: BusError,
    },

    /// The generator could not drive the control lines.
    #[error("control write failed at {at}: {source}")]
    Write {
        at: PhaseStamp,
        #[source]
        source: BusError,
    },

    /// A scan thread could not be spawned.
    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: io::Error,
    },

    /// A scan thread panicked.
    #[error("{role} thread panicked")]
    Panicked { role: &'static str },

    /// `start` called while an acquisition is already active.
    #[error("acquisition already running")]
    AlreadyRunning,
}

impl ScanError {
    /// Process exit code: the driver status when there is one, 1 otherwise.
    ///
    /// Only the low 8 bits of an exit status survive on Unix, so a status
    /// that would read as 0 there is reported as 1.
    pub fn exit_code(&self) -> i32 {
        let code = match self {
            ScanError::Init { source, .. } | ScanError::Write { source, .. } => source.code(),
            _ => 1,
        };
        if code & 0xff == 0 {
            1
        } else {
            code
        }
    }
}

/// Per-channel sampling failure. Never ends the acquisition.
#[derive(Error, Debug)]
pub enum SampleError {
    /// The clock-high window closed before or during the read.
    #[error("read window for channel {channel} closed (now at {now})")]
    WindowClosed { channel: u8, now: PhaseStamp },

    /// The driver failed the read.
    #[error(transparent)]
    Bus(#[from] BusError),
}

impl SampleError {
    /// Fault code recorded for this failure.
    pub fn fault_code(&self) -> FaultCode {
        match self {
            SampleError::WindowClosed { .. } => FaultCode::WindowMissed,
            SampleError::Bus(BusError::Timeout { .. }) => FaultCode::ReadTimeout,
            SampleError::Bus(_) => FaultCode::ReadFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::hal::bus::{TaskHandle, STATUS_TIMEOUT};
    use crate::phase::WaveformPhase;

    #[test]
    fn test_exit_code_uses_driver_status() {
        let err = ScanError::Write {
            at: PhaseStamp::new(3, WaveformPhase::ClockHigh(2)),
            source: BusError::Driver {
                task: TaskHandle(2),
                code: -50103,
                message: "device removed".into(),
            },
        };
        assert_eq!(err.exit_code(), -50103);
        assert!(err.to_string().contains("cycle 3 clock-high(2)"));
    }

    #[test]
    fn test_exit_code_never_zero() {
        let err = ScanError::Init {
            direction: Direction::Output,
            source: BusError::Driver {
                task: TaskHandle(0),
                code: 0,
                message: String::new(),
            },
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(ScanError::AlreadyRunning.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_not_truncated_to_zero() {
        for code in [256, -512, 0x1_0000] {
            let err = ScanError::Init {
                direction: Direction::Input,
                source: BusError::Unavailable {
                    direction: Direction::Input,
                    lines: "Dev1/port0/line0:4".into(),
                    code,
                },
            };
            assert_eq!(err.exit_code(), 1, "status {}", code);
        }
    }

    #[test]
    fn test_sample_fault_codes() {
        let timeout = SampleError::from(BusError::Timeout {
            task: TaskHandle(1),
            timeout: Duration::from_millis(1),
        });
        assert_eq!(timeout.fault_code(), FaultCode::ReadTimeout);
        if let SampleError::Bus(inner) = &timeout {
            assert_eq!(inner.code(), STATUS_TIMEOUT);
        }

        let missed = SampleError::WindowClosed {
            channel: 4,
            now: PhaseStamp::new(1, WaveformPhase::ClockLow(4)),
        };
        assert_eq!(missed.fault_code(), FaultCode::WindowMissed);
    }
}
