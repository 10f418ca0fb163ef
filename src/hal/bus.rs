//! Digital line driver interface.
//!
//! The scanner talks to the acquisition hardware only through [`BusDriver`]:
//! acquire a task for a group of lines, write levels and hold them, read
//! levels with a timeout, release the task. Every call blocks the calling
//! thread for its whole duration.

use core::fmt;
use std::time::Duration;

use thiserror::Error;

/// Driver status for a read that ran out of time.
pub const STATUS_TIMEOUT: i32 = -200;

/// Driver status for an operation on a task that was never acquired.
pub const STATUS_UNKNOWN_TASK: i32 = -201;

/// Driver status for lines that could not be reserved.
pub const STATUS_UNAVAILABLE: i32 = -202;

/// Driver status for a buffer whose length is not the task's line count.
pub const STATUS_BAD_LENGTH: i32 = -203;

/// Opaque handle to an acquired group of lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub u32);

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Line direction of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// A contiguous group of lines on one port, e.g. `Dev1/port0/line0:4`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineSpec {
    pub device: String,
    pub port: u8,
    pub first_line: u8,
    pub count: u8,
}

impl LineSpec {
    pub fn new(device: impl Into<String>, port: u8, first_line: u8, count: u8) -> Self {
        Self {
            device: device.into(),
            port,
            first_line,
            count,
        }
    }

    /// Number of lines in the group.
    pub fn line_count(&self) -> usize {
        self.count as usize
    }
}

impl fmt::Display for LineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/port{}/line{}", self.device, self.port, self.first_line)?;
        if self.count > 1 {
            write!(f, ":{}", self.first_line as u16 + self.count as u16 - 1)?;
        }
        Ok(())
    }
}

/// Errors reported by a bus driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Lines could not be reserved.
    #[error("cannot acquire {direction} lines {lines} (driver status {code})")]
    Unavailable {
        direction: Direction,
        lines: String,
        code: i32,
    },

    /// Operation on a handle the driver does not know, or of the wrong direction.
    #[error("{task} is not an acquired {expected} task")]
    UnknownTask { task: TaskHandle, expected: Direction },

    /// Read did not complete within its timeout.
    #[error("read on {task} timed out after {timeout:?}")]
    Timeout { task: TaskHandle, timeout: Duration },

    /// Any other driver failure.
    #[error("driver status {code} on {task}: {message}")]
    Driver {
        task: TaskHandle,
        code: i32,
        message: String,
    },
}

impl BusError {
    /// Driver status code for this error.
    pub fn code(&self) -> i32 {
        match self {
            BusError::Unavailable { code, .. } => *code,
            BusError::UnknownTask { .. } => STATUS_UNKNOWN_TASK,
            BusError::Timeout { .. } => STATUS_TIMEOUT,
            BusError::Driver { code, .. } => *code,
        }
    }
}

/// Blocking digital I/O service.
///
/// Implementations must be shareable between the generator and sampler
/// threads. Calls on different tasks may run concurrently.
pub trait BusDriver: Send + Sync {
    /// Reserve a group of lines for input or output.
    fn acquire_task(&self, direction: Direction, lines: &LineSpec) -> Result<TaskHandle, BusError>;

    /// Drive `values` (one byte per line, in line order) and hold them for
    /// `hold` before returning.
    fn write_lines(&self, task: TaskHandle, values: &[u8], hold: Duration) -> Result<(), BusError>;

    /// Sample the lines into `values` (one byte per line, in line order),
    /// giving up after `timeout`.
    fn read_lines(&self, task: TaskHandle, values: &mut [u8], timeout: Duration) -> Result<(), BusError>;

    /// Stop and free a task. Releasing an unknown task is a no-op.
    fn release_task(&self, task: TaskHandle);
}
