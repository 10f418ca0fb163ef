//! In-process model of a multibeam detector.
//!
//! Follows the reset and clock edges written to the output task exactly like
//! the detector's channel counter does: a rising reset edge clears the
//! counter, every rising clock edge selects the next tube, and a read while
//! the clock is high returns the selected tube's lines. Writes sleep for
//! their hold time so the generator runs at real speed.
//!
//! Also used by the tests to script readings, inject read, write and
//! acquisition failures, and inspect every write.

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::channels::CHANNEL_COUNT;
use crate::hal::bus::{
    BusDriver, BusError, Direction, LineSpec, TaskHandle, STATUS_BAD_LENGTH, STATUS_UNAVAILABLE,
};
use crate::sample::{BusSample, ControlLines};

/// Driver status returned by an injected write failure.
pub const INJECTED_WRITE_STATUS: i32 = -50103;

/// One write seen by the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteRecord {
    pub lines: ControlLines,
    pub hold: Duration,
}

struct Task {
    handle: TaskHandle,
    direction: Direction,
    lines: usize,
}

struct DeviceModel {
    next_handle: u32,
    tasks: Vec<Task>,
    lines: ControlLines,
    selected: Option<usize>,
    cycle: u64,
    readings: [BusSample; CHANNEL_COUNT],
    demo: bool,
    read_faults: [u32; CHANNEL_COUNT],
    write_fault: Option<u32>,
    refuse: Option<Direction>,
    recording: Option<Vec<WriteRecord>>,
}

impl DeviceModel {
    fn task(&self, handle: TaskHandle, expected: Direction, len: usize) -> Result<(), BusError> {
        let task = self
            .tasks
            .iter()
            .find(|t| t.handle == handle && t.direction == expected)
            .ok_or(BusError::UnknownTask { task: handle, expected })?;
        if task.lines != len {
            return Err(BusError::Driver {
                task: handle,
                code: STATUS_BAD_LENGTH,
                message: format!("{} values for {} lines", len, task.lines),
            });
        }
        Ok(())
    }

    fn drive(&mut self, next: ControlLines) {
        if next.reset && !self.lines.reset {
            self.cycle += 1;
            self.selected = None;
        }
        if next.clock && !self.lines.clock && !next.reset {
            self.selected = match self.selected {
                None => Some(0),
                Some(ch) if ch + 1 < CHANNEL_COUNT => Some(ch + 1),
                Some(_) => None,
            };
        }
        self.lines = next;
    }

    fn reading(&self, channel: usize) -> BusSample {
        if self.demo {
            demo_reading(channel, self.cycle)
        } else {
            self.readings[channel]
        }
    }
}

/// Slowly walking flies, each stopping at position 1 to feed for a while.
fn demo_reading(channel: usize, cycle: u64) -> BusSample {
    let step = (cycle / 25 + channel as u64 * 5) % 24;
    match step {
        0..=15 => BusSample::position(step as u8),
        16 => BusSample::position(1),
        17..=21 => BusSample::FEEDING,
        _ => BusSample::IDLE,
    }
}

/// Simulated detector implementing [`BusDriver`].
pub struct SimulatedBus {
    model: Mutex<DeviceModel>,
}

impl SimulatedBus {
    /// Detector with every tube reporting all lines low.
    pub fn new() -> Self {
        Self {
            model: Mutex::new(DeviceModel {
                next_handle: 1,
                tasks: Vec::new(),
                lines: ControlLines::RELEASED,
                selected: None,
                cycle: 0,
                readings: [BusSample::IDLE; CHANNEL_COUNT],
                demo: false,
                read_faults: [0; CHANNEL_COUNT],
                write_fault: None,
                refuse: None,
                recording: None,
            }),
        }
    }

    /// Detector with a changing activity pattern on every tube.
    pub fn demo() -> Self {
        let bus = Self::new();
        bus.with_model(|m| m.demo = true);
        bus
    }

    fn with_model<R>(&self, f: impl FnOnce(&mut DeviceModel) -> R) -> R {
        let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut model)
    }

    /// Fix the lines tube `channel` reports. Leaves demo mode.
    pub fn set_tube(&self, channel: usize, sample: BusSample) {
        self.with_model(|m| {
            m.demo = false;
            m.readings[channel] = sample;
        });
    }

    /// Make the next `count` reads of tube `channel` time out.
    pub fn fail_reads(&self, channel: usize, count: u32) {
        self.with_model(|m| m.read_faults[channel] = count);
    }

    /// Fail the write `after` writes from now, once.
    pub fn fail_write_after(&self, after: u32) {
        self.with_model(|m| m.write_fault = Some(after));
    }

    /// Refuse to acquire tasks of `direction`.
    pub fn refuse_acquire(&self, direction: Direction) {
        self.with_model(|m| m.refuse = Some(direction));
    }

    /// Start keeping a record of every write.
    pub fn record_writes(&self) {
        self.with_model(|m| m.recording = Some(Vec::new()));
    }

    /// Writes recorded since [`record_writes`](Self::record_writes).
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.with_model(|m| m.recording.clone().unwrap_or_default())
    }

    /// Levels currently driven on reset and clock.
    pub fn lines(&self) -> ControlLines {
        self.with_model(|m| m.lines)
    }

    /// Number of reset pulses seen.
    pub fn cycle(&self) -> u64 {
        self.with_model(|m| m.cycle)
    }

    /// Number of tasks acquired and not yet released.
    pub fn active_tasks(&self) -> usize {
        self.with_model(|m| m.tasks.len())
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusDriver for SimulatedBus {
    fn acquire_task(&self, direction: Direction, lines: &LineSpec) -> Result<TaskHandle, BusError> {
        self.with_model(|m| {
            if m.refuse == Some(direction) {
                return Err(BusError::Unavailable {
                    direction,
                    lines: lines.to_string(),
                    code: STATUS_UNAVAILABLE,
                });
            }
            let handle = TaskHandle(m.next_handle);
            m.next_handle += 1;
            m.tasks.push(Task {
                handle,
                direction,
                lines: lines.line_count(),
            });
            Ok(handle)
        })
    }

    fn write_lines(&self, task: TaskHandle, values: &[u8], hold: Duration) -> Result<(), BusError> {
        self.with_model(|m| {
            m.task(task, Direction::Output, values.len())?;
            match m.write_fault {
                Some(0) => {
                    m.write_fault = None;
                    return Err(BusError::Driver {
                        task,
                        code: INJECTED_WRITE_STATUS,
                        message: "injected write failure".into(),
                    });
                }
                Some(n) => m.write_fault = Some(n - 1),
                None => {}
            }
            let lines = ControlLines::from_levels(values);
            m.drive(lines);
            if let Some(writes) = m.recording.as_mut() {
                writes.push(WriteRecord { lines, hold });
            }
            Ok(())
        })?;

        if !hold.is_zero() {
            thread::sleep(hold);
        }
        Ok(())
    }

    fn read_lines(&self, task: TaskHandle, values: &mut [u8], timeout: Duration) -> Result<(), BusError> {
        let len = values.len();
        let sample = self.with_model(|m| {
            m.task(task, Direction::Input, len)?;
            let channel = match m.selected {
                Some(ch) if m.lines.clock => ch,
                _ => return Ok(BusSample::IDLE),
            };
            if m.read_faults[channel] > 0 {
                m.read_faults[channel] -= 1;
                return Err(BusError::Timeout { task, timeout });
            }
            Ok(m.reading(channel))
        })?;

        for (value, level) in values.iter_mut().zip(sample.to_levels()) {
            *value = level;
        }
        Ok(())
    }

    fn release_task(&self, task: TaskHandle) {
        self.with_model(|m| m.tasks.retain(|t| t.handle != task));
    }
}
