//! Acquisition lifecycle.
//!
//! ```text
//! Stopped ──start()──▶ Initializing ──▶ Running ──stop()──▶ Stopping ──▶ Stopped
//!                           │
//!                           └── task acquisition failed ──▶ Stopped
//! ```
//!
//! `start` acquires both tasks before any thread exists; on failure it
//! releases whatever was acquired. `stop` clears the run flag, joins both
//! roles (each finishes its current pulse or channel) and releases both
//! tasks. Stopping twice is a no-op.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::generator::Generator;
use crate::hal::bus::{BusDriver, Direction, TaskHandle};
use crate::logging::{LogConsumer, LogStream};
use crate::sampler::Sampler;
use crate::shared::ScanShared;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Initializing,
    Running,
    Stopping,
}

/// Reading ends of the generator and sampler log streams.
pub struct RoleLogs {
    pub generator: LogConsumer,
    pub sampler: LogConsumer,
}

struct Active {
    input: TaskHandle,
    output: TaskHandle,
    generator: JoinHandle<Result<(), ScanError>>,
    sampler: JoinHandle<()>,
}

/// Owns the bus tasks and the two scan threads.
pub struct ScanEngine<B: BusDriver + 'static> {
    bus: Arc<B>,
    shared: Arc<ScanShared>,
    state: EngineState,
    active: Option<Active>,
    logs: Option<RoleLogs>,
}

impl<B: BusDriver + 'static> ScanEngine<B> {
    pub fn new(bus: Arc<B>, config: ScanConfig) -> Self {
        Self {
            bus,
            shared: Arc::new(ScanShared::new(config)),
            state: EngineState::Stopped,
            active: None,
            logs: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// State shared with the scan threads. The same for every run.
    pub fn shared(&self) -> Arc<ScanShared> {
        Arc::clone(&self.shared)
    }

    /// Log readers of the last started run. Returns `None` if already taken.
    pub fn take_logs(&mut self) -> Option<RoleLogs> {
        self.logs.take()
    }

    /// `true` once the generator has exited, by stop request or by failure.
    pub fn is_halted(&self) -> bool {
        self.shared.phase.is_halted()
    }

    fn transition(&mut self, next: EngineState) {
        debug!("engine: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Acquire the bus tasks and start the generator and sampler.
    pub fn start(&mut self) -> Result<(), ScanError> {
        if self.active.is_some() {
            return Err(ScanError::AlreadyRunning);
        }
        self.transition(EngineState::Initializing);

        let (input, output) = match self.acquire() {
            Ok(tasks) => tasks,
            Err(e) => {
                self.transition(EngineState::Stopped);
                return Err(e);
            }
        };

        self.shared.fault.clear();
        self.shared.phase.arm();

        let (generator_log, generator_reader) = LogStream::new().split();
        let (sampler_log, sampler_reader) = LogStream::new().split();

        // Sampler first, so it is already waiting when cycle 1 starts
        let sampler = Sampler::new(Arc::clone(&self.bus), input, Arc::clone(&self.shared), sampler_log);
        let sampler = match thread::Builder::new()
            .name("sampler".into())
            .spawn(move || sampler.run())
        {
            Ok(handle) => handle,
            Err(source) => {
                self.abort(input, output, None);
                return Err(ScanError::Spawn { role: "sampler", source });
            }
        };

        let generator = Generator::new(Arc::clone(&self.bus), output, Arc::clone(&self.shared), generator_log);
        let generator = match thread::Builder::new()
            .name("generator".into())
            .spawn(move || generator.run())
        {
            Ok(handle) => handle,
            Err(source) => {
                self.abort(input, output, Some(sampler));
                return Err(ScanError::Spawn { role: "generator", source });
            }
        };

        self.logs = Some(RoleLogs {
            generator: generator_reader,
            sampler: sampler_reader,
        });
        self.active = Some(Active {
            input,
            output,
            generator,
            sampler,
        });
        self.transition(EngineState::Running);
        info!(
            "acquisition started: Tb={} data={} control={}",
            self.shared.config.time_base, self.shared.config.data_lines, self.shared.config.control_lines
        );
        Ok(())
    }

    fn acquire(&self) -> Result<(TaskHandle, TaskHandle), ScanError> {
        let config = &self.shared.config;

        let input = self
            .bus
            .acquire_task(Direction::Input, &config.data_lines)
            .map_err(|source| ScanError::Init {
                direction: Direction::Input,
                source,
            })?;

        match self.bus.acquire_task(Direction::Output, &config.control_lines) {
            Ok(output) => Ok((input, output)),
            Err(source) => {
                self.bus.release_task(input);
                Err(ScanError::Init {
                    direction: Direction::Output,
                    source,
                })
            }
        }
    }

    fn abort(&mut self, input: TaskHandle, output: TaskHandle, sampler: Option<JoinHandle<()>>) {
        self.shared.phase.halt();
        if let Some(handle) = sampler {
            let _ = handle.join();
        }
        self.bus.release_task(output);
        self.bus.release_task(input);
        self.transition(EngineState::Stopped);
    }

    /// Stop the acquisition and release the bus tasks.
    ///
    /// Returns the generator's error if it had already failed.
    pub fn stop(&mut self) -> Result<(), ScanError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        self.transition(EngineState::Stopping);

        self.shared.phase.request_stop();

        let generated = active
            .generator
            .join()
            .unwrap_or_else(|_| Err(ScanError::Panicked { role: "generator" }));

        // Wakes the sampler even if the generator died without halting
        self.shared.phase.halt();
        let sampled = active
            .sampler
            .join()
            .map_err(|_| ScanError::Panicked { role: "sampler" });

        self.bus.release_task(active.output);
        self.bus.release_task(active.input);
        self.transition(EngineState::Stopped);

        match &generated {
            Ok(()) => info!(
                "acquisition stopped after {} cycles",
                self.shared.cycles_sampled()
            ),
            Err(e) => warn!("acquisition ended with error: {}", e),
        }
        generated.and(sampled)
    }
}

impl<B: BusDriver + 'static> Drop for ScanEngine<B> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
