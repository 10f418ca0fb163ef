//! # MultibeamScan
//!
//! Scanner for a 16-tube multibeam activity detector.
//!
//! ## Architecture
//!
//! The detector multiplexes its tubes over one 5-line data bus, selected by
//! a reset line and a clock line that the host drives:
//!
//! - [`generator`]: writes the reset/clock waveform and publishes each phase
//! - [`sampler`]: reads the bus inside each clock-high window
//! - [`decoder`]: turns a raw sample and the previous state into the next
//! - [`reporter`]: renders the channel table and forwards role logs
//!
//! Generator and sampler meet only at the [`phase::PhaseSignal`]; the bus
//! read is only reachable through the single-use [`phase::ReadWindow`] it
//! hands out, so a read outside a clock-high window cannot be written.

pub mod channels;
pub mod config;
pub mod console;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod fault;
pub mod generator;
pub mod hal;
pub mod logging;
pub mod phase;
pub mod reporter;
pub mod sample;
pub mod sampler;
pub mod shared;

pub use channels::{ChannelTable, TableSnapshot, CHANNEL_COUNT};
pub use config::{ScanConfig, TimeBase};
pub use decoder::{decode, ChannelState};
pub use engine::{EngineState, ScanEngine};
pub use error::{SampleError, ScanError};
pub use fault::{FaultCode, FaultState};
pub use hal::{BusDriver, BusError, SimulatedBus};
pub use sample::{BusSample, ControlLines};
