//! Hardware Abstraction Layer.
//!
//! The scan logic only sees [`BusDriver`]. Business logic stays in core
//! modules, HAL is just I/O.

pub mod bus;
pub mod sim;

pub use bus::{BusDriver, BusError, Direction, LineSpec, TaskHandle};
pub use sim::SimulatedBus;
