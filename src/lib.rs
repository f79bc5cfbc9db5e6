//! Cycle-accurate model of a hardware matrix multiplication accelerator
//! behind a memory-mapped register window.
//!
//! The interesting part is not the arithmetic but the timing: the operand
//! memories have a one-cycle registered read, the multiply-accumulate unit
//! has a one-cycle result latency, and the controller FSM absorbs both
//! while keeping the result write address stable for the full tick it is
//! asserted. See [`framework`] for the two-phase tick model and [`ctrl`]
//! for the state machine.

pub mod bridge;
pub mod ctrl;
pub mod driver;
pub mod framework;
pub mod geom;
pub mod units;

pub use bridge::{AccelBridge, BusReq};
pub use driver::{AccelDriver, DriverError};
pub use framework::AccelSim;
pub use geom::Geometry;
