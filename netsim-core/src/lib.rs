//! A deterministic, tick-driven Ethernet/IP network simulator.
//!
//! Everything here runs in lockstep ticks with no real concurrency: one
//! [`SimRng`](rng::SimRng) drives every random choice, so two
//! [`Simulation`](simulation::Simulation)s built from the same seed and
//! topology produce byte-identical traces. See `DESIGN.md` for how each
//! module is grounded and `SPEC_FULL.md` for the full requirements this
//! crate implements.

pub mod addr;
pub mod application;
pub mod device;
pub mod error;
pub mod hardware;
pub mod packet;
pub mod rng;
pub mod simulation;
pub mod snapshot;
pub mod stack;

pub use error::{Result, SimError};
pub use rng::SimRng;
pub use simulation::Simulation;
