//! Interfaces and the cables that connect them.

mod cable;
mod interface;

pub use cable::{Cable, CableEndpoints};
pub use interface::Interface;
