//! Error kinds surfaced to callers.
//!
//! Per the error-handling policy: anything that is a normal runtime event
//! (no route, unknown ARP, queue full, TTL exceeded, DHCP nack) is handled
//! locally and logged, never returned as an `Err` here. Only API misuse is
//! surfaced as a typed error.

use thiserror::Error;

/// Errors surfaced to callers of the public topology/stack API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("address must be {expected} bytes, got {actual}")]
    InvalidAddressLength { expected: usize, actual: usize },

    #[error("failed to parse address from {0:?}")]
    AddressParseError(String),

    #[error("interface is already connected")]
    AlreadyConnected,

    #[error("protocol already bound for this (type, address, port)")]
    ProtocolAlreadyBound,

    #[error("no route to {0}")]
    NoRoute(crate::addr::Ipv4Addr),
}

pub type Result<T> = core::result::Result<T, SimError>;
