//! DHCP client and server applications (`spec.md` §4.7/§4.8).

mod client;
mod server;

pub use client::{DhcpClient, DhcpClientState};
pub use server::{DhcpServer, Lease};
