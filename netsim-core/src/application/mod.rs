//! User-space-style applications bound to protocol+address+port keys
//! (`spec.md` C10): ICMP ping, the DHCP client, and the DHCP server.

pub mod dhcp;
pub mod ping;

pub use dhcp::{DhcpClient, DhcpServer};
pub use ping::Ping;

use std::any::Any;

use crate::hardware::Interface;
use crate::rng::SimRng;
use crate::stack::IpStack;

/// Borrowed access an application's `step` gets into its owning node's
/// stack, interfaces, and randomness source for one tick.
pub struct AppContext<'a> {
    pub stack: &'a mut IpStack,
    pub interfaces: &'a mut [Interface],
    pub rng: &'a mut SimRng,
}

/// A running process bound to a device (`spec.md` §4.3: "ticks each
/// running application, in pid order").
pub trait Application: Any {
    fn name(&self) -> &str;
    fn step(&mut self, ctx: &mut AppContext);

    fn as_any(&self) -> &dyn Any;
}
