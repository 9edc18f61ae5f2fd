//! Shared logic behind [`super::Host`] and [`super::Router`]: an
//! [`IpStack`] plus a roster of [`Application`]s riding on [`DeviceCore`]
//! (`spec.md` §4.3 step 4, §4.5/§4.6). Grounded on
//! `original_source/src/networksim/hardware/device/ip/ipdevice.py`.

use crate::application::{AppContext, Application};
use crate::hardware::Interface;
use crate::packet::EthernetFrame;
use crate::rng::SimRng;
use crate::stack::IpStack;

use super::core::DeviceCore;

/// Shared behavior for any device that runs an IP stack and applications
/// on top of it. `Host` and `Router` differ only in `forward_packets` and
/// in the trait impl they expose (`spec.md` §4.5 vs §4.6).
pub struct IpNode {
    core: DeviceCore,
    stack: IpStack,
    rng: SimRng,
    applications: Vec<Box<dyn Application>>,
}

impl IpNode {
    pub fn new(
        name: impl Into<String>,
        interfaces: Vec<Interface>,
        forward_packets: bool,
        rng: SimRng,
    ) -> Self {
        IpNode {
            core: DeviceCore::new(name, interfaces),
            stack: IpStack::new(forward_packets),
            rng,
            applications: Vec::new(),
        }
    }

    pub fn add_application(&mut self, app: Box<dyn Application>) {
        self.applications.push(app);
    }

    pub fn applications(&self) -> &[Box<dyn Application>] {
        &self.applications
    }

    pub fn stack(&self) -> &IpStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut IpStack {
        &mut self.stack
    }

    /// Splits the borrow between the stack and its interfaces, for
    /// callers (snapshot restore) that need to call `IpStack::bind`
    /// directly instead of going through a tick.
    pub fn stack_and_interfaces_mut(&mut self) -> (&mut IpStack, &mut [Interface]) {
        (&mut self.stack, self.core.interfaces_mut())
    }

    pub fn core(&self) -> &DeviceCore {
        &self.core
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn interfaces(&self) -> &[Interface] {
        self.core.interfaces()
    }

    pub fn interfaces_mut(&mut self) -> &mut [Interface] {
        self.core.interfaces_mut()
    }

    /// Returns whether a received frame should reach the IP stack at all:
    /// unicast to this interface's own MAC, or broadcast (`spec.md` §4.5,
    /// mirroring `IPDevice.process_inputs`'s destination filter — unlike
    /// `Switch`/`Hub`, which bypass it entirely).
    fn accepts(iface_mac: crate::addr::MacAddr, frame: &EthernetFrame) -> bool {
        frame.dst == iface_mac || frame.dst.is_broadcast()
    }

    /// One tick: connection-change-triggered unbind, the stack's own
    /// per-tick job, every application in turn, then drains and hands
    /// inbound frames to the stack (`spec.md` §4.3).
    pub fn step(&mut self) {
        self.core.advance_tick();

        for iface in self.core.connection_state_changes() {
            if !self.core.interfaces()[iface].is_connected() {
                self.stack.unbind(None, Some(iface));
            }
        }

        self.stack.step();

        for app in self.applications.iter_mut() {
            let mut ctx = AppContext {
                stack: &mut self.stack,
                interfaces: self.core.interfaces_mut(),
                rng: &mut self.rng,
            };
            app.step(&mut ctx);
        }

        for (iface, frame) in self.core.drain_inputs() {
            let iface_mac = self.core.interfaces()[iface].mac();
            if !Self::accepts(iface_mac, &frame) {
                continue;
            }
            self.stack.process_packet(
                self.core.interfaces_mut(),
                frame.src,
                &frame.payload,
                iface,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{Ipv4Addr, MacAddr};
    use crate::packet::{ArpPayload, EthernetPayload};

    fn node() -> IpNode {
        let mut iface = Interface::new(MacAddr::new([1, 0, 0, 0, 0, 1]), 4);
        iface.connect();
        IpNode::new("n", vec![iface], false, SimRng::from_seed(1))
    }

    #[test]
    fn frame_addressed_elsewhere_is_ignored() {
        let mut n = node();
        n.interfaces_mut()[0].inbound_write(EthernetFrame::new(
            MacAddr::new([9, 0, 0, 0, 0, 9]),
            Some(MacAddr::new([2, 0, 0, 0, 0, 2])),
            EthernetPayload::Arp(ArpPayload {
                request: true,
                src_mac: None,
                src_ip: Some(Ipv4Addr::new([10, 0, 0, 2])),
                dst_mac: None,
                dst_ip: Some(Ipv4Addr::new([10, 0, 0, 1])),
            }),
        ));
        n.step();
        assert!(n.stack().arp_table().is_empty());
    }

    #[test]
    fn broadcast_frame_reaches_the_stack() {
        let mut n = node();
        n.interfaces_mut()[0].inbound_write(EthernetFrame::broadcast(
            Some(MacAddr::new([2, 0, 0, 0, 0, 2])),
            EthernetPayload::Arp(ArpPayload {
                request: true,
                src_mac: Some(MacAddr::new([2, 0, 0, 0, 0, 2])),
                src_ip: Some(Ipv4Addr::new([10, 0, 0, 2])),
                dst_mac: None,
                dst_ip: Some(Ipv4Addr::new([10, 0, 0, 1])),
            }),
        ));
        n.step();
        // An ARP request for an address we haven't bound draws no
        // response, but the request itself should still be parsed
        // without panicking and the stack stays untouched otherwise.
        assert!(n.stack().arp_table().is_empty());
    }

    #[test]
    fn disconnect_clears_binds_on_that_interface() {
        let mut n = node();
        n.stack_mut().bind(
            n.core.interfaces_mut(),
            "10.0.0.1".parse().unwrap(),
            "10.0.0.0/24".parse().unwrap(),
            0,
        );
        assert_eq!(n.stack().binds().len(), 1);
        n.interfaces_mut()[0].disconnect();
        n.step();
        assert!(n.stack().binds().is_empty());
    }
}
