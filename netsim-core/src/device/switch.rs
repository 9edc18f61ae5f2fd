//! The learning bridge: a CAM table keyed by source MAC, flood on miss
//! or broadcast (`spec.md` §4.4). Grounded on
//! `original_source/src/networksim/hardware/device/infrastructure/switch.py`.

use std::any::Any;
use std::collections::HashMap;

use crate::addr::MacAddr;
use crate::hardware::Interface;
use crate::packet::EthernetFrame;

use super::core::DeviceCore;
use super::Device;

/// Default CAM entry lifetime in ticks, matching the original's
/// `cam_expire` default.
pub const DEFAULT_CAM_TTL: u32 = 100;

struct CamEntry {
    iface: usize,
    ttl: u32,
}

struct CamTable {
    entries: HashMap<MacAddr, CamEntry>,
    default_ttl: u32,
}

impl CamTable {
    fn new(default_ttl: u32) -> Self {
        CamTable {
            entries: HashMap::new(),
            default_ttl,
        }
    }

    fn learn(&mut self, mac: MacAddr, iface: usize) {
        self.entries.insert(
            mac,
            CamEntry {
                iface,
                ttl: self.default_ttl,
            },
        );
    }

    fn lookup(&self, mac: &MacAddr) -> Option<usize> {
        self.entries.get(mac).map(|e| e.iface)
    }

    fn expire(&mut self) {
        self.entries.retain(|_, e| {
            e.ttl = e.ttl.saturating_sub(1);
            e.ttl > 0
        });
    }

    fn purge_iface(&mut self, iface: usize) {
        self.entries.retain(|_, e| e.iface != iface);
    }
}

/// A learning Ethernet bridge. Never inspects anything above the frame's
/// addresses.
pub struct Switch {
    core: DeviceCore,
    cam: CamTable,
}

impl Switch {
    pub fn new(name: impl Into<String>, interfaces: Vec<Interface>) -> Self {
        Switch {
            core: DeviceCore::new(name, interfaces),
            cam: CamTable::new(DEFAULT_CAM_TTL),
        }
    }

    pub fn cam_size(&self) -> usize {
        self.cam.entries.len()
    }

    pub fn cam_port_for(&self, mac: &MacAddr) -> Option<usize> {
        self.cam.lookup(mac)
    }

    fn forward(&mut self, ingress: usize, frame: EthernetFrame) {
        let egress_ports: Vec<usize> = if frame.dst.is_broadcast() {
            (0..self.core.interfaces().len())
                .filter(|&p| p != ingress)
                .collect()
        } else {
            match self.cam.lookup(&frame.dst) {
                Some(port) if port != ingress => vec![port],
                Some(_) => Vec::new(), // learned on the ingress port itself: nowhere to send
                None => (0..self.core.interfaces().len())
                    .filter(|&p| p != ingress)
                    .collect(),
            }
        };
        for port in egress_ports {
            if let Some(iface) = self.core.interfaces_mut().get_mut(port) {
                iface.send(frame.clone());
            }
        }
    }
}

impl Device for Switch {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn interfaces(&self) -> &[Interface] {
        self.core.interfaces()
    }

    fn interfaces_mut(&mut self) -> &mut [Interface] {
        self.core.interfaces_mut()
    }

    fn step(&mut self) {
        self.core.advance_tick();
        for iface in self.core.connection_state_changes() {
            self.cam.purge_iface(iface);
        }
        self.cam.expire();

        for (ingress, frame) in self.core.drain_inputs() {
            if let Some(src) = frame.src {
                self.cam.learn(src, ingress);
            }
            self.forward(ingress, frame);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::EthernetPayload;

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([n, 0, 0, 0, 0, n])
    }

    fn switch_with_ports(n: usize) -> Switch {
        let ifaces = (0..n)
            .map(|i| {
                let mut iface = Interface::new(mac(i as u8 + 1), 4);
                iface.connect();
                iface
            })
            .collect();
        Switch::new("sw", ifaces)
    }

    #[test]
    fn learns_source_port_on_receipt() {
        let mut sw = switch_with_ports(3);
        let frame = EthernetFrame::new(
            MacAddr::BROADCAST,
            Some(mac(2)),
            EthernetPayload::Opaque(vec![1]),
        );
        sw.interfaces_mut()[0].inbound_write(frame);
        sw.step();
        assert_eq!(sw.cam_port_for(&mac(2)), Some(0));
    }

    #[test]
    fn unicast_to_known_mac_forwards_to_single_port_only() {
        let mut sw = switch_with_ports(3);
        // Learn mac(2) on port 1 first.
        sw.interfaces_mut()[1].inbound_write(EthernetFrame::new(
            MacAddr::BROADCAST,
            Some(mac(2)),
            EthernetPayload::Opaque(vec![1]),
        ));
        sw.step();

        sw.interfaces_mut()[0].inbound_write(EthernetFrame::new(
            mac(2),
            Some(mac(1)),
            EthernetPayload::Opaque(vec![9]),
        ));
        sw.step();

        assert!(sw.interfaces_mut()[1].outbound_read().is_some());
        assert!(sw.interfaces_mut()[2].outbound_read().is_none());
    }

    #[test]
    fn unknown_destination_floods_every_other_port() {
        let mut sw = switch_with_ports(3);
        sw.interfaces_mut()[0].inbound_write(EthernetFrame::new(
            mac(99),
            Some(mac(1)),
            EthernetPayload::Opaque(vec![9]),
        ));
        sw.step();
        assert!(sw.interfaces_mut()[1].outbound_read().is_some());
        assert!(sw.interfaces_mut()[2].outbound_read().is_some());
    }

    #[test]
    fn disconnect_purges_cam_entries_for_that_port() {
        let mut sw = switch_with_ports(2);
        sw.interfaces_mut()[0].inbound_write(EthernetFrame::new(
            MacAddr::BROADCAST,
            Some(mac(2)),
            EthernetPayload::Opaque(vec![1]),
        ));
        sw.step();
        assert!(sw.cam_port_for(&mac(2)).is_some());

        sw.interfaces_mut()[0].disconnect();
        sw.step();
        assert!(sw.cam_port_for(&mac(2)).is_none());
    }
}
