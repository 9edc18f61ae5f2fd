//! A trivial repeater: floods every frame to every other port, no
//! learning. Supplement grounded on
//! `original_source/src/networksim/hardware/device/infrastructure/hub.py`
//! (see SPEC_FULL.md §5).

use std::any::Any;

use crate::hardware::Interface;

use super::core::DeviceCore;
use super::Device;

pub struct Hub {
    core: DeviceCore,
}

impl Hub {
    pub fn new(name: impl Into<String>, interfaces: Vec<Interface>) -> Self {
        Hub {
            core: DeviceCore::new(name, interfaces),
        }
    }
}

impl Device for Hub {
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
        self.core.connection_state_changes();

        for (ingress, frame) in self.core.drain_inputs() {
            let ports = self.core.interfaces_mut();
            for (i, iface) in ports.iter_mut().enumerate() {
                if i != ingress {
                    iface.send(frame.clone());
                }
            }
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
    use crate::addr::MacAddr;
    use crate::packet::{EthernetFrame, EthernetPayload};

    #[test]
    fn floods_to_every_port_but_ingress() {
        let ifaces = (0u8..3u8)
            .map(|i| {
                let mut iface = Interface::new(MacAddr::new([i + 1, 0, 0, 0, 0, i + 1]), 1);
                iface.connect();
                iface
            })
            .collect();
        let mut hub = Hub::new("hub", ifaces);
        hub.interfaces_mut()[0].inbound_write(EthernetFrame::broadcast(
            None,
            EthernetPayload::Opaque(vec![1]),
        ));
        hub.step();
        assert!(hub.interfaces_mut()[1].outbound_read().is_some());
        assert!(hub.interfaces_mut()[2].outbound_read().is_some());
    }
}
