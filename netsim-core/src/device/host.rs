//! An end host: an [`IpNode`] that never forwards (`spec.md` §4.5).
//! Grounded on `original_source/src/networksim/hardware/device/ip/ipdevice.py`
//! (the `forward_packets = false` case).

use std::any::Any;

use crate::application::Application;
use crate::hardware::Interface;
use crate::stack::IpStack;

use super::ip_node::IpNode;
use super::Device;
use crate::rng::SimRng;

pub struct Host {
    node: IpNode,
}

impl Host {
    pub fn new(name: impl Into<String>, interfaces: Vec<Interface>, rng: SimRng) -> Self {
        Host {
            node: IpNode::new(name, interfaces, false, rng),
        }
    }

    pub fn add_application(&mut self, app: Box<dyn Application>) {
        self.node.add_application(app);
    }

    pub fn applications(&self) -> &[Box<dyn Application>] {
        self.node.applications()
    }

    pub fn stack(&self) -> &IpStack {
        self.node.stack()
    }

    pub fn stack_mut(&mut self) -> &mut IpStack {
        self.node.stack_mut()
    }

    pub fn stack_and_interfaces_mut(&mut self) -> (&mut IpStack, &mut [Interface]) {
        self.node.stack_and_interfaces_mut()
    }
}

impl Device for Host {
    fn name(&self) -> &str {
        self.node.name()
    }

    fn interfaces(&self) -> &[Interface] {
        self.node.interfaces()
    }

    fn interfaces_mut(&mut self) -> &mut [Interface] {
        self.node.interfaces_mut()
    }

    fn step(&mut self) {
        self.node.step();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
