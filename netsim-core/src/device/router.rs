//! A router: an [`IpNode`] with forwarding enabled (`spec.md` §4.6).
//! Grounded on `original_source/src/networksim/hardware/device/ip/router.py`.

use std::any::Any;

use crate::hardware::Interface;
use crate::stack::IpStack;

use super::ip_node::IpNode;
use super::Device;
use crate::rng::SimRng;

pub struct Router {
    node: IpNode,
}

impl Router {
    pub fn new(name: impl Into<String>, interfaces: Vec<Interface>, rng: SimRng) -> Self {
        Router {
            node: IpNode::new(name, interfaces, true, rng),
        }
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

impl Device for Router {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::MacAddr;

    #[test]
    fn new_router_forwards() {
        let iface = Interface::new(MacAddr::new([1, 0, 0, 0, 0, 1]), 4);
        let router = Router::new("r1", vec![iface], SimRng::from_seed(1));
        assert!(router.stack().forward_packets);
    }
}
