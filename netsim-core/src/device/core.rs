//! Shared per-device bookkeeping: interfaces, connection-change
//! detection, and round-robin input draining (`spec.md` §4.3).

use crate::hardware::Interface;
use crate::packet::EthernetFrame;

/// Fields and helpers every [`super::Device`] impl composes rather than
/// inherits — Rust has no base classes, so `Switch`/`Router`/`Host` each
/// hold a `DeviceCore` and delegate to it.
#[derive(Debug, Clone)]
pub struct DeviceCore {
    name: String,
    interfaces: Vec<Interface>,
    prev_connected: Vec<bool>,
    ticks: u64,
    process_rate: usize,
    auto_process: bool,
}

impl DeviceCore {
    pub fn new(name: impl Into<String>, interfaces: Vec<Interface>) -> Self {
        let process_rate = interfaces
            .iter()
            .map(|i| i.max_bandwidth())
            .sum::<usize>()
            .max(1);
        let prev_connected = vec![false; interfaces.len()];
        DeviceCore {
            name: name.into(),
            interfaces,
            prev_connected,
            ticks: 0,
            process_rate,
            auto_process: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interfaces_mut(&mut self) -> &mut [Interface] {
        &mut self.interfaces
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn process_rate(&self) -> usize {
        self.process_rate
    }

    pub fn set_process_rate(&mut self, rate: usize) {
        self.process_rate = rate.max(1);
    }

    pub fn set_auto_process(&mut self, auto_process: bool) {
        self.auto_process = auto_process;
    }

    pub fn advance_tick(&mut self) {
        self.ticks += 1;
    }

    /// Returns the indices of interfaces whose `connected` flag flipped
    /// since the last call (`spec.md` §4.3 step 2). Updates the recorded
    /// state as a side effect.
    pub fn connection_state_changes(&mut self) -> Vec<usize> {
        let mut changed = Vec::new();
        for (i, iface) in self.interfaces.iter().enumerate() {
            let now = iface.is_connected();
            if now != self.prev_connected[i] {
                self.prev_connected[i] = now;
                changed.push(i);
            }
        }
        changed
    }

    /// Round-robin drains inbound frames across interfaces, up to
    /// `process_rate` total, stopping early once a full pass over every
    /// interface yields nothing (`spec.md` §4.3 step 5). A no-op unless
    /// `auto_process` was enabled.
    pub fn drain_inputs(&mut self) -> Vec<(usize, EthernetFrame)> {
        let mut drained = Vec::new();
        if !self.auto_process || self.interfaces.is_empty() {
            return drained;
        }
        let n = self.interfaces.len();
        loop {
            if drained.len() >= self.process_rate {
                break;
            }
            let mut progressed = false;
            for i in 0..n {
                if let Some(frame) = self.interfaces[i].receive() {
                    drained.push((i, frame));
                    progressed = true;
                    if drained.len() >= self.process_rate {
                        break;
                    }
                }
            }
            if !progressed {
                break;
            }
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::MacAddr;
    use crate::packet::EthernetPayload;

    fn frame() -> EthernetFrame {
        EthernetFrame::broadcast(None, EthernetPayload::Opaque(vec![1]))
    }

    #[test]
    fn connection_state_change_reported_once() {
        let ifaces = vec![Interface::new(MacAddr::new([1, 0, 0, 0, 0, 1]), 1)];
        let mut core = DeviceCore::new("d", ifaces);
        assert!(core.connection_state_changes().is_empty());
        core.interfaces[0].connect();
        assert_eq!(core.connection_state_changes(), vec![0]);
        assert!(core.connection_state_changes().is_empty(), "no repeat report");
    }

    #[test]
    fn drain_inputs_round_robins_up_to_process_rate() {
        let mut a = Interface::new(MacAddr::new([1, 0, 0, 0, 0, 1]), 1);
        let mut b = Interface::new(MacAddr::new([2, 0, 0, 0, 0, 2]), 1);
        a.inbound_write(frame());
        a.inbound_write(frame());
        b.inbound_write(frame());
        let mut core = DeviceCore::new("d", vec![a, b]);
        core.set_process_rate(2);
        let drained = core.drain_inputs();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].0, 0);
        assert_eq!(drained[1].0, 1);
    }

    #[test]
    fn drain_inputs_stops_early_when_queues_are_empty() {
        let a = Interface::new(MacAddr::new([1, 0, 0, 0, 0, 1]), 1);
        let mut core = DeviceCore::new("d", vec![a]);
        core.set_process_rate(100);
        assert!(core.drain_inputs().is_empty());
    }
}
