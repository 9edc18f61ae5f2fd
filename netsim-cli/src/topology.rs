//! Builds the two demo topologies ported from
//! `original_source/src/networksim/examples/{simple_routing,tier3_network}.py`:
//! a router between two DHCP-served subnets, and a three-tier switch
//! fabric with a pool of client devices DHCP-acquiring addresses.

use netsim_core::addr::{Ipv4Addr, Ipv4Network, MacAddr};
use netsim_core::application::dhcp::{DhcpClient, DhcpServer};
use netsim_core::application::ping::Ping;
use netsim_core::device::DeviceId;
use netsim_core::hardware::Interface;
use netsim_core::Simulation;

/// A device running a DHCP client and/or a ping, worth reporting on
/// after the run.
pub struct MonitoredHost {
    pub name: String,
    pub id: DeviceId,
}

pub struct Topology {
    pub sim: Simulation,
    pub monitored: Vec<MonitoredHost>,
}

fn next_mac(counter: &mut u32) -> MacAddr {
    *counter += 1;
    let n = *counter;
    MacAddr::new([0x02, 0x00, (n >> 24) as u8, (n >> 16) as u8, (n >> 8) as u8, n as u8])
}

/// The original's `DHCPServer` derives its pool as the network's host
/// range trimmed by 10% at each end when no explicit range is given
/// (`original_source/src/networksim/application/dhcp/server.py`).
fn default_pool(network: Ipv4Network) -> Vec<Ipv4Addr> {
    let host_bits = 32 - network.match_bits() as u32;
    let host_count = if host_bits >= 32 { u32::MAX } else { 1u32 << host_bits };
    let trim = (host_count as f64 * 0.1) as u32;
    let base = u32::from_be_bytes(network.base().octets());
    let start = base + trim.max(1);
    let end = base + host_count.saturating_sub(trim.max(1)).saturating_sub(1);
    (start..=end).map(|a| Ipv4Addr::new(a.to_be_bytes())).collect()
}

/// A router between two DHCP-served subnets, each with a couple of
/// DHCP+ping client hosts (`simple_routing.py`).
pub fn simple_routing(seed: u64) -> Topology {
    let mut sim = Simulation::new(seed);
    let mut macs = 0u32;

    let net_a = Ipv4Network::new(Ipv4Addr::new([172, 16, 1, 0]), 24);
    let net_b = Ipv4Network::new(Ipv4Addr::new([172, 20, 5, 0]), 24);
    let router_ip_a = Ipv4Addr::new([172, 16, 1, 1]);
    let router_ip_b = Ipv4Addr::new([172, 20, 5, 1]);
    let dhcp_ip_a = Ipv4Addr::new([172, 16, 1, 5]);
    let dhcp_ip_b = Ipv4Addr::new([172, 20, 5, 5]);

    let sw1 = sim.add_switch("sw1", (0..3).map(|_| Interface::new(next_mac(&mut macs), 100)).collect());
    let sw2 = sim.add_switch("sw2", (0..3).map(|_| Interface::new(next_mac(&mut macs), 100)).collect());
    let router = sim.add_router("router", vec![Interface::new(next_mac(&mut macs), 100), Interface::new(next_mac(&mut macs), 100)]);

    sim.connect_devices(router, sw1, 1, 100).expect("router <-> sw1");
    sim.connect_devices(router, sw2, 1, 100).expect("router <-> sw2");
    if let Some(r) = sim.router_mut(router) {
        let (stack, ifaces) = r.stack_and_interfaces_mut();
        stack.bind(ifaces, router_ip_a, net_a, 0);
        stack.bind(ifaces, router_ip_b, net_b, 1);
    }

    let dhcp_a = sim.add_host("dhcp_server_a", vec![Interface::new(next_mac(&mut macs), 100)]);
    sim.connect_devices(dhcp_a, sw1, 1, 100).expect("dhcp_a <-> sw1");
    if let Some(h) = sim.host_mut(dhcp_a) {
        let (stack, ifaces) = h.stack_and_interfaces_mut();
        stack.bind(ifaces, dhcp_ip_a, net_a, 0);
        h.add_application(Box::new(
            DhcpServer::new(dhcp_ip_a, net_a, 0, default_pool(net_a), 5000).with_router(router_ip_a),
        ));
    }

    let dhcp_b = sim.add_host("dhcp_server_b", vec![Interface::new(next_mac(&mut macs), 100)]);
    sim.connect_devices(dhcp_b, sw2, 1, 100).expect("dhcp_b <-> sw2");
    if let Some(h) = sim.host_mut(dhcp_b) {
        let (stack, ifaces) = h.stack_and_interfaces_mut();
        stack.bind(ifaces, dhcp_ip_b, net_b, 0);
        h.add_application(Box::new(
            DhcpServer::new(dhcp_ip_b, net_b, 0, default_pool(net_b), 5000).with_router(router_ip_b),
        ));
    }

    let mut monitored = Vec::new();
    for (name, switch) in [("a1", sw1), ("a2", sw1), ("b1", sw2), ("b2", sw2)] {
        let mac = next_mac(&mut macs);
        let id = sim.add_host(name, vec![Interface::new(mac, 100)]);
        sim.connect_devices(switch, id, 1, 100).unwrap_or_else(|| panic!("{name} <-> switch"));
        if let Some(h) = sim.host_mut(id) {
            h.add_application(Box::new(DhcpClient::new(0, mac)));
        }
        monitored.push(MonitoredHost { name: name.to_string(), id });
    }

    Topology { sim, monitored }
}

/// A core/aggregation/access switch fabric plus a DHCP server and a
/// handful of client devices that each DHCP-acquire an address and ping
/// the DHCP server (`tier3_network.py`, scaled down from 50 clients to
/// a size reasonable for a demo run).
pub fn tier3_network(seed: u64, client_count: usize) -> Topology {
    let mut sim = Simulation::new(seed);
    let mut macs = 0u32;

    let core = sim.add_switch("core_sw", (0..4).map(|_| Interface::new(next_mac(&mut macs), 400)).collect());

    let make_agg = |sim: &mut Simulation, macs: &mut u32, name: &str| -> DeviceId {
        let ifaces = (0..8)
            .map(|_| Interface::new(next_mac(macs), 100))
            .chain((0..2).map(|_| Interface::new(next_mac(macs), 400)))
            .collect();
        sim.add_switch(name, ifaces)
    };
    let agg1 = make_agg(&mut sim, &mut macs, "agg_sw1");
    let agg2 = make_agg(&mut sim, &mut macs, "agg_sw2");
    sim.connect_devices(agg1, core, 1, 400).expect("agg1 <-> core");
    sim.connect_devices(agg2, core, 5, 400).expect("agg2 <-> core");

    let make_acc = |sim: &mut Simulation, macs: &mut u32, name: &str| -> DeviceId {
        let ifaces = (0..24)
            .map(|_| Interface::new(next_mac(macs), 10))
            .chain((0..2).map(|_| Interface::new(next_mac(macs), 100)))
            .collect();
        sim.add_switch(name, ifaces)
    };
    let acc1 = make_acc(&mut sim, &mut macs, "acc_sw1_1");
    let acc2 = make_acc(&mut sim, &mut macs, "acc_sw1_2");
    let acc3 = make_acc(&mut sim, &mut macs, "acc_sw2_1");
    let acc4 = make_acc(&mut sim, &mut macs, "acc_sw2_2");
    sim.connect_devices(acc1, agg1, 1, 100).expect("acc1 <-> agg1");
    sim.connect_devices(acc2, agg1, 1, 100).expect("acc2 <-> agg1");
    sim.connect_devices(acc3, agg2, 1, 100).expect("acc3 <-> agg2");
    sim.connect_devices(acc4, agg2, 1, 100).expect("acc4 <-> agg2");

    let dhcp_net = Ipv4Network::new(Ipv4Addr::new([172, 16, 20, 0]), 24);
    let dhcp_ip = Ipv4Addr::new([172, 16, 20, 5]);
    let dhcp_server = sim.add_host("dhcp_server", vec![Interface::new(next_mac(&mut macs), 20)]);
    sim.connect_devices(dhcp_server, agg1, 1, 20).expect("dhcp_server <-> agg1");
    if let Some(h) = sim.host_mut(dhcp_server) {
        let (stack, ifaces) = h.stack_and_interfaces_mut();
        stack.bind(ifaces, dhcp_ip, dhcp_net, 0);
        h.add_application(Box::new(DhcpServer::new(dhcp_ip, dhcp_net, 0, default_pool(dhcp_net), 5000)));
    }

    let access_switches = [acc1, acc2, acc3, acc4];
    let mut monitored = Vec::new();
    for n in 0..client_count {
        let mac = next_mac(&mut macs);
        let name = format!("client-{n}");
        let id = sim.add_host(&name, vec![Interface::new(mac, 10)]);
        let switch = access_switches[n % access_switches.len()];
        sim.connect_devices(switch, id, 1 + (n % 6), 10).unwrap_or_else(|| panic!("{name} <-> access switch"));
        if let Some(h) = sim.host_mut(id) {
            h.add_application(Box::new(DhcpClient::new(0, mac)));
        }
        monitored.push(MonitoredHost { name, id });
    }

    Topology { sim, monitored }
}
