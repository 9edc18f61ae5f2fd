//! The IP stack: ARP + routing + binds + forwarding + protocol dispatch.
//!
//! Owns [`ArpTable`] and [`RouteTable`] and drives the send/receive
//! algorithms in full (`spec.md` §4.6). A stack never owns the interfaces
//! it sends through — those belong to the device — so every method that
//! touches the wire takes `interfaces: &mut [Interface]` and indexes into
//! it by port number.

mod arp_table;
mod route_table;

pub use arp_table::ArpTable;
pub use route_table::{Route, RouteTable};

use std::collections::{HashMap, HashSet, VecDeque};

use log::warn;

use crate::addr::{Ipv4Addr, Ipv4Network, MacAddr};
use crate::error::{Result, SimError};
use crate::hardware::Interface;
use crate::packet::{
    ArpPayload, DhcpKind, DhcpPayload, EthernetFrame, EthernetPayload, IpPayload, Ipv4Protocol,
    ProtocolKind, DEFAULT_TTL,
};

/// Ticks an outstanding ARP request waits before its pending sends are
/// discarded (`spec.md` §4.6).
pub const ARP_REQUEST_TIMEOUT: u32 = 40;

/// A bound `(address, network, interface)` triple — one of the host's
/// configured addresses (`spec.md` §3, C7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpBind {
    pub addr: Ipv4Addr,
    pub network: Ipv4Network,
    pub iface: usize,
}

/// An outgoing packet parked while its next hop's MAC is unresolved.
#[derive(Debug, Clone)]
struct PendingSend {
    pending_ip: Ipv4Addr,
    dst: Ipv4Addr,
    src: Option<Ipv4Addr>,
    iface: usize,
    ttl: u8,
    payload: Ipv4Protocol,
}

/// A protocol-callback registry key: `(type, addr, port)`, where `port`
/// stands in for the ICMP identifier when `kind == IcmpReply`.
type ProtocolKey = (ProtocolKind, Ipv4Addr, u16);

/// What gets handed to an application when a bound protocol key receives
/// a packet. Standing in for the callback invocation the original makes
/// directly (see DESIGN.md): applications poll [`IpStack::take_deliveries`]
/// each tick for their bound keys instead of the stack calling back into
/// them, which avoids needing `Rc<RefCell<_>>`-shared application state.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    IcmpReply {
        src: Ipv4Addr,
        id: u16,
        seq: u16,
        payload: Vec<u8>,
    },
    Udp {
        src: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
        payload: Vec<u8>,
    },
    /// DHCP rides under the `(Udp, addr, 67|68)` key per the convention
    /// fixed in `spec.md` §8 scenario 6 ("bind UDP/ANY:67"), but keeps its
    /// typed payload rather than flattening to raw bytes.
    Dhcp { src: Ipv4Addr, payload: DhcpPayload },
}

/// Owns C5 (ARP), C6 (routes), C7 (binds) and implements the send/receive
/// algorithms of C8.
#[derive(Debug, Clone)]
pub struct IpStack {
    binds: Vec<IpBind>,
    arp: ArpTable,
    routes: RouteTable,
    protocol_binds: HashSet<ProtocolKey>,
    deliveries: HashMap<ProtocolKey, VecDeque<Delivery>>,
    pending: Vec<PendingSend>,
    arp_timers: HashMap<Ipv4Addr, u32>,
    /// `true` for routers, `false` for hosts (`spec.md` §4.6).
    pub forward_packets: bool,
}

impl IpStack {
    pub fn new(forward_packets: bool) -> Self {
        IpStack {
            binds: Vec::new(),
            arp: ArpTable::new(),
            routes: RouteTable::new(),
            protocol_binds: HashSet::new(),
            deliveries: HashMap::new(),
            pending: Vec::new(),
            arp_timers: HashMap::new(),
            forward_packets,
        }
    }

    pub fn binds(&self) -> &[IpBind] {
        &self.binds
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Installs a route directly (e.g. the default route a DHCP client
    /// installs from option 3).
    pub fn add_route(&mut self, route: Route) {
        self.routes.add(route);
    }

    pub fn del_routes(
        &mut self,
        network: Option<Ipv4Network>,
        iface: Option<usize>,
        via: Option<Ipv4Addr>,
        src: Option<Ipv4Addr>,
    ) {
        self.routes.del_routes(network, iface, via, src);
    }

    pub fn arp_table(&self) -> &ArpTable {
        &self.arp
    }

    pub fn protocol_binds(&self) -> impl Iterator<Item = &ProtocolKey> {
        self.protocol_binds.iter()
    }

    fn is_bound(&self, addr: Ipv4Addr) -> bool {
        self.binds.iter().any(|b| b.addr == addr)
    }

    fn bind_addr_for_iface(&self, iface: usize) -> Option<Ipv4Addr> {
        self.binds.iter().find(|b| b.iface == iface).map(|b| b.addr)
    }

    /// Guards ARP/IP source-learning against off-net poisoning: only
    /// record a mapping learned on an interface whose directly-attached
    /// network actually contains the claimed source (`spec.md` §4.6).
    fn local_source(&self, ip: Option<Ipv4Addr>, iface: usize) -> bool {
        match ip {
            Some(ip) => self
                .binds
                .iter()
                .any(|b| b.iface == iface && b.network.contains(&ip)),
            None => false,
        }
    }

    /// Adds `addr` to the bind set, installs a connected route for
    /// `network` out `iface`, and announces the binding with a
    /// gratuitous ARP (`spec.md` §4.6).
    pub fn bind(
        &mut self,
        interfaces: &mut [Interface],
        addr: Ipv4Addr,
        network: Ipv4Network,
        iface: usize,
    ) {
        self.binds.push(IpBind { addr, network, iface });
        self.routes.add(Route::new(network, iface).src(addr));
        self.send_garp(interfaces, iface, addr);
    }

    /// Removes every bind matching the supplied (optional, wildcard-if-
    /// absent) `addr`/`iface`, and the routes they installed.
    pub fn unbind(&mut self, addr: Option<Ipv4Addr>, iface: Option<usize>) {
        let mut removed = Vec::new();
        self.binds.retain(|b| {
            let addr_match = addr.map(|a| a == b.addr).unwrap_or(true);
            let iface_match = iface.map(|i| i == b.iface).unwrap_or(true);
            if addr_match && iface_match {
                removed.push(b.clone());
                false
            } else {
                true
            }
        });
        for bind in removed {
            self.routes
                .del_routes(Some(bind.network), Some(bind.iface), None, Some(bind.addr));
        }
    }

    pub fn bind_protocol(&mut self, kind: ProtocolKind, addr: Ipv4Addr, port: u16) -> Result<()> {
        let key = (kind, addr, port);
        if !self.protocol_binds.insert(key) {
            return Err(SimError::ProtocolAlreadyBound);
        }
        self.deliveries.entry(key).or_default();
        Ok(())
    }

    pub fn unbind_protocol(&mut self, kind: ProtocolKind, addr: Ipv4Addr, port: u16) {
        let key = (kind, addr, port);
        self.protocol_binds.remove(&key);
        self.deliveries.remove(&key);
    }

    /// Drains and returns every delivery queued for `(kind, addr, port)`
    /// since the last call. The polling counterpart to the callback the
    /// original fires directly (see `Delivery`'s doc comment).
    pub fn take_deliveries(&mut self, kind: ProtocolKind, addr: Ipv4Addr, port: u16) -> Vec<Delivery> {
        self.deliveries
            .get_mut(&(kind, addr, port))
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    fn deliver(&mut self, kind: ProtocolKind, addr: Ipv4Addr, port: u16, item: Delivery) {
        let specific = (kind, addr, port);
        if self.protocol_binds.contains(&specific) {
            self.deliveries.entry(specific).or_default().push_back(item);
            return;
        }
        let any = (kind, Ipv4Addr::ANY, port);
        if self.protocol_binds.contains(&any) {
            self.deliveries.entry(any).or_default().push_back(item);
        }
    }

    /// The send algorithm of `spec.md` §4.6: route, resolve-or-queue,
    /// emit.
    pub fn send(
        &mut self,
        interfaces: &mut [Interface],
        dst: Ipv4Addr,
        payload: Ipv4Protocol,
        src: Option<Ipv4Addr>,
        iface: Option<usize>,
        ttl: Option<u8>,
    ) {
        let route = match self.routes.find_route(&dst, src, iface) {
            Some(r) => r.clone(),
            None => {
                warn!("no route to {dst}, dropping");
                return;
            }
        };

        // `via` means this route is a next-hop indirection: the L3 dst
        // stays `dst`, but we resolve/route against the next hop to find
        // the actual egress interface.
        let (next_hop, egress_iface) = match route.via {
            Some(via) => match self.routes.find_route(&via, None, None) {
                Some(egress) => (via, egress.iface),
                None => {
                    warn!("no route to next hop {via} for {dst}, dropping");
                    return;
                }
            },
            None => (dst, route.iface),
        };

        let resolved_src = src.or_else(|| self.bind_addr_for_iface(egress_iface));
        let ttl = ttl.unwrap_or(DEFAULT_TTL);

        match self.arp.lookup(&next_hop) {
            Some(mac) => {
                let ip_payload = IpPayload::new(resolved_src, dst, payload).with_ttl(ttl);
                let frame = EthernetFrame::new(mac, None, EthernetPayload::Ip(ip_payload));
                if let Some(i) = interfaces.get_mut(egress_iface) {
                    i.send(frame);
                }
            }
            None => {
                self.pending.push(PendingSend {
                    pending_ip: next_hop,
                    dst,
                    src: resolved_src,
                    iface: egress_iface,
                    ttl,
                    payload,
                });
                self.send_arp_request(interfaces, next_hop, egress_iface, false);
            }
        }
    }

    /// Broadcasts an ARP request for `ip`, unless one is already in
    /// flight (unless `force`).
    pub fn send_arp_request(
        &mut self,
        interfaces: &mut [Interface],
        ip: Ipv4Addr,
        iface: usize,
        force: bool,
    ) {
        if self.arp_timers.contains_key(&ip) && !force {
            return;
        }
        self.arp_timers.insert(ip, ARP_REQUEST_TIMEOUT);
        let src_mac = interfaces.get(iface).map(|i| i.mac());
        let src_ip = self.bind_addr_for_iface(iface);
        let frame = EthernetFrame::broadcast(
            src_mac,
            EthernetPayload::Arp(ArpPayload {
                request: true,
                src_mac,
                src_ip,
                dst_mac: None,
                dst_ip: Some(ip),
            }),
        );
        if let Some(i) = interfaces.get_mut(iface) {
            i.send(frame);
        }
    }

    pub fn send_arp_response(
        &mut self,
        interfaces: &mut [Interface],
        iface: usize,
        dst_mac: MacAddr,
        dst_ip: Ipv4Addr,
        src_ip: Ipv4Addr,
    ) {
        let src_mac = interfaces.get(iface).map(|i| i.mac());
        let frame = EthernetFrame::new(
            dst_mac,
            src_mac,
            EthernetPayload::Arp(ArpPayload {
                request: false,
                src_mac,
                src_ip: Some(src_ip),
                dst_mac: Some(dst_mac),
                dst_ip: Some(dst_ip),
            }),
        );
        if let Some(i) = interfaces.get_mut(iface) {
            i.send(frame);
        }
    }

    /// Broadcasts an unsolicited announcement of `addr`'s binding to this
    /// interface's MAC.
    pub fn send_garp(&mut self, interfaces: &mut [Interface], iface: usize, addr: Ipv4Addr) {
        let src_mac = interfaces.get(iface).map(|i| i.mac());
        let frame = EthernetFrame::broadcast(
            src_mac,
            EthernetPayload::Arp(ArpPayload {
                request: false,
                src_mac,
                src_ip: Some(addr),
                dst_mac: src_mac,
                dst_ip: Some(addr),
            }),
        );
        if let Some(i) = interfaces.get_mut(iface) {
            i.send(frame);
        }
    }

    /// Replays pending sends that were waiting on `ip`'s ARP resolution.
    fn unblock_pending(&mut self, interfaces: &mut [Interface], ip: Ipv4Addr) {
        self.arp_timers.remove(&ip);
        let mut ready = Vec::new();
        self.pending.retain(|p| {
            if p.pending_ip == ip {
                ready.push(p.clone());
                false
            } else {
                true
            }
        });
        for p in ready {
            self.send(interfaces, p.dst, p.payload, p.src, Some(p.iface), Some(p.ttl));
        }
    }

    /// Dispatches a received Ethernet payload to the ARP or IP handler.
    /// `frame_src_mac` is the sending interface's late-bound MAC, needed
    /// alongside an IP payload's own `src` for ARP learning.
    pub fn process_packet(
        &mut self,
        interfaces: &mut [Interface],
        frame_src_mac: Option<MacAddr>,
        payload: &EthernetPayload,
        iface: usize,
    ) {
        match payload {
            EthernetPayload::Arp(arp) => self.process_arp(interfaces, arp, iface),
            EthernetPayload::Ip(ip) => self.process_ip(interfaces, ip, frame_src_mac, iface),
            EthernetPayload::Opaque(_) => {}
        }
    }

    fn process_arp(&mut self, interfaces: &mut [Interface], arp: &ArpPayload, iface: usize) {
        if self.local_source(arp.src_ip, iface) {
            if let (Some(ip), Some(mac)) = (arp.src_ip, arp.src_mac) {
                self.arp.add(ip, mac);
                self.unblock_pending(interfaces, ip);
            }
        }
        if arp.request {
            if let Some(dst_ip) = arp.dst_ip {
                if self.is_bound(dst_ip) {
                    if let Some(requester_mac) = arp.src_mac {
                        let requester_ip = arp.src_ip.unwrap_or(Ipv4Addr::ANY);
                        self.send_arp_response(interfaces, iface, requester_mac, requester_ip, dst_ip);
                    }
                }
            }
        }
    }

    fn process_ip(
        &mut self,
        interfaces: &mut [Interface],
        ip: &IpPayload,
        frame_src_mac: Option<MacAddr>,
        iface: usize,
    ) {
        if let Some(src_ip) = ip.src {
            if self.local_source(Some(src_ip), iface) {
                if let Some(mac) = frame_src_mac {
                    self.arp.add(src_ip, mac);
                    self.unblock_pending(interfaces, src_ip);
                }
            }
        }

        let for_us = self.is_bound(ip.dst) || ip.dst.is_broadcast();
        if for_us {
            self.demux(interfaces, ip, iface);
            return;
        }

        if self.forward_packets {
            let new_ttl = ip.ttl.saturating_sub(1);
            if new_ttl == 0 {
                warn!("ttl exceeded forwarding ip packet to {}", ip.dst);
                return;
            }
            self.send(interfaces, ip.dst, (*ip.payload).clone(), ip.src, None, Some(new_ttl));
        }
    }

    fn demux(&mut self, interfaces: &mut [Interface], ip: &IpPayload, iface: usize) {
        match ip.payload.as_ref() {
            Ipv4Protocol::IcmpEcho { id, seq, payload } => {
                if let Some(src) = ip.src {
                    self.send(
                        interfaces,
                        src,
                        Ipv4Protocol::IcmpReply {
                            id: *id,
                            seq: *seq,
                            payload: payload.clone(),
                        },
                        Some(ip.dst),
                        Some(iface),
                        None,
                    );
                }
            }
            Ipv4Protocol::IcmpReply { id, seq, payload } => {
                self.deliver(
                    ProtocolKind::IcmpReply,
                    ip.dst,
                    *id,
                    Delivery::IcmpReply {
                        src: ip.src.unwrap_or(Ipv4Addr::ANY),
                        id: *id,
                        seq: *seq,
                        payload: payload.clone(),
                    },
                );
            }
            Ipv4Protocol::Udp(udp) => {
                self.deliver(
                    ProtocolKind::Udp,
                    ip.dst,
                    udp.dst_port,
                    Delivery::Udp {
                        src: ip.src.unwrap_or(Ipv4Addr::ANY),
                        src_port: udp.src_port,
                        dst_port: udp.dst_port,
                        payload: udp.payload.clone(),
                    },
                );
            }
            Ipv4Protocol::Dhcp(dhcp) => {
                let dst_port = match dhcp.kind {
                    DhcpKind::Discover | DhcpKind::Request => 67,
                    DhcpKind::Offer | DhcpKind::Ack | DhcpKind::Nack => 68,
                };
                self.deliver(
                    ProtocolKind::Udp,
                    ip.dst,
                    dst_port,
                    Delivery::Dhcp {
                        src: ip.src.unwrap_or(Ipv4Addr::ANY),
                        payload: dhcp.clone(),
                    },
                );
            }
        }
    }

    /// Per-tick job: decrements ARP-request and entry-TTL timers,
    /// discarding pending sends whose request expired.
    pub fn step(&mut self) {
        let mut expired = Vec::new();
        for (ip, timer) in self.arp_timers.iter_mut() {
            *timer = timer.saturating_sub(1);
            if *timer == 0 {
                expired.push(*ip);
            }
        }
        for ip in expired {
            self.arp_timers.remove(&ip);
            let had_pending = self.pending.iter().any(|p| p.pending_ip == ip);
            self.pending.retain(|p| p.pending_ip != ip);
            if had_pending {
                warn!("arp request for {ip} timed out, dropping pending sends");
            }
        }
        self.arp.expire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::MacAddr;

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    fn net(s: &str) -> Ipv4Network {
        s.parse().unwrap()
    }

    fn iface(mac: [u8; 6]) -> Interface {
        let mut i = Interface::new(MacAddr::new(mac), 4);
        i.connect();
        i
    }

    #[test]
    fn send_with_no_route_logs_and_drops() {
        let mut stack = IpStack::new(false);
        let mut ifaces = vec![iface([1, 0, 0, 0, 0, 1])];
        stack.send(&mut ifaces, ip("10.0.0.5"), Ipv4Protocol::Udp(UdpPayload {
            src_port: 1, dst_port: 2, payload: vec![],
        }), None, None, None);
        assert_eq!(ifaces[0].outbound_len(), 0);
    }

    #[test]
    fn send_with_unresolved_next_hop_queues_and_arps() {
        let mut stack = IpStack::new(false);
        let mut ifaces = vec![iface([1, 0, 0, 0, 0, 1])];
        stack.bind(&mut ifaces, ip("10.0.0.1"), net("10.0.0.0/24"), 0);
        // binding itself emits a GARP; drain it.
        ifaces[0].outbound_read();

        stack.send(&mut ifaces, ip("10.0.0.5"), Ipv4Protocol::Udp(UdpPayload {
            src_port: 1, dst_port: 2, payload: vec![],
        }), None, None, None);

        let frame = ifaces[0].outbound_read().expect("arp request sent");
        assert!(matches!(frame.payload, EthernetPayload::Arp(ArpPayload { request: true, .. })));
    }

    #[test]
    fn arp_reply_unblocks_pending_send() {
        let mut stack = IpStack::new(false);
        let mut ifaces = vec![iface([1, 0, 0, 0, 0, 1])];
        stack.bind(&mut ifaces, ip("10.0.0.1"), net("10.0.0.0/24"), 0);
        ifaces[0].outbound_read(); // drain GARP

        stack.send(&mut ifaces, ip("10.0.0.5"), Ipv4Protocol::Udp(UdpPayload {
            src_port: 1, dst_port: 2, payload: vec![],
        }), None, None, None);
        ifaces[0].outbound_read(); // drain ARP request

        let reply = ArpPayload {
            request: false,
            src_mac: Some(MacAddr::new([2, 0, 0, 0, 0, 2])),
            src_ip: Some(ip("10.0.0.5")),
            dst_mac: Some(MacAddr::new([1, 0, 0, 0, 0, 1])),
            dst_ip: Some(ip("10.0.0.1")),
        };
        stack.process_arp(&mut ifaces, &reply, 0);

        let frame = ifaces[0].outbound_read().expect("queued send replayed");
        assert!(matches!(frame.payload, EthernetPayload::Ip(_)));
    }

    #[test]
    fn icmp_echo_replies_with_swapped_addresses() {
        let mut stack = IpStack::new(false);
        let mut ifaces = vec![iface([1, 0, 0, 0, 0, 1])];
        stack.bind(&mut ifaces, ip("10.0.0.1"), net("10.0.0.0/24"), 0);
        ifaces[0].outbound_read(); // drain GARP
        stack.arp.add(ip("10.0.0.5"), MacAddr::new([2, 0, 0, 0, 0, 2]));

        let echo = IpPayload::new(
            Some(ip("10.0.0.5")),
            ip("10.0.0.1"),
            Ipv4Protocol::IcmpEcho { id: 1, seq: 1, payload: vec![9] },
        );
        stack.process_ip(&mut ifaces, &echo, Some(MacAddr::new([2, 0, 0, 0, 0, 2])), 0);

        let frame = ifaces[0].outbound_read().expect("reply sent");
        match frame.payload {
            EthernetPayload::Ip(reply) => match *reply.payload {
                Ipv4Protocol::IcmpReply { id, seq, payload } => {
                    assert_eq!((id, seq, payload), (1, 1, vec![9]));
                    assert_eq!(reply.dst, ip("10.0.0.5"));
                }
                other => panic!("expected IcmpReply, got {other:?}"),
            },
            other => panic!("expected Ip payload, got {other:?}"),
        }
    }

    #[test]
    fn udp_delivery_requires_a_bind() {
        let mut stack = IpStack::new(false);
        let mut ifaces = vec![iface([1, 0, 0, 0, 0, 1])];
        stack.bind(&mut ifaces, ip("10.0.0.1"), net("10.0.0.0/24"), 0);
        ifaces[0].outbound_read();

        let udp = IpPayload::new(
            Some(ip("10.0.0.5")),
            ip("10.0.0.1"),
            Ipv4Protocol::Udp(UdpPayload { src_port: 9, dst_port: 67, payload: vec![1] }),
        );
        stack.process_ip(&mut ifaces, &udp, Some(MacAddr::new([2, 0, 0, 0, 0, 2])), 0);
        assert!(stack
            .take_deliveries(ProtocolKind::Udp, ip("10.0.0.1"), 67)
            .is_empty());

        stack.bind_protocol(ProtocolKind::Udp, ip("10.0.0.1"), 67).unwrap();
        stack.process_ip(&mut ifaces, &udp, Some(MacAddr::new([2, 0, 0, 0, 0, 2])), 0);
        let delivered = stack.take_deliveries(ProtocolKind::Udp, ip("10.0.0.1"), 67);
        assert_eq!(delivered.len(), 1);
    }

    #[test]
    fn duplicate_protocol_bind_is_rejected() {
        let mut stack = IpStack::new(false);
        stack.bind_protocol(ProtocolKind::Udp, Ipv4Addr::ANY, 67).unwrap();
        assert_eq!(
            stack.bind_protocol(ProtocolKind::Udp, Ipv4Addr::ANY, 67),
            Err(SimError::ProtocolAlreadyBound)
        );
    }

    #[test]
    fn forwarding_decrements_ttl_and_drops_at_zero() {
        let mut stack = IpStack::new(true);
        let mut ifaces = vec![iface([1, 0, 0, 0, 0, 1]), iface([1, 0, 0, 0, 0, 2])];
        stack.bind(&mut ifaces, ip("10.0.0.1"), net("10.0.0.0/24"), 0);
        ifaces[0].outbound_read();
        stack.bind(&mut ifaces, ip("10.0.1.1"), net("10.0.1.0/24"), 1);
        ifaces[1].outbound_read();
        stack.arp.add(ip("10.0.1.2"), MacAddr::new([9, 0, 0, 0, 0, 9]));

        let forwarded = IpPayload::new(
            Some(ip("10.0.0.2")),
            ip("10.0.1.2"),
            Ipv4Protocol::Udp(UdpPayload { src_port: 1, dst_port: 2, payload: vec![] }),
        )
        .with_ttl(10);
        stack.process_ip(&mut ifaces, &forwarded, Some(MacAddr::new([3, 0, 0, 0, 0, 3])), 0);
        let frame = ifaces[1].outbound_read().expect("forwarded onward");
        match frame.payload {
            EthernetPayload::Ip(p) => assert_eq!(p.ttl, 9),
            other => panic!("expected Ip payload, got {other:?}"),
        }

        let dying = IpPayload::new(
            Some(ip("10.0.0.2")),
            ip("10.0.1.2"),
            Ipv4Protocol::Udp(UdpPayload { src_port: 1, dst_port: 2, payload: vec![] }),
        )
        .with_ttl(1);
        stack.process_ip(&mut ifaces, &dying, Some(MacAddr::new([3, 0, 0, 0, 0, 3])), 0);
        assert!(ifaces[1].outbound_read().is_none(), "ttl=1 should be dropped, not forwarded");
    }

    #[test]
    fn arp_request_timeout_discards_pending_sends() {
        let mut stack = IpStack::new(false);
        let mut ifaces = vec![iface([1, 0, 0, 0, 0, 1])];
        stack.bind(&mut ifaces, ip("10.0.0.1"), net("10.0.0.0/24"), 0);
        ifaces[0].outbound_read();

        stack.send(&mut ifaces, ip("10.0.0.5"), Ipv4Protocol::Udp(UdpPayload {
            src_port: 1, dst_port: 2, payload: vec![],
        }), None, None, None);
        ifaces[0].outbound_read(); // drain the ARP request

        for _ in 0..ARP_REQUEST_TIMEOUT {
            stack.step();
        }
        assert!(stack.pending.is_empty());
    }
}
