//! DHCP server: pool/lease management over the (UDP, ANY, 67) bind
//! (`spec.md` §4.7). Grounded on
//! `original_source/src/networksim/application/dhcp/server.py`.

use std::collections::HashMap;

use log::warn;

use crate::addr::{Ipv4Addr, Ipv4Network, MacAddr};
use crate::packet::{dhcp::option_code, DhcpKind, DhcpOptionValue, DhcpPayload};
use crate::packet::{Ipv4Protocol, ProtocolKind};
use crate::stack::Delivery;

use super::super::{AppContext, Application};

/// Option 51 default lease time, in ticks (`spec.md` §4.8).
pub const DEFAULT_LEASE_TIME: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub addr: Ipv4Addr,
    pub mac: MacAddr,
    pub expires: u32,
}

/// Owns a pool of addresses, hands them out on Discover/Request, and
/// reclaims them on lease expiry.
pub struct DhcpServer {
    bound_addr: Ipv4Addr,
    network: Ipv4Network,
    iface: usize,
    pool: Vec<Ipv4Addr>,
    leases: HashMap<MacAddr, Lease>,
    lease_time: u32,
    router: Option<Ipv4Addr>,
    nameservers: Vec<Ipv4Addr>,
    protocol_bound: bool,
}

impl DhcpServer {
    pub fn new(
        bound_addr: Ipv4Addr,
        network: Ipv4Network,
        iface: usize,
        pool: Vec<Ipv4Addr>,
        lease_time: u32,
    ) -> Self {
        DhcpServer {
            bound_addr,
            network,
            iface,
            pool,
            leases: HashMap::new(),
            lease_time,
            router: None,
            nameservers: Vec::new(),
            protocol_bound: false,
        }
    }

    pub fn with_router(mut self, router: Ipv4Addr) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_nameservers(mut self, nameservers: Vec<Ipv4Addr>) -> Self {
        self.nameservers = nameservers;
        self
    }

    pub fn leases(&self) -> &HashMap<MacAddr, Lease> {
        &self.leases
    }

    pub fn pool_remaining(&self) -> usize {
        self.pool.len()
    }

    fn take_pool_addr(
        &mut self,
        ctx: &mut AppContext,
        requested: Option<Ipv4Addr>,
    ) -> Option<Ipv4Addr> {
        if let Some(r) = requested {
            if let Some(pos) = self.pool.iter().position(|a| *a == r) {
                return Some(self.pool.remove(pos));
            }
        }
        if self.pool.is_empty() {
            return None;
        }
        let idx = ctx.rng.gen_range_usize(0..self.pool.len());
        Some(self.pool.remove(idx))
    }

    fn return_to_pool(&mut self, addr: Ipv4Addr) {
        if !self.pool.contains(&addr) {
            self.pool.push(addr);
        }
    }

    fn base_options(&self) -> Vec<(u8, DhcpOptionValue)> {
        let mut opts = vec![
            (option_code::SUBNET_MASK, DhcpOptionValue::Network(self.network)),
            (option_code::LEASE_TIME, DhcpOptionValue::U32(self.lease_time)),
            (option_code::SERVER_ID, DhcpOptionValue::Ip(self.bound_addr)),
            (option_code::RENEWAL_TIME, DhcpOptionValue::U32(self.lease_time / 2)),
            (
                option_code::REBINDING_TIME,
                DhcpOptionValue::U32(self.lease_time * 3 / 4),
            ),
        ];
        if let Some(router) = self.router {
            opts.push((option_code::ROUTER, DhcpOptionValue::Ip(router)));
        }
        if !self.nameservers.is_empty() {
            opts.push((option_code::DNS_SERVERS, DhcpOptionValue::IpList(self.nameservers.clone())));
        }
        opts
    }

    fn handle_discover(&mut self, ctx: &mut AppContext, dhcp: &DhcpPayload) {
        let client_mac = match dhcp.client_mac {
            Some(m) => m,
            None => return,
        };
        let requested = dhcp.option(option_code::REQUESTED_IP).and_then(|v| v.as_ip());

        let addr = if let Some(existing) = self.leases.get(&client_mac) {
            existing.addr
        } else {
            match self.take_pool_addr(ctx, requested) {
                Some(a) => a,
                None => {
                    warn!("dhcp pool exhausted on {}", self.bound_addr);
                    return;
                }
            }
        };
        self.leases.insert(
            client_mac,
            Lease {
                addr,
                mac: client_mac,
                expires: self.lease_time,
            },
        );

        let mut offer = DhcpPayload::new(DhcpKind::Offer, client_mac);
        offer.your_ip = Some(addr);
        offer.server_ip = Some(self.bound_addr);
        if let Some(xid) = dhcp.xid {
            offer = offer.with_xid(xid);
        }
        for (code, value) in self.base_options() {
            offer = offer.with_option(code, value);
        }

        ctx.stack.send(
            ctx.interfaces,
            Ipv4Addr::BROADCAST,
            Ipv4Protocol::Dhcp(offer),
            Some(self.bound_addr),
            Some(self.iface),
            None,
        );
    }

    fn handle_request(&mut self, ctx: &mut AppContext, dhcp: &DhcpPayload) {
        let client_mac = match dhcp.client_mac {
            Some(m) => m,
            None => return,
        };

        if let Some(server_id) = dhcp.option(option_code::SERVER_ID).and_then(|v| v.as_ip()) {
            if server_id != self.bound_addr {
                if let Some(lease) = self.leases.remove(&client_mac) {
                    self.return_to_pool(lease.addr);
                }
                return;
            }
        }

        let requested = dhcp.option(option_code::REQUESTED_IP).and_then(|v| v.as_ip());
        let grantable = requested
            .map(|r| !self.leases.values().any(|l| l.addr == r && l.mac != client_mac))
            .unwrap_or(false);

        if let (Some(addr), true) = (requested, grantable) {
            if let Some(pos) = self.pool.iter().position(|a| *a == addr) {
                self.pool.remove(pos);
            }
            self.leases.insert(
                client_mac,
                Lease {
                    addr,
                    mac: client_mac,
                    expires: self.lease_time,
                },
            );
            let mut ack = DhcpPayload::new(DhcpKind::Ack, client_mac);
            ack.your_ip = Some(addr);
            ack.server_ip = Some(self.bound_addr);
            if let Some(xid) = dhcp.xid {
                ack = ack.with_xid(xid);
            }
            for (code, value) in self.base_options() {
                ack = ack.with_option(code, value);
            }
            ctx.stack.send(
                ctx.interfaces,
                Ipv4Addr::BROADCAST,
                Ipv4Protocol::Dhcp(ack),
                Some(self.bound_addr),
                Some(self.iface),
                None,
            );
        } else {
            if let Some(lease) = self.leases.remove(&client_mac) {
                self.return_to_pool(lease.addr);
            }
            let mut nack = DhcpPayload::new(DhcpKind::Nack, client_mac);
            nack.server_ip = Some(self.bound_addr);
            if let Some(xid) = dhcp.xid {
                nack = nack.with_xid(xid);
            }
            ctx.stack.send(
                ctx.interfaces,
                Ipv4Addr::BROADCAST,
                Ipv4Protocol::Dhcp(nack),
                Some(self.bound_addr),
                Some(self.iface),
                None,
            );
        }
    }
}

impl Application for DhcpServer {
    fn name(&self) -> &str {
        "dhcp-server"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn step(&mut self, ctx: &mut AppContext) {
        if !self.protocol_bound {
            let _ = ctx.stack.bind_protocol(ProtocolKind::Udp, Ipv4Addr::ANY, 67);
            self.protocol_bound = true;
        }

        let mut expired = Vec::new();
        for (mac, lease) in self.leases.iter_mut() {
            lease.expires = lease.expires.saturating_sub(1);
            if lease.expires == 0 {
                expired.push((*mac, lease.addr));
            }
        }
        for (mac, addr) in expired {
            self.leases.remove(&mac);
            self.return_to_pool(addr);
        }

        let deliveries = ctx.stack.take_deliveries(ProtocolKind::Udp, Ipv4Addr::ANY, 67);
        for delivery in deliveries {
            if let Delivery::Dhcp { payload, .. } = delivery {
                match payload.kind {
                    DhcpKind::Discover => self.handle_discover(ctx, &payload),
                    DhcpKind::Request => self.handle_request(ctx, &payload),
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::Interface;
    use crate::rng::SimRng;
    use crate::stack::IpStack;

    fn pool() -> Vec<Ipv4Addr> {
        vec!["192.168.1.26".parse().unwrap(), "192.168.1.27".parse().unwrap()]
    }

    #[test]
    fn discover_assigns_from_pool_and_reuses_for_same_mac() {
        let mut stack = IpStack::new(false);
        let mut interfaces = vec![Interface::new(MacAddr::new([1, 0, 0, 0, 0, 1]), 4)];
        interfaces[0].connect();
        let mut rng = SimRng::from_seed(7);

        let mut server = DhcpServer::new(
            "192.168.1.5".parse().unwrap(),
            "192.168.1.0/24".parse().unwrap(),
            0,
            pool(),
            500,
        );
        let client_mac = MacAddr::new([9, 0, 0, 0, 0, 9]);
        let discover = DhcpPayload::new(DhcpKind::Discover, client_mac);

        {
            let mut ctx = AppContext {
                stack: &mut stack,
                interfaces: &mut interfaces,
                rng: &mut rng,
            };
            server.step(&mut ctx); // binds protocol
            server.handle_discover(&mut ctx, &discover);
        }

        assert_eq!(server.leases().len(), 1);
        assert_eq!(server.pool_remaining(), 1);
        let assigned = server.leases().get(&client_mac).unwrap().addr;

        // A second discover from the same MAC reuses the existing lease.
        {
            let mut ctx = AppContext {
                stack: &mut stack,
                interfaces: &mut interfaces,
                rng: &mut rng,
            };
            server.handle_discover(&mut ctx, &discover);
        }
        assert_eq!(server.leases().get(&client_mac).unwrap().addr, assigned);
        assert_eq!(server.pool_remaining(), 1);
    }

    #[test]
    fn lease_expiry_returns_address_to_pool() {
        let mut stack = IpStack::new(false);
        let mut interfaces = vec![Interface::new(MacAddr::new([1, 0, 0, 0, 0, 1]), 4)];
        interfaces[0].connect();
        let mut rng = SimRng::from_seed(1);
        let mut server = DhcpServer::new(
            "192.168.1.5".parse().unwrap(),
            "192.168.1.0/24".parse().unwrap(),
            0,
            pool(),
            2,
        );
        let client_mac = MacAddr::new([9, 0, 0, 0, 0, 9]);
        let discover = DhcpPayload::new(DhcpKind::Discover, client_mac);
        {
            let mut ctx = AppContext { stack: &mut stack, interfaces: &mut interfaces, rng: &mut rng };
            server.handle_discover(&mut ctx, &discover);
        }
        assert_eq!(server.pool_remaining(), 1);

        for _ in 0..3 {
            let mut ctx = AppContext { stack: &mut stack, interfaces: &mut interfaces, rng: &mut rng };
            server.step(&mut ctx);
        }
        assert_eq!(server.pool_remaining(), 2, "expired lease should return to pool");
        assert!(server.leases().is_empty());
    }
}
