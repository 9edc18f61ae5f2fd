//! DHCP client: the lease-acquisition and renewal state machine over the
//! (UDP, ANY, 68) bind (`spec.md` §4.8). Grounded on
//! `original_source/src/networksim/application/dhcp/client.py`.

use log::warn;

use crate::addr::{Ipv4Addr, Ipv4Network, MacAddr};
use crate::packet::{dhcp::option_code, DhcpKind, DhcpOptionValue, DhcpPayload};
use crate::packet::{Ipv4Protocol, ProtocolKind};
use crate::stack::{Delivery, Route};

use super::super::{AppContext, Application};
use super::server::DEFAULT_LEASE_TIME;

/// Ticks a client waits for an answer before resending Discover/Request.
const REQUEST_RETRY_TICKS: u32 = 4;

/// The six states `spec.md` §4.8's transition table actually drives.
/// §3 additionally names a `REQUESTING` state, but the table's own rows
/// fold its behavior (resend Request, await Ack) into `SELECTING` — see
/// DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpClientState {
    Init,
    Selecting,
    InitReboot,
    Bound,
    Renewing,
    Rebinding,
}

pub struct DhcpClient {
    iface: usize,
    mac: MacAddr,
    state: DhcpClientState,
    xid: u32,
    request_timeout: u32,
    renew: u32,
    rebind: u32,
    expire: u32,
    bind: Option<(Ipv4Addr, Ipv4Network)>,
    server: Option<Ipv4Addr>,
    router: Option<Ipv4Addr>,
    nameservers: Vec<Ipv4Addr>,
    remembered_addr: Option<Ipv4Addr>,
    protocol_bound: bool,
    last_link_connected: bool,
}

impl DhcpClient {
    pub fn new(iface: usize, mac: MacAddr) -> Self {
        DhcpClient {
            iface,
            mac,
            state: DhcpClientState::Init,
            xid: 0,
            request_timeout: 0,
            renew: 0,
            rebind: 0,
            expire: 0,
            bind: None,
            server: None,
            router: None,
            nameservers: Vec::new(),
            remembered_addr: None,
            protocol_bound: false,
            last_link_connected: false,
        }
    }

    pub fn state(&self) -> DhcpClientState {
        self.state
    }

    pub fn bind(&self) -> Option<(Ipv4Addr, Ipv4Network)> {
        self.bind
    }

    fn on_link_down(&mut self, ctx: &mut AppContext) {
        match self.state {
            DhcpClientState::Init | DhcpClientState::InitReboot => {}
            DhcpClientState::Selecting => {
                self.state = if self.expire > 0 && self.remembered_addr.is_some() {
                    DhcpClientState::InitReboot
                } else {
                    DhcpClientState::Init
                };
            }
            DhcpClientState::Bound => {
                if let Some((addr, _)) = self.bind.take() {
                    ctx.stack.unbind(Some(addr), Some(self.iface));
                    self.remembered_addr = Some(addr);
                }
                self.state = DhcpClientState::InitReboot;
            }
            DhcpClientState::Renewing | DhcpClientState::Rebinding => {
                self.state = DhcpClientState::InitReboot;
            }
        }
    }

    fn derive_network(&self, dhcp: &DhcpPayload, your_ip: Ipv4Addr) -> Ipv4Network {
        dhcp.option(option_code::SUBNET_MASK)
            .and_then(|v| v.as_network())
            .unwrap_or_else(|| Ipv4Network::new(your_ip, 24))
    }

    fn install_bind(&mut self, ctx: &mut AppContext, addr: Ipv4Addr, network: Ipv4Network) {
        ctx.stack.bind(ctx.interfaces, addr, network, self.iface);
        if let Some(router) = self.router {
            ctx.stack
                .add_route(Route::new(Ipv4Network::new(Ipv4Addr::ANY, 0), self.iface).via(router));
        }
    }

    fn apply_lease(
        &mut self,
        dhcp: &DhcpPayload,
        your_ip: Ipv4Addr,
        network: Ipv4Network,
    ) {
        let lease_time = dhcp
            .option(option_code::LEASE_TIME)
            .and_then(|v| v.as_u32())
            .unwrap_or(DEFAULT_LEASE_TIME);
        let renew = dhcp
            .option(option_code::RENEWAL_TIME)
            .and_then(|v| v.as_u32())
            .unwrap_or(lease_time / 2);
        let rebind_at = dhcp
            .option(option_code::REBINDING_TIME)
            .and_then(|v| v.as_u32())
            .unwrap_or(lease_time * 3 / 4);

        self.renew = renew;
        self.rebind = rebind_at.saturating_sub(renew);
        self.expire = lease_time.saturating_sub(rebind_at);
        self.bind = Some((your_ip, network));
        self.server = dhcp.option(option_code::SERVER_ID).and_then(|v| v.as_ip());
        self.router = dhcp.option(option_code::ROUTER).and_then(|v| v.as_ip());
        self.nameservers = dhcp
            .option(option_code::DNS_SERVERS)
            .and_then(|v| v.as_ip_list())
            .map(|s| s.to_vec())
            .unwrap_or_default();
        self.remembered_addr = Some(your_ip);
    }

    fn handle_offer(&mut self, ctx: &mut AppContext, dhcp: &DhcpPayload) {
        if self.state != DhcpClientState::Init {
            return;
        }
        let your_ip = match dhcp.your_ip {
            Some(ip) => ip,
            None => return,
        };
        let network = self.derive_network(dhcp, your_ip);
        self.bind = Some((your_ip, network));
        self.server = dhcp.option(option_code::SERVER_ID).and_then(|v| v.as_ip());
        if let Some(xid) = dhcp.xid {
            self.xid = xid;
        }
        self.state = DhcpClientState::Selecting;
        self.send_request(ctx, true);
    }

    fn handle_ack(&mut self, ctx: &mut AppContext, dhcp: &DhcpPayload) {
        let your_ip = match dhcp.your_ip {
            Some(ip) => ip,
            None => return,
        };
        let network = self.derive_network(dhcp, your_ip);

        match self.state {
            DhcpClientState::Selecting
            | DhcpClientState::InitReboot
            | DhcpClientState::Renewing
            | DhcpClientState::Rebinding => {
                if let Some((bound_addr, bound_net)) = self.bind {
                    if self.state != DhcpClientState::Selecting
                        && self.state != DhcpClientState::InitReboot
                        && (bound_addr != your_ip || bound_net != network)
                    {
                        warn!("dhcp ack for {your_ip} doesn't match current bind {bound_addr}, discarding");
                        return;
                    }
                }
                self.apply_lease(dhcp, your_ip, network);
                self.install_bind(ctx, your_ip, network);
                self.state = DhcpClientState::Bound;
            }
            DhcpClientState::Init | DhcpClientState::Bound => {}
        }
    }

    fn handle_nack(&mut self, ctx: &mut AppContext) {
        match self.state {
            DhcpClientState::Selecting
            | DhcpClientState::InitReboot
            | DhcpClientState::Renewing
            | DhcpClientState::Rebinding => {
                if let Some((addr, _)) = self.bind.take() {
                    ctx.stack.unbind(Some(addr), Some(self.iface));
                }
                self.server = None;
                self.state = DhcpClientState::Init;
            }
            DhcpClientState::Init | DhcpClientState::Bound => {}
        }
    }

    fn send_discover(&mut self, ctx: &mut AppContext) {
        let mut discover = DhcpPayload::new(DhcpKind::Discover, self.mac).with_xid(self.xid);
        if let Some(addr) = self.remembered_addr {
            discover = discover.with_option(option_code::REQUESTED_IP, DhcpOptionValue::Ip(addr));
        }
        ctx.stack.send(
            ctx.interfaces,
            Ipv4Addr::BROADCAST,
            Ipv4Protocol::Dhcp(discover),
            None,
            Some(self.iface),
            None,
        );
    }

    fn send_request(&mut self, ctx: &mut AppContext, broadcast: bool) {
        let mut request = DhcpPayload::new(DhcpKind::Request, self.mac).with_xid(self.xid);
        let requested = self.bind.map(|(a, _)| a).or(self.remembered_addr);
        if let Some(addr) = requested {
            request = request.with_option(option_code::REQUESTED_IP, DhcpOptionValue::Ip(addr));
        }
        if let Some(server) = self.server {
            request = request.with_option(option_code::SERVER_ID, DhcpOptionValue::Ip(server));
        }
        let dst = if broadcast {
            Ipv4Addr::BROADCAST
        } else {
            self.server.unwrap_or(Ipv4Addr::BROADCAST)
        };
        let src = self.bind.map(|(a, _)| a);
        ctx.stack.send(
            ctx.interfaces,
            dst,
            Ipv4Protocol::Dhcp(request),
            src,
            Some(self.iface),
            None,
        );
    }

    fn tick_timers(&mut self, ctx: &mut AppContext) {
        match self.state {
            DhcpClientState::Init => {
                if self.request_timeout == 0 {
                    self.request_timeout = REQUEST_RETRY_TICKS;
                    self.send_discover(ctx);
                } else {
                    self.request_timeout -= 1;
                }
            }
            DhcpClientState::Selecting | DhcpClientState::InitReboot => {
                if self.request_timeout == 0 {
                    self.request_timeout = REQUEST_RETRY_TICKS;
                    self.send_request(ctx, true);
                } else {
                    self.request_timeout -= 1;
                }
            }
            DhcpClientState::Bound => {
                if self.renew == 0 {
                    self.state = DhcpClientState::Renewing;
                } else {
                    self.renew -= 1;
                }
            }
            DhcpClientState::Renewing => {
                if self.rebind == 0 {
                    self.state = DhcpClientState::Rebinding;
                } else {
                    self.rebind -= 1;
                    if self.request_timeout == 0 {
                        self.request_timeout = REQUEST_RETRY_TICKS;
                        self.send_request(ctx, false);
                    } else {
                        self.request_timeout -= 1;
                    }
                }
            }
            DhcpClientState::Rebinding => {
                if self.expire == 0 {
                    self.bind = None;
                    self.server = None;
                    self.state = DhcpClientState::Init;
                } else {
                    self.expire -= 1;
                    if self.request_timeout == 0 {
                        self.request_timeout = REQUEST_RETRY_TICKS;
                        self.send_request(ctx, true);
                    } else {
                        self.request_timeout -= 1;
                    }
                }
            }
        }
    }
}

impl Application for DhcpClient {
    fn name(&self) -> &str {
        "dhcp-client"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn step(&mut self, ctx: &mut AppContext) {
        if !self.protocol_bound {
            let _ = ctx.stack.bind_protocol(ProtocolKind::Udp, Ipv4Addr::ANY, 68);
            self.protocol_bound = true;
        }

        let connected = ctx.interfaces[self.iface].is_connected();
        if self.last_link_connected && !connected {
            self.on_link_down(ctx);
        }
        self.last_link_connected = connected;
        if !connected {
            return;
        }

        let deliveries = ctx.stack.take_deliveries(ProtocolKind::Udp, Ipv4Addr::ANY, 68);
        for delivery in deliveries {
            if let Delivery::Dhcp { payload, .. } = delivery {
                if payload.client_mac != Some(self.mac) {
                    continue;
                }
                match payload.kind {
                    DhcpKind::Offer => self.handle_offer(ctx, &payload),
                    DhcpKind::Ack => self.handle_ack(ctx, &payload),
                    DhcpKind::Nack => self.handle_nack(ctx),
                    DhcpKind::Discover | DhcpKind::Request => {}
                }
            }
        }

        self.tick_timers(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::Interface;
    use crate::rng::SimRng;
    use crate::stack::IpStack;

    fn ctx<'a>(
        stack: &'a mut IpStack,
        interfaces: &'a mut [Interface],
        rng: &'a mut SimRng,
    ) -> AppContext<'a> {
        AppContext { stack, interfaces, rng }
    }

    #[test]
    fn init_state_sends_discover_after_retry_window() {
        let mut stack = IpStack::new(false);
        let mut interfaces = vec![Interface::new(MacAddr::new([1, 0, 0, 0, 0, 1]), 4)];
        interfaces[0].connect();
        let mut rng = SimRng::from_seed(3);
        let mut client = DhcpClient::new(0, MacAddr::new([1, 0, 0, 0, 0, 1]));

        let mut c = ctx(&mut stack, &mut interfaces, &mut rng);
        client.step(&mut c);
        assert_eq!(client.state(), DhcpClientState::Init);
        assert_eq!(interfaces[0].outbound_len(), 1);
    }

    #[test]
    fn offer_moves_to_selecting_and_sends_request() {
        let mut stack = IpStack::new(false);
        let mut interfaces = vec![Interface::new(MacAddr::new([1, 0, 0, 0, 0, 1]), 4)];
        interfaces[0].connect();
        let mut rng = SimRng::from_seed(3);
        let mut client = DhcpClient::new(0, MacAddr::new([1, 0, 0, 0, 0, 1]));

        {
            let mut c = ctx(&mut stack, &mut interfaces, &mut rng);
            client.step(&mut c); // binds + sends discover
        }

        let mut offer = DhcpPayload::new(DhcpKind::Offer, MacAddr::new([1, 0, 0, 0, 0, 1]));
        offer.your_ip = Some("10.0.0.5".parse().unwrap());
        offer = offer.with_option(option_code::SERVER_ID, DhcpOptionValue::Ip("10.0.0.1".parse().unwrap()));
        {
            let mut c = ctx(&mut stack, &mut interfaces, &mut rng);
            client.handle_offer(&mut c, &offer);
        }
        assert_eq!(client.state(), DhcpClientState::Selecting);
        assert_eq!(client.bind().unwrap().0, "10.0.0.5".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn ack_binds_address_and_enters_bound_state() {
        let mut stack = IpStack::new(false);
        let mut interfaces = vec![Interface::new(MacAddr::new([1, 0, 0, 0, 0, 1]), 4)];
        interfaces[0].connect();
        let mut rng = SimRng::from_seed(3);
        let mut client = DhcpClient::new(0, MacAddr::new([1, 0, 0, 0, 0, 1]));
        client.state = DhcpClientState::Selecting;

        let mut ack = DhcpPayload::new(DhcpKind::Ack, MacAddr::new([1, 0, 0, 0, 0, 1]));
        ack.your_ip = Some("10.0.0.5".parse().unwrap());
        ack = ack
            .with_option(option_code::SUBNET_MASK, DhcpOptionValue::Network("10.0.0.0/24".parse().unwrap()))
            .with_option(option_code::LEASE_TIME, DhcpOptionValue::U32(100));

        let mut c = ctx(&mut stack, &mut interfaces, &mut rng);
        client.handle_ack(&mut c, &ack);

        assert_eq!(client.state(), DhcpClientState::Bound);
        assert!(stack.binds().iter().any(|b| b.addr == "10.0.0.5".parse::<Ipv4Addr>().unwrap()));
    }

    #[test]
    fn nack_clears_bind_and_returns_to_init() {
        let mut stack = IpStack::new(false);
        let mut interfaces = vec![Interface::new(MacAddr::new([1, 0, 0, 0, 0, 1]), 4)];
        interfaces[0].connect();
        let mut rng = SimRng::from_seed(3);
        let mut client = DhcpClient::new(0, MacAddr::new([1, 0, 0, 0, 0, 1]));
        client.state = DhcpClientState::Selecting;
        client.bind = Some(("10.0.0.5".parse().unwrap(), "10.0.0.0/24".parse().unwrap()));

        let mut c = ctx(&mut stack, &mut interfaces, &mut rng);
        client.handle_nack(&mut c);

        assert_eq!(client.state(), DhcpClientState::Init);
        assert!(client.bind().is_none());
    }

    #[test]
    fn link_down_while_bound_remembers_address_and_enters_init_reboot() {
        let mut stack = IpStack::new(false);
        let mut interfaces = vec![Interface::new(MacAddr::new([1, 0, 0, 0, 0, 1]), 4)];
        interfaces[0].connect();
        let mut rng = SimRng::from_seed(3);
        let mut client = DhcpClient::new(0, MacAddr::new([1, 0, 0, 0, 0, 1]));
        client.state = DhcpClientState::Bound;
        client.bind = Some(("10.0.0.5".parse().unwrap(), "10.0.0.0/24".parse().unwrap()));
        client.last_link_connected = true;
        stack.bind(&mut interfaces, "10.0.0.5".parse().unwrap(), "10.0.0.0/24".parse().unwrap(), 0);

        interfaces[0].disconnect();
        let mut c = ctx(&mut stack, &mut interfaces, &mut rng);
        client.step(&mut c);

        assert_eq!(client.state(), DhcpClientState::InitReboot);
        assert!(client.bind().is_none());
    }
}
