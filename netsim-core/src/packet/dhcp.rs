//! DHCP message payload and its code-keyed options map.
//!
//! The original implementation keeps DHCP options in a loosely-typed
//! dict (`{code: value}`); per the Design Note in `spec.md` §9 we keep it
//! code-keyed but give the values a small closed type instead of `Any`.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use crate::addr::{Ipv4Addr, MacAddr, Ipv4Network};

/// Standard DHCPv4 option codes used by this simulator (`spec.md` §6).
pub mod option_code {
    pub const SUBNET_MASK: u8 = 1;
    pub const ROUTER: u8 = 3;
    pub const DNS_SERVERS: u8 = 6;
    pub const REQUESTED_IP: u8 = 50;
    pub const LEASE_TIME: u8 = 51;
    pub const SERVER_ID: u8 = 54;
    pub const RENEWAL_TIME: u8 = 58;
    pub const REBINDING_TIME: u8 = 59;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DhcpKind {
    Discover,
    Offer,
    Request,
    Ack,
    Nack,
}

/// A typed DHCP option value, keyed by its standard option code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DhcpOptionValue {
    Ip(Ipv4Addr),
    IpList(Vec<Ipv4Addr>),
    U32(u32),
    Network(Ipv4Network),
}

impl DhcpOptionValue {
    pub fn as_ip(&self) -> Option<Ipv4Addr> {
        match self {
            DhcpOptionValue::Ip(ip) => Some(*ip),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            DhcpOptionValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ip_list(&self) -> Option<&[Ipv4Addr]> {
        match self {
            DhcpOptionValue::IpList(ips) => Some(ips),
            _ => None,
        }
    }

    pub fn as_network(&self) -> Option<Ipv4Network> {
        match self {
            DhcpOptionValue::Network(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DhcpPayload {
    pub kind: DhcpKind,
    pub client_ip: Option<Ipv4Addr>,
    pub your_ip: Option<Ipv4Addr>,
    pub server_ip: Option<Ipv4Addr>,
    pub gateway_ip: Option<Ipv4Addr>,
    pub client_mac: Option<MacAddr>,
    pub options: BTreeMap<u8, DhcpOptionValue>,
    /// Transaction id, supplementing the original's `xid` (see SPEC_FULL.md
    /// §7) so a client can tell overlapping exchanges apart.
    pub xid: Option<u32>,
}

impl DhcpPayload {
    pub fn new(kind: DhcpKind, client_mac: MacAddr) -> Self {
        DhcpPayload {
            kind,
            client_ip: None,
            your_ip: None,
            server_ip: None,
            gateway_ip: None,
            client_mac: Some(client_mac),
            options: BTreeMap::new(),
            xid: None,
        }
    }

    pub fn option(&self, code: u8) -> Option<&DhcpOptionValue> {
        self.options.get(&code)
    }

    pub fn with_option(mut self, code: u8, value: DhcpOptionValue) -> Self {
        self.options.insert(code, value);
        self
    }

    pub fn with_xid(mut self, xid: u32) -> Self {
        self.xid = Some(xid);
        self
    }
}
