use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use super::Ipv4Addr;
use crate::error::SimError;

/// An IPv4 network: a base address plus the number of high bits that must
/// match (`match_bits`, aka prefix length).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ipv4Network {
    base: Ipv4Addr,
    match_bits: u8,
}

impl Ipv4Network {
    pub fn new(base: Ipv4Addr, match_bits: u8) -> Self {
        let match_bits = match_bits.min(32);
        Ipv4Network {
            base: base.mask(&Self::mask_for(match_bits)),
            match_bits,
        }
    }

    pub fn base(&self) -> Ipv4Addr {
        self.base
    }

    pub fn match_bits(&self) -> u8 {
        self.match_bits
    }

    fn mask_for(match_bits: u8) -> Ipv4Addr {
        if match_bits == 0 {
            Ipv4Addr::new([0, 0, 0, 0])
        } else {
            let mask = !0u32 << (32 - match_bits as u32);
            Ipv4Addr::from_u32(mask)
        }
    }

    /// `(addr AND mask) == (base AND mask)`.
    pub fn contains(&self, addr: &Ipv4Addr) -> bool {
        addr.mask(&Self::mask_for(self.match_bits)) == self.base
    }

    /// A `/32` network containing only `addr`.
    pub fn host(addr: Ipv4Addr) -> Self {
        Ipv4Network::new(addr, 32)
    }
}

impl fmt::Debug for Ipv4Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ipv4Network({})", self)
    }
}

impl fmt::Display for Ipv4Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.match_bits)
    }
}

impl FromStr for Ipv4Network {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, bits) = s
            .split_once('/')
            .ok_or_else(|| SimError::AddressParseError(s.to_string()))?;
        let base: Ipv4Addr = base.parse()?;
        let bits: u8 = bits
            .parse()
            .map_err(|_| SimError::AddressParseError(s.to_string()))?;
        if bits > 32 {
            return Err(SimError::AddressParseError(s.to_string()));
        }
        Ok(Ipv4Network::new(base, bits))
    }
}
