use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// A 4-byte IPv4 address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ipv4Addr([u8; 4]);

impl Ipv4Addr {
    /// The limited broadcast address `255.255.255.255`.
    pub const BROADCAST: Ipv4Addr = Ipv4Addr([255; 4]);

    /// `0.0.0.0`, used as the ANY key in protocol-callback lookups.
    pub const ANY: Ipv4Addr = Ipv4Addr([0; 4]);

    pub const fn new(octets: [u8; 4]) -> Self {
        Ipv4Addr(octets)
    }

    pub fn octets(&self) -> [u8; 4] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }

    fn as_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub(crate) fn from_u32(v: u32) -> Self {
        Ipv4Addr(v.to_be_bytes())
    }

    /// Bitwise AND against another address, used for network masking.
    pub fn mask(&self, mask: &Ipv4Addr) -> Ipv4Addr {
        Ipv4Addr::from_u32(self.as_u32() & mask.as_u32())
    }
}

impl fmt::Debug for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ipv4Addr({})", self)
    }
}

impl fmt::Display for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

impl FromStr for Ipv4Addr {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return Err(SimError::AddressParseError(s.to_string()));
        }
        let mut octets = [0u8; 4];
        for (i, part) in parts.iter().enumerate() {
            octets[i] = part
                .parse::<u8>()
                .map_err(|_| SimError::AddressParseError(s.to_string()))?;
        }
        Ok(Ipv4Addr(octets))
    }
}

impl TryFrom<&[u8]> for Ipv4Addr {
    type Error = SimError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != 4 {
            return Err(SimError::InvalidAddressLength {
                expected: 4,
                actual: value.len(),
            });
        }
        let mut octets = [0u8; 4];
        octets.copy_from_slice(value);
        Ok(Ipv4Addr(octets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_decimal() {
        let ip: Ipv4Addr = "10.0.0.1".parse().unwrap();
        assert_eq!(ip.octets(), [10, 0, 0, 1]);
    }

    #[test]
    fn display_round_trips_through_parse() {
        let ip = Ipv4Addr::new([192, 168, 1, 5]);
        let parsed: Ipv4Addr = ip.to_string().parse().unwrap();
        assert_eq!(ip, parsed);
    }

    #[test]
    fn mask_zeroes_host_bits() {
        let ip = Ipv4Addr::new([10, 0, 0, 42]);
        let mask = Ipv4Addr::new([255, 255, 255, 0]);
        assert_eq!(ip.mask(&mask), Ipv4Addr::new([10, 0, 0, 0]));
    }

    #[test]
    fn rejects_out_of_range_octet() {
        assert!("10.0.0.999".parse::<Ipv4Addr>().is_err());
    }
}
