//! Fixed-width addresses: 6-byte MAC and 4-byte IPv4, plus IPv4 networks.
//!
//! Both address types are immutable byte sequences with a distinguished
//! broadcast value, equality/hashing by bytes, and string parsing
//! (`FromStr`) in their conventional notations.

mod ipv4;
mod mac;
mod network;

pub use ipv4::Ipv4Addr;
pub use mac::MacAddr;
pub use network::Ipv4Network;

use crate::rng::SimRng;

/// Draws a random MAC address that is guaranteed not to equal the
/// broadcast address, as required by `spec.md` §3/§9.
pub fn random_mac(rng: &mut SimRng) -> MacAddr {
    loop {
        let bytes: [u8; 6] = core::array::from_fn(|_| rng.gen_u8());
        let mac = MacAddr::new(bytes);
        if mac != MacAddr::BROADCAST {
            return mac;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_mac_never_collides_with_broadcast() {
        let mut rng = SimRng::from_seed(1);
        for _ in 0..10_000 {
            assert_ne!(random_mac(&mut rng), MacAddr::BROADCAST);
        }
    }
}
