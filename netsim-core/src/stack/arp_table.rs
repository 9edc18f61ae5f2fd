//! ARP cache: IP -> MAC with a per-entry countdown expiry.

use std::collections::HashMap;

use crate::addr::{Ipv4Addr, MacAddr};

/// Default ARP entry lifetime, in ticks (`spec.md` §3).
pub const DEFAULT_ARP_TTL: u32 = 250;

#[derive(Debug, Clone)]
struct ArpEntry {
    mac: MacAddr,
    ttl: u32,
}

/// IP -> MAC resolutions, each aged out `ttl` ticks after its last
/// refresh.
#[derive(Debug, Clone, Default)]
pub struct ArpTable {
    entries: HashMap<Ipv4Addr, ArpEntry>,
    default_ttl: u32,
}

impl ArpTable {
    pub fn new() -> Self {
        ArpTable {
            entries: HashMap::new(),
            default_ttl: DEFAULT_ARP_TTL,
        }
    }

    pub fn with_ttl(default_ttl: u32) -> Self {
        ArpTable {
            entries: HashMap::new(),
            default_ttl,
        }
    }

    /// Upserts `ip -> mac`, resetting the TTL to the configured default.
    pub fn add(&mut self, ip: Ipv4Addr, mac: MacAddr) {
        self.entries.insert(
            ip,
            ArpEntry {
                mac,
                ttl: self.default_ttl,
            },
        );
    }

    pub fn lookup(&self, ip: &Ipv4Addr) -> Option<MacAddr> {
        self.entries.get(ip).map(|e| e.mac)
    }

    pub fn contains(&self, ip: &Ipv4Addr) -> bool {
        self.entries.contains_key(ip)
    }

    /// Decrements every entry's TTL, evicting any that reach zero.
    pub fn expire(&mut self) {
        self.entries.retain(|_, entry| {
            entry.ttl = entry.ttl.saturating_sub(1);
            entry.ttl > 0
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ipv4Addr, MacAddr)> + '_ {
        self.entries.iter().map(|(ip, e)| (*ip, e.mac))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_persist_until_ttl_ticks_without_refresh() {
        let mut table = ArpTable::with_ttl(3);
        let ip: Ipv4Addr = "10.0.0.1".parse().unwrap();
        let mac = MacAddr::new([1, 2, 3, 4, 5, 6]);
        table.add(ip, mac);

        table.expire(); // ttl 3 -> 2
        assert!(table.contains(&ip));
        table.expire(); // ttl 2 -> 1
        assert!(table.contains(&ip));
        table.expire(); // ttl 1 -> 0, evicted
        assert!(!table.contains(&ip));
    }

    #[test]
    fn refresh_resets_ttl_to_max() {
        let mut table = ArpTable::with_ttl(2);
        let ip: Ipv4Addr = "10.0.0.1".parse().unwrap();
        let mac = MacAddr::new([1, 2, 3, 4, 5, 6]);
        table.add(ip, mac);
        table.expire(); // ttl 2 -> 1
        table.add(ip, mac); // refresh back to 2
        table.expire(); // 2 -> 1
        assert!(table.contains(&ip));
        table.expire(); // 1 -> 0
        assert!(!table.contains(&ip));
    }

    #[test]
    fn lookup_returns_none_for_unknown_ip() {
        let table = ArpTable::new();
        assert_eq!(table.lookup(&"10.0.0.1".parse().unwrap()), None);
    }
}
