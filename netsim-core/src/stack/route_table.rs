//! The route table: longest-prefix-match lookup over an ordered list of
//! routes, with optional `via`/`src` filters.

use crate::addr::{Ipv4Addr, Ipv4Network};

/// A single route: a network, the egress interface port, and optional
/// `via`/`src` constraints (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub network: Ipv4Network,
    pub iface: usize,
    pub via: Option<Ipv4Addr>,
    pub src: Option<Ipv4Addr>,
}

impl Route {
    pub fn new(network: Ipv4Network, iface: usize) -> Self {
        Route {
            network,
            iface,
            via: None,
            src: None,
        }
    }

    pub fn via(mut self, via: Ipv4Addr) -> Self {
        self.via = Some(via);
        self
    }

    pub fn src(mut self, src: Ipv4Addr) -> Self {
        self.src = Some(src);
        self
    }

    /// A query with no `src` never excludes a route on account of the
    /// route's own `src` field — only an explicit, mismatched query `src`
    /// does. This is what lets a connected route installed by `bind()`
    /// (which records `src = <bound address>`) still serve ordinary sends
    /// that don't specify a source up front.
    fn matches_filters(&self, src: Option<Ipv4Addr>, iface: Option<usize>) -> bool {
        if let (Some(want_src), Some(got_src)) = (self.src, src) {
            if want_src != got_src {
                return false;
            }
        }
        if let Some(want_iface) = iface {
            if self.iface != want_iface {
                return false;
            }
        }
        true
    }
}

/// Routes kept sorted ascending by `match_bits`, so a simple forward scan
/// that keeps overwriting its best-so-far naturally ends on the
/// longest (and, among ties, last-inserted — see SPEC_FULL.md "Open
/// Question resolutions") matching prefix.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        RouteTable { routes: Vec::new() }
    }

    /// Inserts a route, keeping the table sorted ascending by
    /// `match_bits`. Stable sort preserves relative insertion order among
    /// routes with equal `match_bits`.
    pub fn add(&mut self, route: Route) {
        self.routes.push(route);
        self.routes.sort_by_key(|r| r.network.match_bits());
    }

    pub fn remove(&mut self, route: &Route) {
        self.routes.retain(|r| r != route);
    }

    /// Removes every route matching every supplied field; `None` fields
    /// act as wildcards (`spec.md` §4.5).
    pub fn del_routes(
        &mut self,
        network: Option<Ipv4Network>,
        iface: Option<usize>,
        via: Option<Ipv4Addr>,
        src: Option<Ipv4Addr>,
    ) {
        self.routes.retain(|r| {
            let net_match = network.map(|n| n == r.network).unwrap_or(true);
            let iface_match = iface.map(|i| i == r.iface).unwrap_or(true);
            let via_match = via.map(|v| Some(v) == r.via).unwrap_or(true);
            let src_match = src.map(|s| Some(s) == r.src).unwrap_or(true);
            !(net_match && iface_match && via_match && src_match)
        });
    }

    /// Longest-prefix-match lookup, honoring the optional `src`/`iface`
    /// filters (`spec.md` §4.5).
    pub fn find_route(
        &self,
        dst: &Ipv4Addr,
        src: Option<Ipv4Addr>,
        iface: Option<usize>,
    ) -> Option<&Route> {
        let mut best: Option<&Route> = None;
        for route in &self.routes {
            if !route.network.contains(dst) {
                continue;
            }
            if !route.matches_filters(src, iface) {
                continue;
            }
            match best {
                Some(current) if current.network.match_bits() > route.network.match_bits() => {}
                _ => best = Some(route),
            }
        }
        best
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
