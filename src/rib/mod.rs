pub mod aggregate;
mod attributes;
pub mod decision;
pub mod policy;
mod prefix;

pub use attributes::{Origin, PathAttributes};
pub use policy::Relationship;
pub use prefix::Prefix;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;

use itertools::Itertools;
use log::{debug, trace};

/// A route as learned from one neighbor
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Route {
    pub prefix: Prefix,
    pub attributes: PathAttributes,
    // Neighbor that advertised this route
    pub peer: Ipv4Addr,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<Route {} via {} {}>",
            self.prefix, self.peer, self.attributes
        )
    }
}

/// Routes from a single neighbor
#[derive(Debug)]
struct PeerTable {
    peer: Ipv4Addr,
    // Exactly what the neighbor advertised, one route per prefix
    advertised: BTreeMap<Prefix, Route>,
    // Advertised prefixes and their summary, per distinct set of attributes
    groups: BTreeMap<PathAttributes, Group>,
    // Every group's summary, sorted by prefix; used for dumps
    aggregated: Vec<Route>,
}

#[derive(Debug, Default)]
struct Group {
    prefixes: BTreeSet<Prefix>,
    summary: BTreeSet<Prefix>,
}

impl PeerTable {
    fn new(peer: Ipv4Addr) -> Self {
        Self {
            peer,
            advertised: BTreeMap::new(),
            groups: BTreeMap::new(),
            aggregated: vec![],
        }
    }

    fn insert(&mut self, route: Route) -> Option<Route> {
        let prefix = route.prefix;
        let attributes = route.attributes.clone();
        let previous = self.advertised.insert(prefix, route);
        if let Some(previous) = &previous {
            if previous.attributes != attributes {
                self.ungroup(prefix, &previous.attributes);
            }
        }
        let group = self.groups.entry(attributes).or_default();
        if group.prefixes.insert(prefix) {
            group.summary = aggregate::summarize(group.prefixes.clone());
        }
        self.refresh_aggregated();
        previous
    }

    fn remove(&mut self, prefix: Prefix) -> Option<Route> {
        let route = self.advertised.remove(&prefix)?;
        self.ungroup(prefix, &route.attributes);
        self.refresh_aggregated();
        Some(route)
    }

    /// Take `prefix` out of its attribute group and re-summarize what is left
    fn ungroup(&mut self, prefix: Prefix, attributes: &PathAttributes) {
        if let Some(group) = self.groups.get_mut(attributes) {
            group.prefixes.remove(&prefix);
            if group.prefixes.is_empty() {
                self.groups.remove(attributes);
            } else {
                group.summary = aggregate::summarize(group.prefixes.clone());
            }
        }
    }

    fn refresh_aggregated(&mut self) {
        let peer = self.peer;
        self.aggregated = self
            .groups
            .iter()
            .flat_map(|(attributes, group)| {
                group.summary.iter().map(move |prefix| Route {
                    prefix: *prefix,
                    attributes: attributes.clone(),
                    peer,
                })
            })
            .sorted_by(|a, b| a.prefix.cmp(&b.prefix).then_with(|| a.attributes.cmp(&b.attributes)))
            .collect();
        if self.aggregated.len() != self.advertised.len() {
            trace!(
                "Aggregated {} prefixes into {} for {}",
                self.advertised.len(),
                self.aggregated.len(),
                peer
            );
        }
    }
}

/// Per-neighbor route storage.
///
/// Dumps and counts see the aggregated form. Lookups match against the
/// routes as advertised, so a summary never changes which route a packet
/// takes.
#[derive(Debug, Default)]
pub struct RouteStore {
    tables: BTreeMap<Ipv4Addr, PeerTable>,
}

impl RouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active (aggregated) routes
    pub fn len(&self) -> usize {
        self.tables.values().map(|t| t.aggregated.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a route from `peer`, replacing any earlier route for the same prefix
    pub fn insert(&mut self, peer: Ipv4Addr, route: Route) {
        debug_assert_eq!(peer, route.peer);
        let table = self
            .tables
            .entry(peer)
            .or_insert_with(|| PeerTable::new(peer));
        if let Some(previous) = table.insert(route) {
            trace!("Replaced {}", previous);
        }
        debug!(
            "RIB has {} routes from {} ({} advertised)",
            table.aggregated.len(),
            peer,
            table.advertised.len()
        );
    }

    /// Withdraw the route `peer` advertised for `prefix`.
    /// Returns false (and changes nothing) if there was no such route.
    pub fn remove(&mut self, peer: Ipv4Addr, prefix: Prefix) -> bool {
        let table = match self.tables.get_mut(&peer) {
            Some(table) => table,
            None => return false,
        };
        match table.remove(prefix) {
            Some(route) => {
                debug!("Withdrew {}", route);
                if table.advertised.is_empty() {
                    self.tables.remove(&peer);
                }
                true
            }
            None => {
                trace!("No route for {} from {} to withdraw", prefix, peer);
                false
            }
        }
    }

    /// Drop every route learned from `peer`
    pub fn withdraw_peer(&mut self, peer: Ipv4Addr) -> usize {
        let count = self
            .tables
            .remove(&peer)
            .map(|table| table.advertised.len())
            .unwrap_or(0);
        trace!("Removed {} routes from RIB for {}", count, peer);
        count
    }

    /// All active routes, grouped by neighbor.
    /// Cheap to call again; each call starts a fresh iteration.
    pub fn all(&self) -> impl Iterator<Item = &Route> + '_ {
        self.tables.values().flat_map(|table| table.aggregated.iter())
    }

    /// Active routes from a single neighbor
    pub fn routes_from_peer(&self, peer: Ipv4Addr) -> impl Iterator<Item = &Route> + '_ {
        self.tables
            .get(&peer)
            .into_iter()
            .flat_map(|table| table.aggregated.iter())
    }

    /// Longest-prefix match: every advertised route covering `addr` with the
    /// most specific matching prefix length
    pub fn lookup(&self, addr: Ipv4Addr) -> Vec<&Route> {
        self.tables
            .values()
            .flat_map(|table| table.advertised.values())
            .filter(|route| route.prefix.contains(addr))
            .max_set_by_key(|route| route.prefix.len())
    }
}
