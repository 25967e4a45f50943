use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;
use std::net::Ipv4Addr;

use log::{debug, info, trace, warn};

use crate::config::NeighborConfig;
use crate::models::{Announcement, Body, Message, TableEntry, Withdrawal};
use crate::rib::{decision, policy, Prefix, Relationship, RouteStore};
use crate::utils::local_address;

/// A message to be sent to a neighbor
#[derive(Clone, Debug, PartialEq)]
pub struct Outbound {
    pub to: Ipv4Addr,
    pub message: Message,
}

impl Outbound {
    fn new(to: Ipv4Addr, message: Message) -> Self {
        Self { to, message }
    }
}

impl fmt::Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.message, self.to)
    }
}

/// Handles messages from neighbors one at a time.
///
/// Owns the route store; every mutation happens through `handle()`, and the
/// caller is responsible for sending the returned messages before handing
/// over the next one.
#[derive(Debug)]
pub struct Router {
    asn: u32,
    neighbors: BTreeMap<Ipv4Addr, Relationship>,
    rib: RouteStore,
}

impl Router {
    pub fn new(asn: u32, neighbors: &[NeighborConfig]) -> Self {
        Self {
            asn,
            neighbors: neighbors
                .iter()
                .map(|n| (n.addr, n.relationship))
                .collect(),
            rib: RouteStore::new(),
        }
    }

    pub fn asn(&self) -> u32 {
        self.asn
    }

    pub fn rib(&self) -> &RouteStore {
        &self.rib
    }

    /// Process one message received over the channel to `from`
    pub fn handle(&mut self, from: Ipv4Addr, message: Message) -> Vec<Outbound> {
        if !self.neighbors.contains_key(&from) {
            warn!("Ignoring {} from unknown neighbor {}", message, from);
            return vec![];
        }
        trace!("Received {} via {}", message, from);
        let Message { src, dst, body } = message;
        match body {
            Body::Update(announcement) => self.update(from, src, announcement),
            Body::Revoke(withdrawals) => self.revoke(from, src, withdrawals),
            Body::Data(payload) => self.forward(from, Message::new(src, dst, Body::Data(payload))),
            Body::Dump(_) => self.dump(from, src),
            other => {
                debug!("No action for {} from {}", other.kind(), src);
                vec![self.no_route(from, src)]
            }
        }
    }

    /// Reply to something from `from` that couldn't be decoded.
    /// `src` is the sender named in the message, if it was readable.
    pub fn handle_malformed(&self, from: Ipv4Addr, src: Option<Ipv4Addr>) -> Vec<Outbound> {
        vec![self.no_route(from, src.unwrap_or(from))]
    }

    /// The channel to `neighbor` is gone, forget everything it told us
    pub fn neighbor_down(&mut self, neighbor: Ipv4Addr) -> usize {
        for route in self.rib.routes_from_peer(neighbor) {
            trace!("Dropping {}", route);
        }
        let count = self.rib.withdraw_peer(neighbor);
        info!("Neighbor {} down, withdrew {} routes", neighbor, count);
        count
    }

    fn update(&mut self, from: Ipv4Addr, src: Ipv4Addr, announcement: Announcement) -> Vec<Outbound> {
        let route = match announcement.to_route(from) {
            Ok(route) => route,
            Err(err) => {
                warn!("Invalid update from {}: {}", src, err);
                return vec![self.no_route(from, src)];
            }
        };
        debug!("Learned {}", route);
        self.rib.insert(from, route);

        let propagated = announcement.propagated(self.asn);
        self.export_targets(from)
            .into_iter()
            .map(|to| {
                let message = Message::new(local_address(to), to, Body::Update(propagated.clone()));
                Outbound::new(to, message)
            })
            .collect()
    }

    fn revoke(&mut self, from: Ipv4Addr, src: Ipv4Addr, withdrawals: Vec<Withdrawal>) -> Vec<Outbound> {
        let prefixes: Result<Vec<Prefix>, _> = withdrawals.iter().map(Prefix::try_from).collect();
        let prefixes = match prefixes {
            Ok(prefixes) => prefixes,
            Err(err) => {
                warn!("Invalid revoke from {}: {}", src, err);
                return vec![self.no_route(from, src)];
            }
        };
        let removed = prefixes
            .into_iter()
            .filter(|prefix| self.rib.remove(from, *prefix))
            .count();
        debug!(
            "Revoke from {}: withdrew {} of {} prefixes",
            from,
            removed,
            withdrawals.len()
        );

        self.export_targets(from)
            .into_iter()
            .map(|to| {
                let message = Message::new(local_address(to), to, Body::Revoke(withdrawals.clone()));
                Outbound::new(to, message)
            })
            .collect()
    }

    /// Send a data packet toward its destination, or say there's no route
    fn forward(&self, from: Ipv4Addr, packet: Message) -> Vec<Outbound> {
        let candidates = self.rib.lookup(packet.dst);
        let best = match decision::best_route(candidates) {
            Some(route) => route,
            None => {
                debug!("No route to {} for packet from {}", packet.dst, packet.src);
                return vec![self.no_route(from, packet.src)];
            }
        };
        if !self.may_send(best.peer, from) {
            debug!(
                "Best route to {} is {}, not usable for traffic from {}",
                packet.dst, best.peer, from
            );
            return vec![self.no_route(from, packet.src)];
        }
        trace!("Forwarding {} via {}", packet, best);
        vec![Outbound::new(best.peer, packet)]
    }

    fn dump(&self, from: Ipv4Addr, src: Ipv4Addr) -> Vec<Outbound> {
        let table: Vec<TableEntry> = self.rib.all().map(TableEntry::from).collect();
        debug!("Dumping {} routes to {}", table.len(), src);
        let message = Message::new(local_address(from), src, Body::Table(table));
        vec![Outbound::new(from, message)]
    }

    fn no_route(&self, from: Ipv4Addr, dst: Ipv4Addr) -> Outbound {
        Outbound::new(from, Message::no_route(local_address(from), dst))
    }

    /// May something learned from `learned_from` be sent to `sent_to`?
    fn may_send(&self, learned_from: Ipv4Addr, sent_to: Ipv4Addr) -> bool {
        match (
            self.neighbors.get(&learned_from),
            self.neighbors.get(&sent_to),
        ) {
            (Some(from), Some(to)) => policy::may_export(*from, *to),
            _ => false,
        }
    }

    /// Neighbors (other than the source) that may hear about routes from `from`
    fn export_targets(&self, from: Ipv4Addr) -> Vec<Ipv4Addr> {
        self.neighbors
            .keys()
            .copied()
            .filter(|to| *to != from && self.may_send(from, *to))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rib::Origin;
    use serde_json::{json, Value};

    const CUST: &str = "192.168.0.2";
    const PEER: &str = "172.168.0.2";
    const PROV: &str = "10.0.0.2";
    const CUST2: &str = "192.168.1.2";

    fn empty() -> Value {
        Value::Object(Default::default())
    }

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    fn router() -> Router {
        let neighbors: Vec<NeighborConfig> = [
            "192.168.0.2-cust",
            "172.168.0.2-peer",
            "10.0.0.2-prov",
            "192.168.1.2-cust",
        ]
        .iter()
        .map(|n| n.parse().unwrap())
        .collect();
        Router::new(7, &neighbors)
    }

    fn update(from: &str, network: &str, netmask: &str, local_pref: u32, path: &[u32]) -> Message {
        let announcement = Announcement {
            network: ip(network),
            netmask: ip(netmask),
            local_pref,
            self_origin: false,
            as_path: path.to_vec(),
            origin: Origin::Egp,
        };
        Message::new(ip(from), local_address(ip(from)), Body::Update(announcement))
    }

    fn revoke(from: &str, prefixes: &[(&str, &str)]) -> Message {
        let withdrawals = prefixes
            .iter()
            .map(|(network, netmask)| Withdrawal {
                network: ip(network),
                netmask: ip(netmask),
            })
            .collect();
        Message::new(ip(from), local_address(ip(from)), Body::Revoke(withdrawals))
    }

    fn data(src: &str, dst: &str) -> Message {
        Message::new(ip(src), ip(dst), Body::Data(json!({"payload": "hello"})))
    }

    fn dump(router: &mut Router, from: &str) -> Vec<TableEntry> {
        let dump = Message::new(ip(from), local_address(ip(from)), Body::Dump(empty()));
        let mut replies = router.handle(ip(from), dump);
        assert_eq!(replies.len(), 1);
        let reply = replies.remove(0);
        assert_eq!(reply.to, ip(from));
        assert_eq!(reply.message.src, local_address(ip(from)));
        match reply.message.body {
            Body::Table(table) => table,
            other => panic!("Expected table, got {:?}", other),
        }
    }

    fn recipients(out: &[Outbound]) -> Vec<Ipv4Addr> {
        let mut to: Vec<_> = out.iter().map(|o| o.to).collect();
        to.sort();
        to
    }

    fn is_no_route(out: &Outbound) -> bool {
        matches!(out.message.body, Body::NoRoute(_))
    }

    #[test]
    fn test_customer_update_goes_everywhere() {
        let mut router = router();
        let out = router.handle(ip(CUST), update(CUST, "192.168.0.0", "255.255.255.0", 100, &[1]));
        assert_eq!(recipients(&out), vec![ip(PROV), ip(PEER), ip(CUST2)]);
        for o in &out {
            assert_eq!(o.message.src, local_address(o.to));
            assert_eq!(o.message.dst, o.to);
        }
    }

    #[test]
    fn test_provider_update_only_to_customers() {
        let mut router = router();
        let out = router.handle(ip(PROV), update(PROV, "12.0.0.0", "255.0.0.0", 100, &[3]));
        assert_eq!(recipients(&out), vec![ip(CUST), ip(CUST2)]);

        let out = router.handle(ip(PEER), update(PEER, "13.0.0.0", "255.0.0.0", 100, &[4]));
        assert_eq!(recipients(&out), vec![ip(CUST), ip(CUST2)]);
    }

    #[test]
    fn test_update_prepends_asn_once() {
        let mut router = router();
        let out = router.handle(ip(CUST), update(CUST, "192.168.0.0", "255.255.255.0", 100, &[1, 2]));
        for o in &out {
            match &o.message.body {
                Body::Update(a) => assert_eq!(a.as_path, vec![7, 1, 2]),
                other => panic!("Expected update, got {:?}", other),
            }
        }
        let table = dump(&mut router, CUST);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].as_path, vec![1, 2]);
        assert_eq!(table[0].peer, ip(CUST));
    }

    #[test]
    fn test_invalid_netmask_is_no_route() {
        let mut router = router();
        let out = router.handle(ip(CUST), update(CUST, "192.168.0.0", "255.0.255.0", 100, &[1]));
        assert_eq!(out.len(), 1);
        assert!(is_no_route(&out[0]));
        assert_eq!(out[0].to, ip(CUST));
        assert!(router.rib().is_empty());
    }

    #[test]
    fn test_revoke_with_invalid_netmask_changes_nothing() {
        let mut router = router();
        router.handle(ip(CUST), update(CUST, "192.168.0.0", "255.255.255.0", 100, &[1]));
        let out = router.handle(
            ip(CUST),
            revoke(CUST, &[("192.168.0.0", "255.255.255.0"), ("192.168.1.0", "255.0.255.0")]),
        );
        assert_eq!(out.len(), 1);
        assert!(is_no_route(&out[0]));
        assert_eq!(out[0].to, ip(CUST));
        assert_eq!(out[0].message.dst, ip(CUST));
        assert_eq!(dump(&mut router, CUST).len(), 1);
    }

    #[test]
    fn test_contiguous_updates_aggregate() {
        let mut router = router();
        for i in 0..300u32 {
            let network = format!("10.{}.{}.0", i / 256, i % 256);
            router.handle(ip(CUST), update(CUST, &network, "255.255.255.0", 100, &[1]));
        }
        let table = dump(&mut router, PROV);
        let prefixes: Vec<String> = table
            .iter()
            .map(|e| format!("{}/{}", e.network, e.netmask))
            .collect();
        assert_eq!(
            prefixes,
            vec![
                "10.0.0.0/255.255.0.0",
                "10.1.0.0/255.255.224.0",
                "10.1.32.0/255.255.248.0",
                "10.1.40.0/255.255.252.0",
            ]
        );
    }

    #[test]
    fn test_data_not_steered_by_summary() {
        let mut router = router();
        router.handle(ip(CUST), update(CUST, "30.0.0.0", "255.255.255.0", 200, &[1]));
        router.handle(ip(CUST), update(CUST, "30.0.1.0", "255.255.255.0", 200, &[1]));
        router.handle(ip(PROV), update(PROV, "30.0.0.0", "255.255.255.0", 100, &[3]));
        assert_eq!(dump(&mut router, CUST2).len(), 2);

        let out = router.handle(ip(CUST2), data(CUST2, "30.0.0.5"));
        assert_eq!(recipients(&out), vec![ip(CUST)]);
        assert!(!is_no_route(&out[0]));
    }

    #[test]
    fn test_dump_aggregates_and_revoke_splits() {
        let mut router = router();
        router.handle(ip(CUST), update(CUST, "10.0.0.0", "255.255.255.0", 100, &[1]));
        router.handle(ip(CUST), update(CUST, "10.0.1.0", "255.255.255.0", 100, &[1]));
        let table = dump(&mut router, PEER);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].network, ip("10.0.0.0"));
        assert_eq!(table[0].netmask, ip("255.255.254.0"));

        let out = router.handle(ip(CUST), revoke(CUST, &[("10.0.0.0", "255.255.255.0")]));
        assert_eq!(recipients(&out), vec![ip(PROV), ip(PEER), ip(CUST2)]);
        let table = dump(&mut router, PEER);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].network, ip("10.0.1.0"));
        assert_eq!(table[0].netmask, ip("255.255.255.0"));
    }

    #[test]
    fn test_revoke_unknown_is_noop() {
        let mut router = router();
        router.handle(ip(PROV), update(PROV, "12.0.0.0", "255.0.0.0", 100, &[3]));
        let out = router.handle(ip(PROV), revoke(PROV, &[("99.0.0.0", "255.0.0.0")]));
        assert!(out.iter().all(|o| !is_no_route(o)));
        assert_eq!(recipients(&out), vec![ip(CUST), ip(CUST2)]);
        assert_eq!(router.rib().len(), 1);
    }

    #[test]
    fn test_revoke_only_affects_sender() {
        let mut router = router();
        router.handle(ip(PROV), update(PROV, "12.0.0.0", "255.0.0.0", 100, &[3]));
        router.handle(ip(PEER), update(PEER, "12.0.0.0", "255.0.0.0", 100, &[4]));
        router.handle(ip(PEER), revoke(PEER, &[("12.0.0.0", "255.0.0.0")]));
        let table = dump(&mut router, CUST);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].peer, ip(PROV));
    }

    #[test]
    fn test_dump_count_tracks_live_prefixes() {
        let mut router = router();
        router.handle(ip(CUST), update(CUST, "10.0.0.0", "255.255.255.0", 100, &[1]));
        router.handle(ip(CUST), update(CUST, "10.0.2.0", "255.255.255.0", 100, &[1]));
        router.handle(ip(PEER), update(PEER, "10.0.0.0", "255.255.255.0", 100, &[2]));
        router.handle(ip(PROV), update(PROV, "11.0.0.0", "255.0.0.0", 100, &[3]));
        assert_eq!(dump(&mut router, CUST).len(), 4);
        router.handle(ip(PROV), revoke(PROV, &[("11.0.0.0", "255.0.0.0")]));
        router.handle(ip(CUST), revoke(CUST, &[("10.0.2.0", "255.255.255.0")]));
        assert_eq!(dump(&mut router, CUST).len(), 2);
    }

    #[test]
    fn test_data_without_route() {
        let mut router = router();
        let out = router.handle(ip(CUST), data("192.168.0.25", "99.0.0.25"));
        assert_eq!(out.len(), 1);
        assert!(is_no_route(&out[0]));
        assert_eq!(out[0].to, ip(CUST));
        assert_eq!(out[0].message.src, ip("192.168.0.1"));
        assert_eq!(out[0].message.dst, ip("192.168.0.25"));
    }

    #[test]
    fn test_data_forwarded_unchanged() {
        let mut router = router();
        router.handle(ip(PROV), update(PROV, "12.0.0.0", "255.0.0.0", 100, &[3]));
        let packet = data("192.168.0.25", "12.1.2.3");
        let out = router.handle(ip(CUST), packet.clone());
        assert_eq!(out, vec![Outbound::new(ip(PROV), packet)]);
    }

    #[test]
    fn test_data_longest_prefix_wins() {
        let mut router = router();
        router.handle(ip(PROV), update(PROV, "12.0.0.0", "255.0.0.0", 200, &[3]));
        router.handle(ip(CUST2), update(CUST2, "12.1.0.0", "255.255.0.0", 100, &[5, 6, 7]));
        let out = router.handle(ip(CUST), data("192.168.0.25", "12.1.2.3"));
        assert_eq!(recipients(&out), vec![ip(CUST2)]);
        let out = router.handle(ip(CUST), data("192.168.0.25", "12.2.2.3"));
        assert_eq!(recipients(&out), vec![ip(PROV)]);
    }

    #[test]
    fn test_data_best_route_by_local_pref() {
        let mut router = router();
        router.handle(ip(PROV), update(PROV, "12.0.0.0", "255.0.0.0", 100, &[3]));
        router.handle(ip(PEER), update(PEER, "12.0.0.0", "255.0.0.0", 150, &[4, 5]));
        let out = router.handle(ip(CUST), data("192.168.0.25", "12.1.2.3"));
        assert_eq!(recipients(&out), vec![ip(PEER)]);
    }

    #[test]
    fn test_data_peer_to_provider_refused() {
        let mut router = router();
        router.handle(ip(PROV), update(PROV, "12.0.0.0", "255.0.0.0", 100, &[3]));
        let out = router.handle(ip(PEER), data("172.168.0.25", "12.1.2.3"));
        assert_eq!(out.len(), 1);
        assert!(is_no_route(&out[0]));
        assert_eq!(out[0].to, ip(PEER));
    }

    #[test]
    fn test_data_peer_to_customer_allowed() {
        let mut router = router();
        router.handle(ip(CUST), update(CUST, "192.168.0.0", "255.255.255.0", 100, &[1]));
        let out = router.handle(ip(PEER), data("172.168.0.25", "192.168.0.25"));
        assert_eq!(recipients(&out), vec![ip(CUST)]);
        assert!(!is_no_route(&out[0]));
    }

    #[test]
    fn test_unhandled_types_get_no_route() {
        let mut router = router();
        let table = Message::new(ip(CUST), ip("192.168.0.1"), Body::Table(vec![]));
        let out = router.handle(ip(CUST), table);
        assert_eq!(out.len(), 1);
        assert!(is_no_route(&out[0]));

        let out = router.handle(ip(CUST), Message::no_route(ip(CUST), ip("192.168.0.1")));
        assert!(is_no_route(&out[0]));
    }

    #[test]
    fn test_malformed_reply() {
        let router = router();
        let out = router.handle_malformed(ip(CUST), Some(ip("192.168.0.25")));
        assert_eq!(out[0].to, ip(CUST));
        assert_eq!(out[0].message.dst, ip("192.168.0.25"));
        let out = router.handle_malformed(ip(CUST), None);
        assert_eq!(out[0].message.dst, ip(CUST));
    }

    #[test]
    fn test_unknown_neighbor_ignored() {
        let mut router = router();
        let out = router.handle(ip("8.8.8.8"), update("8.8.8.8", "8.8.8.0", "255.255.255.0", 100, &[1]));
        assert!(out.is_empty());
        assert!(router.rib().is_empty());
    }

    #[test]
    fn test_neighbor_down() {
        let mut router = router();
        router.handle(ip(CUST), update(CUST, "10.0.0.0", "255.255.255.0", 100, &[1]));
        router.handle(ip(CUST), update(CUST, "10.0.1.0", "255.255.255.0", 100, &[1]));
        assert_eq!(router.neighbor_down(ip(CUST)), 2);
        assert!(router.rib().is_empty());
    }
}
