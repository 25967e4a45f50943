//! Route aggregation
//!
//! A neighbor's advertised routes are coalesced into the smallest set of
//! prefixes covering the same addresses, separately for each distinct set of
//! path attributes. Summaries are always recomputed from the raw
//! advertisements, so withdrawing a route that was folded into a summary
//! splits the summary back exactly as if it had never been merged.

use std::collections::{BTreeMap, BTreeSet};

use super::Prefix;

/// Reduce a set of prefixes to its minimal CIDR cover.
///
/// Covered prefixes are absorbed in one sorted pass, then siblings are merged
/// level by level from the longest prefix length up. The result depends only
/// on the set of addresses covered, never on the order prefixes were learned.
pub fn summarize(prefixes: BTreeSet<Prefix>) -> BTreeSet<Prefix> {
    let mut levels: BTreeMap<u8, BTreeSet<Prefix>> = BTreeMap::new();
    for prefix in absorb_covered(prefixes) {
        levels.entry(prefix.len()).or_default().insert(prefix);
    }

    let mut summary = BTreeSet::new();
    while let Some((_, level)) = levels.pop_last() {
        let mut level = level.into_iter().peekable();
        while let Some(prefix) = level.next() {
            // Siblings are adjacent within a level
            match level.peek().and_then(|next| prefix.merge(next)) {
                Some(parent) => {
                    level.next();
                    levels.entry(parent.len()).or_default().insert(parent);
                }
                None => {
                    summary.insert(prefix);
                }
            }
        }
    }
    summary
}

/// Drop every prefix covered by another one in the set.
///
/// In (network, length) order a cover sorts before everything it covers, and
/// the kept prefixes are disjoint, so only the last kept prefix can cover the
/// next one.
fn absorb_covered(prefixes: BTreeSet<Prefix>) -> Vec<Prefix> {
    let mut kept: Vec<Prefix> = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        match kept.last() {
            Some(cover) if cover.covers(&prefix) => continue,
            _ => kept.push(prefix),
        }
    }
    kept
}
