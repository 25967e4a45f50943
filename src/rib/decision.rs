//! Best path selection
//!
//! Candidates are narrowed by a fixed sequence of stages, each keeping only
//! the routes that are best by one criterion:
//!
//! 1. highest local preference
//! 2. self-originated routes, if there are any
//! 3. shortest AS path
//! 4. best origin (IGP, then EGP, then UNK)
//! 5. lowest neighbor address
//!
//! The last stage is a total order over neighbors, so exactly one route
//! survives whenever there was at least one candidate.

use itertools::Itertools;
use log::trace;

use super::{PathAttributes, Prefix, Route};

type Stage = for<'a> fn(Vec<&'a Route>) -> Vec<&'a Route>;

const PIPELINE: [(&str, Stage); 5] = [
    ("local_pref", highest_local_pref),
    ("self_origin", prefer_self_origin),
    ("as_path", shortest_as_path),
    ("origin", best_origin),
    ("peer", lowest_peer),
];

/// Choose the single best route among candidates tied on prefix length
pub fn best_route<'a, I>(candidates: I) -> Option<&'a Route>
where
    I: IntoIterator<Item = &'a Route>,
{
    let mut candidates: Vec<&Route> = candidates.into_iter().collect();
    for (name, stage) in PIPELINE.iter() {
        if candidates.len() <= 1 {
            break;
        }
        candidates = stage(candidates);
        trace!("{} candidates left after {}", candidates.len(), name);
    }
    candidates.into_iter().next()
}

pub fn highest_local_pref(routes: Vec<&Route>) -> Vec<&Route> {
    routes
        .into_iter()
        .max_set_by_key(|route| route.attributes.local_pref)
}

pub fn prefer_self_origin(routes: Vec<&Route>) -> Vec<&Route> {
    if routes.iter().any(|route| route.attributes.self_origin) {
        routes
            .into_iter()
            .filter(|route| route.attributes.self_origin)
            .collect()
    } else {
        routes
    }
}

pub fn shortest_as_path(routes: Vec<&Route>) -> Vec<&Route> {
    routes
        .into_iter()
        .min_set_by_key(|route| route.attributes.as_path.len())
}

pub fn best_origin(routes: Vec<&Route>) -> Vec<&Route> {
    routes
        .into_iter()
        .min_set_by_key(|route| route.attributes.origin)
}

pub fn lowest_peer(routes: Vec<&Route>) -> Vec<&Route> {
    routes
        .into_iter()
        .min_by(|a, b| tie_break_key(a).cmp(&tie_break_key(b)))
        .into_iter()
        .collect()
}

// One neighbor can hold several routes for the same summary prefix that
// differ only in AS path contents, so the attributes complete the order
fn tie_break_key<'a>(route: &&'a Route) -> (u32, Prefix, &'a PathAttributes) {
    (u32::from(route.peer), route.prefix, &route.attributes)
}
