//! Customer/peer/provider export policy
//!
//! A route may cross the router only if it was learned from a customer, or
//! it is headed to a customer. Peers and providers never provide transit for
//! each other.

use std::fmt;
use std::str::FromStr;

/// Business relationship on a neighbor's channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relationship {
    Customer,
    Peer,
    Provider,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let word = match self {
            Relationship::Customer => "cust",
            Relationship::Peer => "peer",
            Relationship::Provider => "prov",
        };
        write!(f, "{}", word)
    }
}

impl FromStr for Relationship {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cust" | "customer" => Ok(Relationship::Customer),
            "peer" => Ok(Relationship::Peer),
            "prov" | "provider" => Ok(Relationship::Provider),
            _ => Err(format!("Unsupported relationship: '{}'", s)),
        }
    }
}

/// May something learned over `learned_from` be passed on over `sent_to`?
pub fn may_export(learned_from: Relationship, sent_to: Relationship) -> bool {
    learned_from == Relationship::Customer || sent_to == Relationship::Customer
}
