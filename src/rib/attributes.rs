use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Route origin. Declaration order is preference order (IGP first)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Origin {
    #[serde(rename = "IGP")]
    Igp,
    #[serde(rename = "EGP")]
    Egp,
    #[serde(rename = "UNK")]
    Unknown,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let word = match self {
            Origin::Igp => "IGP",
            Origin::Egp => "EGP",
            Origin::Unknown => "UNK",
        };
        write!(f, "{}", word)
    }
}

/// Every attribute of a route except the prefix and who sent it.
/// Routes may only be aggregated when these are identical.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathAttributes {
    pub local_pref: u32,
    pub self_origin: bool,
    pub as_path: Vec<u32>,
    pub origin: Origin,
}

impl fmt::Display for PathAttributes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "localpref={} self={} path=[{}] origin={}",
            self.local_pref,
            self.self_origin,
            self.as_path.iter().join(" "),
            self.origin,
        )
    }
}
