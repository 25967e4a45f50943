use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;

use ipnetwork::{ipv4_mask_to_prefix, IpNetworkError, Ipv4Network};

/// IPv4 CIDR prefix, always stored with its host bits cleared
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Prefix(Ipv4Network);

impl Prefix {
    /// Build a prefix from a network address and a dotted netmask.
    /// Fails for non-contiguous masks (e.g. 255.0.255.0)
    pub fn new(network: Ipv4Addr, netmask: Ipv4Addr) -> Result<Self, IpNetworkError> {
        let len = ipv4_mask_to_prefix(netmask)?;
        Self::with_len(network, len)
    }

    pub fn with_len(network: Ipv4Addr, len: u8) -> Result<Self, IpNetworkError> {
        let net = Ipv4Network::new(network, len)?;
        // Normalize so 10.0.0.7/24 and 10.0.0.0/24 are the same prefix
        Ok(Self(Ipv4Network::new(net.network(), len)?))
    }

    pub fn network(&self) -> Ipv4Addr {
        self.0.network()
    }

    pub fn netmask(&self) -> Ipv4Addr {
        self.0.mask()
    }

    pub fn len(&self) -> u8 {
        self.0.prefix()
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.0.contains(addr)
    }

    /// True when every address of `other` is also inside `self`
    pub fn covers(&self, other: &Prefix) -> bool {
        self.len() <= other.len() && self.contains(other.network())
    }

    /// The prefix one bit shorter that holds this one and its sibling
    pub fn parent(&self) -> Option<Prefix> {
        match self.len() {
            0 => None,
            len => Self::with_len(self.network(), len - 1).ok(),
        }
    }

    /// The other half of `parent()`
    pub fn sibling(&self) -> Option<Prefix> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let bit = 1u32 << (32 - u32::from(len));
        let addr = Ipv4Addr::from(u32::from(self.network()) ^ bit);
        Self::with_len(addr, len).ok()
    }

    /// Union of two sibling prefixes, if they are siblings.
    /// Two distinct prefixes of equal length sharing a parent are numerically
    /// adjacent and their union is exactly that parent.
    pub fn merge(&self, other: &Prefix) -> Option<Prefix> {
        if self == other || self.len() != other.len() {
            return None;
        }
        let parent = self.parent()?;
        if other.parent() == Some(parent) {
            Some(parent)
        } else {
            None
        }
    }
}

impl Ord for Prefix {
    fn cmp(&self, other: &Self) -> Ordering {
        (u32::from(self.network()), self.len()).cmp(&(u32::from(other.network()), other.len()))
    }
}

impl PartialOrd for Prefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.len())
    }
}
