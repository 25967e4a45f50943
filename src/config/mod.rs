mod file;

use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use crate::rib::Relationship;

#[derive(Debug)]
pub enum ConfigError {
    /// Couldn't read the config file
    Io(io::Error),
    /// Config file isn't valid TOML for this router
    Parse(toml::de::Error),
    /// A value was understood but isn't usable. [reason]
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Config Error: ")?;
        match self {
            ConfigError::Io(err) => write!(f, "{}", err),
            ConfigError::Parse(err) => write!(f, "{}", err),
            ConfigError::Invalid(reason) => write!(f, "{}", reason),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(error: io::Error) -> Self {
        ConfigError::Io(error)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::Parse(error)
    }
}

/// A neighbor as given on the command line: `<address>-<relation>`
/// (E.g. "192.168.0.2-cust")
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NeighborConfig {
    pub addr: Ipv4Addr,
    pub relationship: Relationship,
}

impl FromStr for NeighborConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, relation) = s.trim().rsplit_once('-').ok_or_else(|| {
            ConfigError::Invalid(format!("Expected <address>-<relation>, got '{}'", s))
        })?;
        let addr = addr
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("Invalid neighbor address: '{}'", addr)))?;
        let relationship = relation.parse().map_err(ConfigError::Invalid)?;
        Ok(Self { addr, relationship })
    }
}

impl fmt::Display for NeighborConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.addr, self.relationship)
    }
}

/// In-memory router config: command line values plus file tunables
#[derive(Debug)]
pub struct RouterConfig {
    pub asn: u32,
    pub neighbors: Vec<NeighborConfig>,
    pub poll_interval: Duration,
    pub max_message_size: usize,
}

impl RouterConfig {
    /// Build a config, reading tunables from `path` if one is given
    pub fn new(
        asn: u32,
        neighbors: Vec<NeighborConfig>,
        path: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let spec = match path {
            Some(path) => file::RouterConfigSpec::from_file(path)?,
            None => file::RouterConfigSpec::default(),
        };
        Self::from_spec(asn, neighbors, spec)
    }

    fn from_spec(
        asn: u32,
        neighbors: Vec<NeighborConfig>,
        spec: file::RouterConfigSpec,
    ) -> Result<Self, ConfigError> {
        if neighbors.is_empty() {
            return Err(ConfigError::Invalid("No neighbors configured".to_string()));
        }
        for (i, neighbor) in neighbors.iter().enumerate() {
            if neighbors[..i].iter().any(|n| n.addr == neighbor.addr) {
                return Err(ConfigError::Invalid(format!(
                    "Neighbor {} configured more than once",
                    neighbor.addr
                )));
            }
        }
        Ok(Self {
            asn,
            neighbors,
            poll_interval: Duration::from_millis(spec.poll_interval_ms),
            max_message_size: spec.max_message_size,
        })
    }
}
