use std::fs::File;
use std::io::Read;

use serde::Deserialize;

use super::ConfigError;

struct Defaults {}

impl Defaults {
    fn poll_interval_ms() -> u64 {
        100
    }

    fn max_message_size() -> usize {
        65535
    }
}

/// Config (toml) representation of router tunables
#[derive(Debug, Deserialize)]
pub(super) struct RouterConfigSpec {
    // How long one wait on the neighbor channels may block
    #[serde(default = "Defaults::poll_interval_ms")]
    pub(super) poll_interval_ms: u64,
    // Largest message accepted from a neighbor
    #[serde(default = "Defaults::max_message_size")]
    pub(super) max_message_size: usize,
}

impl Default for RouterConfigSpec {
    fn default() -> Self {
        Self {
            poll_interval_ms: Defaults::poll_interval_ms(),
            max_message_size: Defaults::max_message_size(),
        }
    }
}

impl RouterConfigSpec {
    pub(super) fn from_file(path: &str) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_toml(&contents)
    }

    pub(super) fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let spec: RouterConfigSpec = toml::from_str(contents)?;
        if spec.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(spec)
    }
}
