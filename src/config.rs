//! Relay configuration, loadable from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::face::Address;

/// How repeated interests are recognised.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NonceCheck {
    /// Remember the last `capacity` nonces seen, most recent first.
    History { capacity: usize },
    /// Compare against the nonces of the interests currently pending.
    PendingTable,
}

impl Default for NonceCheck {
    fn default() -> Self {
        NonceCheck::History { capacity: 256 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub address: Address,
    /// Faces created on this interface may send interests back where they came from.
    #[serde(default)]
    pub reflect: bool,
    /// Faces created on this interface propagate every repeated interest.
    #[serde(default)]
    pub forward_all: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Content store capacity. 0 means unbounded.
    #[serde(default)]
    pub max_cache_entries: usize,

    #[serde(default = "RelayConfig::default_content_timeout_ms")]
    pub content_timeout_ms: u64,

    #[serde(default = "RelayConfig::default_face_timeout_ms")]
    pub face_timeout_ms: u64,

    /// Lifetime of an interest that does not carry one.
    #[serde(default = "RelayConfig::default_interest_timeout_ms")]
    pub interest_timeout_ms: u64,

    #[serde(default = "RelayConfig::default_max_interest_retransmit")]
    pub max_interest_retransmit: u32,

    #[serde(default)]
    pub nonce_check: NonceCheck,

    /// Broadcast interests that match no route on every interface.
    #[serde(default)]
    pub broadcast_fallback: bool,

    #[serde(default = "RelayConfig::default_max_interfaces")]
    pub max_interfaces: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<InterfaceConfig>,
}

impl RelayConfig {
    fn default_content_timeout_ms() -> u64 {
        300_000
    }

    fn default_face_timeout_ms() -> u64 {
        30_000
    }

    fn default_interest_timeout_ms() -> u64 {
        10_000
    }

    fn default_max_interest_retransmit() -> u32 {
        7
    }

    fn default_max_interfaces() -> usize {
        10
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config = Self::parse(&contents).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interfaces.len() > self.max_interfaces {
            return Err(ConfigError::Invalid(format!(
                "{} interfaces configured, at most {} allowed",
                self.interfaces.len(),
                self.max_interfaces
            )));
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_cache_entries: 0,
            content_timeout_ms: Self::default_content_timeout_ms(),
            face_timeout_ms: Self::default_face_timeout_ms(),
            interest_timeout_ms: Self::default_interest_timeout_ms(),
            max_interest_retransmit: Self::default_max_interest_retransmit(),
            nonce_check: NonceCheck::default(),
            broadcast_fallback: false,
            max_interfaces: Self::default_max_interfaces(),
            interfaces: Vec::new(),
        }
    }
}
