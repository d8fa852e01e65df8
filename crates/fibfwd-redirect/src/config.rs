//! Redirect engine configuration.
//!
//! Loaded from TOML, e.g.:
//!
//! ```toml
//! l2_offset = 0
//! lookup = "direct"
//! neigh_resolver = "auto"
//! metrics_prefix = "fibfwd"
//! ```

use crate::error::ConfigError;
use crate::fib::FibLookupFlags;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How the FIB is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupMode {
    /// Main table only, skipping policy rules.
    #[default]
    Direct,
    /// Full lookup from the egress perspective.
    Output,
}

impl LookupMode {
    pub fn flags(&self) -> FibLookupFlags {
        match self {
            LookupMode::Direct => FibLookupFlags::DIRECT,
            LookupMode::Output => FibLookupFlags::OUTPUT,
        }
    }
}

/// Whether the platform's deferred neighbor resolution may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeighResolverMode {
    /// Use it when the platform reports it available.
    #[default]
    Auto,
    /// Always resolve synchronously against the neighbor cache.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectConfig {
    /// Offset of the Ethernet header in the packet.
    #[serde(default)]
    pub l2_offset: usize,

    #[serde(default)]
    pub lookup: LookupMode,

    #[serde(default)]
    pub neigh_resolver: NeighResolverMode,

    /// Prefix for exported metric names.
    #[serde(default = "default_metrics_prefix")]
    pub metrics_prefix: String,
}

fn default_metrics_prefix() -> String {
    "fibfwd".to_string()
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            l2_offset: 0,
            lookup: LookupMode::default(),
            neigh_resolver: NeighResolverMode::default(),
            metrics_prefix: default_metrics_prefix(),
        }
    }
}

impl RedirectConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RedirectConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut chars = self.metrics_prefix.chars();
        let valid = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
            }
            _ => false,
        };
        if !valid {
            return Err(ConfigError::invalid(
                "metrics_prefix",
                format!("'{}' is not a valid metric name prefix", self.metrics_prefix),
            ));
        }

        Ok(())
    }

    pub fn resolver_enabled(&self) -> bool {
        self.neigh_resolver == NeighResolverMode::Auto
    }
}
