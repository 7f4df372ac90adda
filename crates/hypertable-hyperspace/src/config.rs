//! Hyperspace master configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{HyperspaceError, HyperspaceResult};

/// Default client lease interval in milliseconds.
pub const DEFAULT_LEASE_INTERVAL_MS: u64 = 20_000;
/// Default keepalive tick interval in milliseconds.
pub const DEFAULT_KEEPALIVE_INTERVAL_MS: u64 = 10_000;
/// Default master listen port.
pub const DEFAULT_MASTER_PORT: u16 = 38040;

/// Configuration for the Hyperspace master.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperspaceConfig {
    /// Client lease duration; a session expires this long after its last
    /// renewal (`Hyperspace.Lease.Interval`, ms).
    pub lease_interval_ms: u64,
    /// Period of the keepalive driver (`Hyperspace.KeepAlive.Interval`, ms).
    pub keepalive_interval_ms: u64,
    /// Base directory backing the namespace (`Hyperspace.Master.dir`).
    pub base_dir: PathBuf,
    /// Listen port of the (external) RPC shell (`Hyperspace.Master.port`).
    pub port: u16,
    /// Raises per-operation logging from debug to info (`verbose`).
    pub verbose: bool,
}

impl Default for HyperspaceConfig {
    fn default() -> Self {
        Self {
            lease_interval_ms: DEFAULT_LEASE_INTERVAL_MS,
            keepalive_interval_ms: DEFAULT_KEEPALIVE_INTERVAL_MS,
            base_dir: PathBuf::from("hyperspace"),
            port: DEFAULT_MASTER_PORT,
            verbose: false,
        }
    }
}

impl HyperspaceConfig {
    /// Builds a configuration from a string-keyed properties map, applying
    /// defaults for absent keys. Unparsable values are errors.
    pub fn from_properties(props: &HashMap<String, String>) -> HyperspaceResult<Self> {
        let mut config = Self::default();

        if let Some(value) = props.get("Hyperspace.Lease.Interval") {
            config.lease_interval_ms = parse(value, "Hyperspace.Lease.Interval")?;
        }
        if let Some(value) = props.get("Hyperspace.KeepAlive.Interval") {
            config.keepalive_interval_ms = parse(value, "Hyperspace.KeepAlive.Interval")?;
        }
        if let Some(value) = props.get("Hyperspace.Master.dir") {
            config.base_dir = PathBuf::from(value);
        }
        if let Some(value) = props.get("Hyperspace.Master.port") {
            config.port = parse(value, "Hyperspace.Master.port")?;
        }
        if let Some(value) = props.get("verbose") {
            config.verbose = parse(value, "verbose")?;
        }

        Ok(config)
    }

    /// The lease interval as a [`Duration`].
    pub fn lease_interval(&self) -> Duration {
        Duration::from_millis(self.lease_interval_ms)
    }

    /// The keepalive interval as a [`Duration`].
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }
}

fn parse<T: std::str::FromStr>(value: &str, key: &str) -> HyperspaceResult<T> {
    value
        .parse()
        .map_err(|_| HyperspaceError::InvalidConfig {
            key: key.to_string(),
            value: value.to_string(),
        })
}
