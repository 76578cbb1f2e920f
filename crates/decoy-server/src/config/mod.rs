//! Configuration types for the decoy server.

mod listen;
mod store;

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use listen::{AdminConfig, ListenConfig, RecordConfig};
pub use store::{RedisConfig, StoreBackend, StoreConfig};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub record: RecordConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let prefix = &self.admin.prefix;
        if !prefix.starts_with('/') || prefix.len() < 2 {
            anyhow::bail!(
                "Invalid admin prefix '{}': must start with '/' and name a path segment",
                prefix
            );
        }
        if prefix.ends_with('/') {
            anyhow::bail!("Invalid admin prefix '{}': must not end with '/'", prefix);
        }

        if self.store.collection.trim().is_empty() {
            anyhow::bail!("store.collection must not be empty");
        }

        match self.store.backend {
            StoreBackend::File if self.store.path.is_none() => {
                anyhow::bail!("store.path is required when store.backend is 'file'");
            }
            StoreBackend::Redis if self.store.redis.is_none() => {
                anyhow::bail!("store.redis.url is required when store.backend is 'redis'");
            }
            _ => {}
        }

        if let Some(ref redis) = self.store.redis {
            if redis.pool_size == 0 {
                anyhow::bail!("store.redis.pool_size must be at least 1");
            }
        }

        if self.record.timeout_secs == 0 {
            anyhow::bail!("record.timeout_secs must be at least 1");
        }

        Ok(())
    }
}
