//! Document store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which backend mirrors the mapping cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Cache-only operation
    #[default]
    None,
    InMemory,
    File,
    Redis,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::None => "none",
            StoreBackend::InMemory => "inmemory",
            StoreBackend::File => "file",
            StoreBackend::Redis => "redis",
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(StoreBackend::None),
            "inmemory" | "memory" => Ok(StoreBackend::InMemory),
            "file" => Ok(StoreBackend::File),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(format!(
                "unknown store backend '{other}' (expected none, inmemory, file or redis)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Name of the document collection holding the mappings
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Root directory for the file backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,
}

pub(crate) fn default_collection() -> String {
    "decoy/mappings".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            collection: default_collection(),
            path: None,
            redis: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_size: default_redis_pool_size(),
            key_prefix: default_redis_key_prefix(),
        }
    }
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_key_prefix() -> String {
    "decoy:".to_string()
}
