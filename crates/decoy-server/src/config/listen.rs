//! Listener, admin surface and record client configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ListenConfig {
    /// `host:port` string suitable for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AdminConfig {
    /// Path prefix reserved for admin routes (health, mappings, metrics)
    #[serde(default = "default_admin_prefix")]
    pub prefix: String,
}

pub(crate) fn default_admin_prefix() -> String {
    "/_decoy".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            prefix: default_admin_prefix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecordConfig {
    /// Timeout for the upstream call made by the record endpoint
    #[serde(default = "default_record_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_record_timeout_secs() -> u64 {
    30
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_record_timeout_secs(),
        }
    }
}
