//! Document stores that mirror the mapping cache.
//!
//! A store holds one collection of JSON documents addressed by id. The
//! reconciler is the only consumer; it treats every failure as recoverable.

mod file;
mod inmemory;
#[cfg(feature = "redis-backend")]
mod redis_store;

pub use file::FileDocumentStore;
pub use inmemory::InMemoryDocumentStore;
#[cfg(feature = "redis-backend")]
pub use redis_store::RedisDocumentStore;

use crate::config::{StoreBackend, StoreConfig};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

/// A stored document: its id and raw JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub body: String,
}

impl Document {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }
}

/// Backend-agnostic document collection.
///
/// This trait is intentionally synchronous: every call may block on network or
/// disk I/O, and callers on an async runtime move it to a blocking thread.
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Fetch every document in the collection.
    fn fetch_all(&self) -> Result<Vec<Document>>;

    /// Create or overwrite a document.
    fn put(&self, id: &str, body: &str) -> Result<()>;

    /// Delete a document. Deleting a missing document is not an error.
    fn delete(&self, id: &str) -> Result<()>;

    /// Ids of every document in the collection.
    fn list_ids(&self) -> Result<Vec<String>>;
}

/// Create a document store based on configuration.
///
/// Returns `Ok(None)` when persistence is disabled.
pub fn create_document_store(config: &StoreConfig) -> Result<Option<Arc<dyn DocumentStore>>> {
    match config.backend {
        StoreBackend::None => {
            tracing::info!("No document store configured, mappings live in memory only");
            Ok(None)
        }
        StoreBackend::InMemory => {
            tracing::info!("Using in-memory document store");
            Ok(Some(Arc::new(InMemoryDocumentStore::new())))
        }
        StoreBackend::File => {
            let root = config
                .path
                .as_ref()
                .ok_or_else(|| anyhow!("File backend selected but no store path provided"))?;
            let store = FileDocumentStore::new(root, &config.collection)
                .context("Failed to create file document store")?;
            tracing::info!(
                "Using file document store (dir={})",
                store.directory().display()
            );
            Ok(Some(Arc::new(store)))
        }
        StoreBackend::Redis => {
            let redis_config = config
                .redis
                .as_ref()
                .ok_or_else(|| anyhow!("Redis backend selected but no redis config provided"))?;

            #[cfg(feature = "redis-backend")]
            {
                let store = RedisDocumentStore::new(
                    &redis_config.url,
                    redis_config.pool_size,
                    format!("{}{}", redis_config.key_prefix, config.collection),
                )
                .context("Failed to create Redis backend")?;

                tracing::info!(
                    "Using redis document store (url={}, collection={})",
                    redis_config.url,
                    config.collection
                );
                Ok(Some(Arc::new(store)))
            }

            #[cfg(not(feature = "redis-backend"))]
            {
                let _ = redis_config;
                Err(anyhow!(
                    "Redis backend not available. Compile with --features redis-backend"
                ))
            }
        }
    }
}

/// Like [`create_document_store`], but a store that cannot be reached degrades
/// to cache-only operation instead of failing startup.
pub fn create_document_store_or_degrade(config: &StoreConfig) -> Option<Arc<dyn DocumentStore>> {
    match create_document_store(config) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(
                "Document store unavailable ({:#}), mappings will not be persisted",
                e
            );
            None
        }
    }
}
