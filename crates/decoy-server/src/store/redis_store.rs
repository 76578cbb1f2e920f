use super::{Document, DocumentStore};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use redis::{Commands, Connection};
use std::time::Duration;

/// Pool manager handing out blocking Redis connections
struct RedisConnectionManager {
    client: redis::Client,
}

impl RedisConnectionManager {
    fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

impl r2d2::ManageConnection for RedisConnectionManager {
    type Connection = Mutex<Connection>;
    type Error = redis::RedisError;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let conn = self.client.get_connection()?;
        Ok(Mutex::new(conn))
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        redis::cmd("PING").query(conn.get_mut())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Redis implementation of DocumentStore
///
/// The whole collection is a single hash: field = document id, value = JSON
/// body. One `HGETALL` therefore reads a consistent snapshot of the collection.
pub struct RedisDocumentStore {
    pool: r2d2::Pool<RedisConnectionManager>,
    key: String,
}

impl RedisDocumentStore {
    /// Connect to Redis and verify the connection with PING.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g. "redis://localhost:6379")
    /// * `pool_size` - Connection pool size
    /// * `key` - Hash key holding the collection (e.g. "decoy:decoy/mappings")
    pub fn new(url: &str, pool_size: usize, key: String) -> Result<Self> {
        let client = redis::Client::open(url).context("Failed to parse Redis URL")?;

        let pool = r2d2::Pool::builder()
            .max_size(pool_size.max(1) as u32)
            .connection_timeout(Duration::from_secs(5))
            .build(RedisConnectionManager::new(client))
            .context("Failed to create Redis connection pool")?;

        {
            let conn = pool.get().context("Failed to get connection from pool")?;
            let _: String = redis::cmd("PING")
                .query(&mut *conn.lock())
                .context("Failed to PING Redis")?;
        }

        tracing::info!("Connected to Redis with key={}, pool_size={}", key, pool_size);

        Ok(Self { pool, key })
    }

    fn connection(&self) -> Result<r2d2::PooledConnection<RedisConnectionManager>> {
        self.pool
            .get()
            .context("Failed to get Redis connection from pool")
    }
}

impl DocumentStore for RedisDocumentStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    fn fetch_all(&self) -> Result<Vec<Document>> {
        let conn = self.connection()?;
        let entries: Vec<(String, String)> = conn
            .lock()
            .hgetall(&self.key)
            .context("Redis HGETALL failed")?;

        let mut documents: Vec<Document> = entries
            .into_iter()
            .map(|(id, body)| Document::new(id, body))
            .collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    fn put(&self, id: &str, body: &str) -> Result<()> {
        let conn = self.connection()?;
        let _: () = conn
            .lock()
            .hset(&self.key, id, body)
            .context("Redis HSET failed")?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.connection()?;
        let _: () = conn
            .lock()
            .hdel(&self.key, id)
            .context("Redis HDEL failed")?;
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut ids: Vec<String> = conn
            .lock()
            .hkeys(&self.key)
            .context("Redis HKEYS failed")?;
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_available() -> bool {
        match redis::Client::open("redis://localhost:6379") {
            Ok(client) => client.get_connection().is_ok(),
            Err(_) => false,
        }
    }

    #[test]
    fn test_unreachable_redis_fails_fast() {
        let result = RedisDocumentStore::new("redis://127.0.0.1:1", 1, "decoy:test".to_string());
        assert!(result.is_err());
    }

    #[test]
    #[ignore] // Only run when Redis is available
    fn test_redis_put_fetch_delete() {
        if !redis_available() {
            eprintln!("Skipping test: Redis not available");
            return;
        }

        let store =
            RedisDocumentStore::new("redis://localhost:6379", 2, "decoy:test:docs".to_string())
                .unwrap();

        store.put("a", r#"{"x":1}"#).unwrap();
        store.put("b", r#"{"x":2}"#).unwrap();
        let docs = store.fetch_all().unwrap();
        assert!(docs.contains(&Document::new("a", r#"{"x":1}"#)));

        store.delete("a").unwrap();
        store.delete("b").unwrap();
        assert!(!store.list_ids().unwrap().contains(&"a".to_string()));
    }
}
