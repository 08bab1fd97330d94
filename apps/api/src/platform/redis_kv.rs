use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::{KeyValue, KvItem, PlatformError};

/// Key-value records stored as plain Redis strings.
///
/// `list` walks the keyspace with `SCAN MATCH`, which shares the `*` wildcard
/// with the memory backend.
#[derive(Clone)]
pub struct RedisKv {
    conn: MultiplexedConnection,
}

impl RedisKv {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Invalid REDIS_URL")?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .context("Failed to connect to Redis")?;
        Ok(Self { conn })
    }
}

fn kv_error(e: redis::RedisError) -> PlatformError {
    PlatformError::KeyValue(e.to_string())
}

#[async_trait]
impl KeyValue for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, PlatformError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(kv_error)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PlatformError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(kv_error)
    }

    async fn delete(&self, key: &str) -> Result<bool, PlatformError> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(key).await.map_err(kv_error)?;
        Ok(removed > 0)
    }

    async fn list(&self, pattern: &str, deep: bool) -> Result<Vec<KvItem>, PlatformError> {
        let mut conn = self.conn.clone();

        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter: redis::AsyncIter<String> =
                conn.scan_match(pattern).await.map_err(kv_error)?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        // SCAN may repeat keys across cursor steps
        keys.sort();
        keys.dedup();

        if !deep || keys.is_empty() {
            return Ok(keys
                .into_iter()
                .map(|key| KvItem {
                    key,
                    value: String::new(),
                })
                .collect());
        }

        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(kv_error)?;

        // A key deleted between SCAN and MGET comes back as nil; drop it.
        Ok(keys
            .into_iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|value| KvItem { key, value }))
            .collect())
    }
}
