//! Platform services: auth, key-value records and blob storage.
//!
//! Pages only ever talk to the traits below. `AppState` carries a `Platform`
//! with one backend per trait, chosen at startup:
//! - `memory`: process-local maps (development, tests)
//! - `redis`: Redis for records and sessions, S3 / MinIO for blobs

mod memory;
mod redis_kv;
mod s3_blobs;
mod session;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::RemoteConfig;

use redis_kv::RedisKv;
use s3_blobs::S3Blobs;

pub use memory::{MemoryBlobs, MemoryKv};
pub use session::{Session, SessionAuth};

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("key-value store: {0}")]
    KeyValue(String),

    #[error("blob storage: {0}")]
    Storage(String),

    #[error("malformed record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A stored record as returned by `KeyValue::list`. `value` is the raw text
/// written with `set`, usually serialized JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvItem {
    pub key: String,
    pub value: String,
}

#[async_trait]
pub trait KeyValue: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PlatformError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), PlatformError>;

    /// Returns whether a record was removed.
    async fn delete(&self, key: &str) -> Result<bool, PlatformError>;

    /// Lists records whose key matches `pattern`, where `*` matches any run of
    /// characters. With `deep = false` only keys are returned and every value
    /// is empty. Results are ordered by key.
    async fn list(&self, pattern: &str, deep: bool) -> Result<Vec<KvItem>, PlatformError>;
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn write(&self, path: &str, bytes: Bytes, mime: &str) -> Result<(), PlatformError>;

    /// `Ok(None)` when nothing is stored at `path`.
    async fn read(&self, path: &str) -> Result<Option<Bytes>, PlatformError>;

    /// Removing a missing path is not an error.
    async fn delete(&self, path: &str) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait Auth: Send + Sync {
    async fn is_authenticated(&self, token: Option<&str>) -> Result<bool, PlatformError>;

    async fn sign_in(&self) -> Result<Session, PlatformError>;

    async fn sign_out(&self, token: &str) -> Result<(), PlatformError>;
}

/// The platform handles injected into every page.
#[derive(Clone)]
pub struct Platform {
    pub auth: Arc<dyn Auth>,
    pub kv: Arc<dyn KeyValue>,
    pub fs: Arc<dyn BlobStorage>,
}

impl Platform {
    pub fn in_memory() -> Self {
        let kv: Arc<dyn KeyValue> = Arc::new(MemoryKv::default());
        Self {
            auth: Arc::new(SessionAuth::new(kv.clone())),
            kv,
            fs: Arc::new(MemoryBlobs::default()),
        }
    }

    pub async fn connect(config: &RemoteConfig) -> Result<Self> {
        let kv: Arc<dyn KeyValue> = Arc::new(RedisKv::connect(&config.redis_url).await?);
        info!("Redis key-value store connected");

        let fs = S3Blobs::new(config).await;
        info!("S3 blob storage initialized (bucket: {})", config.s3_bucket);

        Ok(Self {
            auth: Arc::new(SessionAuth::new(kv.clone())),
            kv,
            fs: Arc::new(fs),
        })
    }
}

/// Glob match where `*` is the only wildcard.
pub(crate) fn matches_pattern(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };

    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        // no wildcard at all
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
