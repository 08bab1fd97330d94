use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::{matches_pattern, BlobStorage, KeyValue, KvItem, PlatformError};

/// Key-value store backed by an ordered map, so listings come out sorted.
#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, String>>,
}

#[async_trait]
impl KeyValue for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, PlatformError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PlatformError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, PlatformError> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn list(&self, pattern: &str, deep: bool) -> Result<Vec<KvItem>, PlatformError> {
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .filter(|(key, _)| matches_pattern(pattern, key))
            .map(|(key, value)| KvItem {
                key: key.clone(),
                value: if deep { value.clone() } else { String::new() },
            })
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryBlobs {
    files: RwLock<HashMap<String, Bytes>>,
}

#[async_trait]
impl BlobStorage for MemoryBlobs {
    async fn write(&self, path: &str, bytes: Bytes, _mime: &str) -> Result<(), PlatformError> {
        self.files.write().insert(path.to_string(), bytes);
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>, PlatformError> {
        Ok(self.files.read().get(path).cloned())
    }

    async fn delete(&self, path: &str) -> Result<(), PlatformError> {
        self.files.write().remove(path);
        Ok(())
    }
}

#[cfg(test)]
impl MemoryBlobs {
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_deep_returns_values_in_key_order() {
        let kv = MemoryKv::default();
        kv.set("resume:b", "{\"id\":\"b\"}").await.unwrap();
        kv.set("resume:a", "{\"id\":\"a\"}").await.unwrap();
        kv.set("session:x", "{}").await.unwrap();

        let items = kv.list("resume:*", true).await.unwrap();
        let keys: Vec<_> = items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["resume:a", "resume:b"]);
        assert_eq!(items[0].value, "{\"id\":\"a\"}");
    }

    #[tokio::test]
    async fn test_list_shallow_omits_values() {
        let kv = MemoryKv::default();
        kv.set("resume:a", "payload").await.unwrap();
        let items = kv.list("resume:*", false).await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].value.is_empty());
    }

    #[tokio::test]
    async fn test_delete_reports_removal() {
        let kv = MemoryKv::default();
        kv.set("k", "v").await.unwrap();
        assert!(kv.delete("k").await.unwrap());
        assert!(!kv.delete("k").await.unwrap());
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blob_read_missing_is_none() {
        let fs = MemoryBlobs::default();
        assert!(fs.read("nope.png").await.unwrap().is_none());
        fs.write("a.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        assert_eq!(fs.read("a.png").await.unwrap().unwrap(), Bytes::from_static(b"png"));
    }

    #[tokio::test]
    async fn test_blob_delete() {
        let fs = MemoryBlobs::default();
        fs.write("a.pdf", Bytes::from_static(b"%PDF"), "application/pdf")
            .await
            .unwrap();
        fs.delete("a.pdf").await.unwrap();
        assert!(fs.read("a.pdf").await.unwrap().is_none());
        // missing paths are fine
        fs.delete("a.pdf").await.unwrap();
    }
}
