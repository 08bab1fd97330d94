use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

const URL_PREFIX: &str = "/blob/";

/// Most resources held at once before the oldest is evicted.
pub const MAX_OBJECTS: usize = 64;
/// Most bytes held at once before the oldest resources are evicted.
pub const MAX_OBJECT_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ObjectResource {
    pub mime: String,
    pub bytes: Bytes,
}

struct Entry {
    resource: ObjectResource,
    /// Session that created the resource. Unowned resources are visible to
    /// every signed-in caller.
    owner: Option<String>,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<Uuid, Entry>,
    /// Creation order, oldest first.
    order: VecDeque<Uuid>,
    bytes: usize,
}

impl Registry {
    fn remove(&mut self, id: &Uuid) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        self.bytes -= entry.resource.bytes.len();
        self.order.retain(|queued| queued != id);
        true
    }
}

/// In-memory resources reachable by URL until revoked.
///
/// Whoever created a URL releases it once the resource is no longer
/// displayed. Signing out releases everything the session created, and the
/// oldest resources are evicted once the count or byte limit is exceeded.
#[derive(Clone)]
pub struct ObjectUrls {
    registry: Arc<RwLock<Registry>>,
    max_objects: usize,
    max_bytes: usize,
}

impl Default for ObjectUrls {
    fn default() -> Self {
        Self::with_limits(MAX_OBJECTS, MAX_OBJECT_BYTES)
    }
}

impl ObjectUrls {
    pub fn with_limits(max_objects: usize, max_bytes: usize) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            max_objects,
            max_bytes,
        }
    }

    pub fn create(&self, owner: Option<&str>, mime: &str, bytes: Bytes) -> String {
        let id = Uuid::new_v4();
        let mut registry = self.registry.write();

        registry.bytes += bytes.len();
        registry.entries.insert(
            id,
            Entry {
                resource: ObjectResource {
                    mime: mime.to_string(),
                    bytes,
                },
                owner: owner.map(String::from),
            },
        );
        registry.order.push_back(id);

        // the new resource itself is never evicted
        while registry.order.len() > 1
            && (registry.entries.len() > self.max_objects || registry.bytes > self.max_bytes)
        {
            let Some(oldest) = registry.order.front().copied() else {
                break;
            };
            registry.remove(&oldest);
            debug!("Evicted object {oldest}");
        }

        format!("{URL_PREFIX}{id}")
    }

    /// The resource behind `id`, if it exists and `requester` may see it.
    pub fn get(&self, id: Uuid, requester: Option<&str>) -> Option<ObjectResource> {
        let registry = self.registry.read();
        registry
            .entries
            .get(&id)
            .filter(|entry| visible_to(entry, requester))
            .map(|entry| entry.resource.clone())
    }

    /// Accepts either the full URL or the bare id. Returns whether anything
    /// was released.
    pub fn revoke(&self, url: &str) -> bool {
        match parse_id(url) {
            Some(id) => self.registry.write().remove(&id),
            None => false,
        }
    }

    /// Like `revoke`, but only releases resources `requester` may see.
    pub fn revoke_as(&self, url: &str, requester: Option<&str>) -> bool {
        let Some(id) = parse_id(url) else {
            return false;
        };
        let mut registry = self.registry.write();
        let visible = registry
            .entries
            .get(&id)
            .is_some_and(|entry| visible_to(entry, requester));
        visible && registry.remove(&id)
    }

    /// Releases every resource created by `owner`. Returns how many.
    pub fn revoke_owned_by(&self, owner: &str) -> usize {
        let mut registry = self.registry.write();
        let owned: Vec<Uuid> = registry
            .entries
            .iter()
            .filter(|(_, entry)| entry.owner.as_deref() == Some(owner))
            .map(|(id, _)| *id)
            .collect();
        for id in &owned {
            registry.remove(id);
        }
        owned.len()
    }

    pub fn len(&self) -> usize {
        self.registry.read().entries.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.registry.read().bytes
    }
}

fn parse_id(url: &str) -> Option<Uuid> {
    Uuid::parse_str(url.strip_prefix(URL_PREFIX).unwrap_or(url)).ok()
}

fn visible_to(entry: &Entry, requester: Option<&str>) -> bool {
    entry.owner.is_none() || entry.owner.as_deref() == requester
}
