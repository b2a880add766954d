//! TTL cache for resolved terminology
//!
//! Keys have the shape `type:id:<keys>`, where `<keys>` is the sorted,
//! comma-joined list of requested keys or `all`. Ids and requested keys are
//! escaped so `:` and `,` inside them never read as separators. Invalidation
//! works on key prefixes, so clearing `team:T1` never touches `team:T10`.
//!
//! Every invalidation bumps a generation counter. A resolution that started
//! before an invalidation must not be cached after it, so inserts carry the
//! generation observed before the repository was read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::entity::{EntityRef, EntityType};
use crate::value::TermMap;

/// Default time-to-live for resolved maps
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// A resolved map and when it was computed
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub resolved: TermMap,
    pub computed_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.computed_at) < ttl
    }
}

/// Percent-escape the separator characters of one key component
fn escape_component(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            ',' => escaped.push_str("%2C"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Prefix shared by every cache key of one entity
fn entity_prefix(entity_type: EntityType, entity_id: &str) -> String {
    format!("{}:{}:", entity_type, escape_component(entity_id))
}

/// Build the cache key for a resolution request
pub fn cache_key(entity: &EntityRef, keys: Option<&[String]>) -> String {
    let suffix = match keys {
        Some(keys) if !keys.is_empty() => {
            let mut sorted: Vec<String> = keys.iter().map(|key| escape_component(key)).collect();
            sorted.sort_unstable();
            sorted.dedup();
            sorted.join(",")
        }
        _ => "all".to_string(),
    };
    format!("{}{}", entity_prefix(entity.entity_type, &entity.id), suffix)
}

/// Shared TTL cache of resolved maps
pub struct ResolutionCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
    generation: AtomicU64,
}

impl ResolutionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live entry for `key`; an expired entry is dropped on the way
    pub async fn get(&self, key: &str) -> Option<TermMap> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(now, self.ttl) => return Some(entry.resolved.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if !entry.is_live(now, self.ttl) {
                debug!("Cache entry {} expired", key);
                entries.remove(key);
            }
        }
        None
    }

    /// Current invalidation generation; take it before reading the repository
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn insert(&self, key: String, resolved: TermMap) {
        let entry = CacheEntry {
            resolved,
            computed_at: Instant::now(),
        };
        self.entries.write().await.insert(key, entry);
    }

    /// Insert unless an invalidation ran since `generation` was taken
    ///
    /// Returns whether the entry was stored.
    pub async fn insert_if_current(&self, key: String, resolved: TermMap, generation: u64) -> bool {
        let mut entries = self.entries.write().await;
        // Invalidations bump the counter while holding the write lock
        if self.generation.load(Ordering::Acquire) != generation {
            debug!("Discarding stale resolution for {}", key);
            return false;
        }
        entries.insert(
            key,
            CacheEntry {
                resolved,
                computed_at: Instant::now(),
            },
        );
        true
    }

    /// Drop entries by scope and return how many were removed
    ///
    /// No type clears everything, a type alone clears `type:*`, a type and id
    /// clear `type:id:*`. An id without a type is ignored and clears nothing.
    pub async fn invalidate(&self, entity_type: Option<EntityType>, entity_id: Option<&str>) -> usize {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        let before = entries.len();

        match (entity_type, entity_id) {
            (None, None) => entries.clear(),
            (Some(entity_type), None) => {
                let prefix = format!("{}:", entity_type);
                entries.retain(|key, _| !key.starts_with(&prefix));
            }
            (Some(entity_type), Some(id)) => {
                let prefix = entity_prefix(entity_type, id);
                entries.retain(|key, _| !key.starts_with(&prefix));
            }
            (None, Some(id)) => {
                debug!("Ignoring cache invalidation for id {} without entity type", id);
            }
        }

        let removed = before - entries.len();
        debug!(
            "Cache invalidated (type: {:?}, id: {:?}): {} entries removed",
            entity_type, entity_id, removed
        );
        removed
    }

    /// Drop every expired entry
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now, self.ttl));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
