//! In-memory repository
//!
//! Holds everything in process memory. Used for embedding the engine without
//! a database and as the test double for resolver tests: it counts calls and
//! can be told to fail specific operations.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{AbAssignment, EntitySettings, TerminologyEntry, TerminologyRepository};
use crate::entity::EntityRef;
use crate::transform::key_has_prefix;
use crate::value::TermMap;
use crate::{Error, Result};

#[derive(Default)]
struct Store {
    entries: HashMap<EntityRef, BTreeMap<String, TerminologyEntry>>,
    parents: HashMap<EntityRef, EntityRef>,
    settings: HashMap<EntityRef, EntitySettings>,
    assignments: HashMap<EntityRef, AbAssignment>,
    variants: HashMap<(String, String), TermMap>,
}

/// Repository backed by in-process maps
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
    failing_entries: RwLock<HashSet<EntityRef>>,
    failing_parents: RwLock<HashSet<EntityRef>>,
    fail_defaults: AtomicBool,
    fail_writes: AtomicBool,
    entry_fetches: AtomicUsize,
    default_fetches: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-seeded with the default vocabulary as the `system` level
    pub fn with_system_defaults() -> Self {
        let defaults = crate::defaults::system_default_entries()
            .into_iter()
            .map(|entry| (entry.key.clone(), entry))
            .collect();
        let mut store = Store::default();
        store.entries.insert(EntityRef::system(), defaults);
        Self {
            store: RwLock::new(store),
            ..Self::default()
        }
    }

    /// Link `child` to its parent in the inheritance chain
    pub async fn set_parent(&self, child: EntityRef, parent: EntityRef) {
        self.store.write().await.parents.insert(child, parent);
    }

    /// Remove a parent link
    pub async fn clear_parent(&self, child: &EntityRef) {
        self.store.write().await.parents.remove(child);
    }

    pub async fn set_settings(&self, entity: EntityRef, settings: EntitySettings) {
        self.store.write().await.settings.insert(entity, settings);
    }

    pub async fn set_ab_assignment(&self, entity: EntityRef, assignment: AbAssignment) {
        self.store.write().await.assignments.insert(entity, assignment);
    }

    pub async fn put_ab_variant(&self, test_id: &str, variant: &str, terms: TermMap) {
        self.store
            .write()
            .await
            .variants
            .insert((test_id.to_string(), variant.to_string()), terms);
    }

    /// Make `get_entries` fail for one entity
    pub async fn fail_entries_for(&self, entity: EntityRef) {
        self.failing_entries.write().await.insert(entity);
    }

    /// Make `get_parent` fail for one entity
    pub async fn fail_parent_for(&self, entity: EntityRef) {
        self.failing_parents.write().await.insert(entity);
    }

    pub fn fail_system_defaults(&self, fail: bool) {
        self.fail_defaults.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `get_entries` calls served so far
    pub fn entry_fetch_count(&self) -> usize {
        self.entry_fetches.load(Ordering::SeqCst)
    }

    /// Number of `get_system_defaults` calls served so far
    pub fn default_fetch_count(&self) -> usize {
        self.default_fetches.load(Ordering::SeqCst)
    }

    fn check_writable(&self, entity: &EntityRef) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Repository(format!("write rejected for {}", entity)));
        }
        Ok(())
    }
}

#[async_trait]
impl TerminologyRepository for InMemoryRepository {
    async fn get_entries(&self, entity: &EntityRef) -> Result<Vec<TerminologyEntry>> {
        self.entry_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_entries.read().await.contains(entity) {
            return Err(Error::Repository(format!("entry fetch failed for {}", entity)));
        }
        let store = self.store.read().await;
        Ok(store
            .entries
            .get(entity)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_entries(&self, entity: &EntityRef, entries: &[TerminologyEntry]) -> Result<()> {
        self.check_writable(entity)?;
        let mut store = self.store.write().await;
        let stored = store.entries.entry(entity.clone()).or_default();
        for entry in entries {
            stored.insert(entry.key.clone(), entry.clone());
        }
        Ok(())
    }

    async fn delete_entries_by_prefix(&self, entity: &EntityRef, key_prefix: &str) -> Result<u64> {
        self.check_writable(entity)?;
        let mut store = self.store.write().await;
        let Some(stored) = store.entries.get_mut(entity) else {
            return Ok(0);
        };
        let before = stored.len();
        stored.retain(|key, _| !key_has_prefix(key, key_prefix));
        Ok((before - stored.len()) as u64)
    }

    async fn delete_all_entries(&self, entity: &EntityRef) -> Result<u64> {
        self.check_writable(entity)?;
        let mut store = self.store.write().await;
        Ok(store
            .entries
            .remove(entity)
            .map(|entries| entries.len() as u64)
            .unwrap_or(0))
    }

    async fn replace_entries(&self, entity: &EntityRef, entries: &[TerminologyEntry]) -> Result<()> {
        self.check_writable(entity)?;
        let replacement: BTreeMap<String, TerminologyEntry> = entries
            .iter()
            .map(|entry| (entry.key.clone(), entry.clone()))
            .collect();
        self.store
            .write()
            .await
            .entries
            .insert(entity.clone(), replacement);
        Ok(())
    }

    async fn get_parent(&self, entity: &EntityRef) -> Result<Option<EntityRef>> {
        if self.failing_parents.read().await.contains(entity) {
            return Err(Error::Repository(format!("parent lookup failed for {}", entity)));
        }
        Ok(self.store.read().await.parents.get(entity).cloned())
    }

    async fn get_system_defaults(&self) -> Result<Vec<TerminologyEntry>> {
        self.default_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_defaults.load(Ordering::SeqCst) {
            return Err(Error::Repository("system defaults unavailable".to_string()));
        }
        let store = self.store.read().await;
        Ok(store
            .entries
            .get(&EntityRef::system())
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_settings(&self, entity: &EntityRef) -> Result<EntitySettings> {
        Ok(self
            .store
            .read()
            .await
            .settings
            .get(entity)
            .copied()
            .unwrap_or_default())
    }

    async fn get_ab_assignment(&self, entity: &EntityRef) -> Result<Option<AbAssignment>> {
        Ok(self.store.read().await.assignments.get(entity).cloned())
    }

    async fn get_ab_variant_terms(&self, test_id: &str, variant: &str) -> Result<Option<TermMap>> {
        Ok(self
            .store
            .read()
            .await
            .variants
            .get(&(test_id.to_string(), variant.to_string()))
            .cloned())
    }
}
