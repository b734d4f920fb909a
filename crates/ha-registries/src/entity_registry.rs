//! Entity Registry
//!
//! Maps stable `(domain, platform, unique_id)` identities to entity IDs so
//! an entity keeps the same `entity_id` across restarts and config entry
//! reloads.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::storage::{Storable, Storage, StorageResult};

#[derive(Debug, Error, Clone)]
pub enum EntityRegistryError {
    #[error("Entity not found: {0}")]
    NotFound(String),
}

pub const STORAGE_KEY: &str = "core.entity_registry";
pub const STORAGE_VERSION: u32 = 1;
pub const STORAGE_MINOR_VERSION: u32 = 19;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledBy {
    ConfigEntry,
    Integration,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEntry {
    /// Internal ULID, stable across entity_id renames
    pub id: String,
    pub entity_id: String,
    pub unique_id: String,
    /// Integration that provides the entity (e.g. "min_max")
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_entry_id: Option<String>,
    /// User override of the display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name the integration gave the entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_by: Option<DisabledBy>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl EntityEntry {
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map_or(self.entity_id.as_str(), |(domain, _)| domain)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled_by.is_some()
    }

    fn identity(&self) -> (String, String, String) {
        (
            self.domain().to_string(),
            self.platform.clone(),
            self.unique_id.clone(),
        )
    }
}

/// What an integration knows about an entity it wants registered
#[derive(Debug, Clone, Default)]
pub struct EntityRegistration<'a> {
    pub domain: &'a str,
    pub platform: &'a str,
    pub unique_id: &'a str,
    /// Object id to try first when allocating a new entity_id
    pub suggested_object_id: &'a str,
    pub config_entry_id: Option<&'a str>,
    pub original_name: Option<&'a str>,
    /// Entity ids that are taken even though they are not registered
    /// (e.g. states written without a unique_id)
    pub reserved_ids: &'a [String],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityRegistryData {
    pub entities: Vec<EntityEntry>,
}

impl Storable for EntityRegistryData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Entity registry with lookups by entity_id, identity and config entry
///
/// Entries are handed out as `Arc<EntityEntry>`; updates replace the Arc.
pub struct EntityRegistry {
    storage: Arc<Storage>,

    /// entity_id -> entry, in registration order
    by_entity_id: RwLock<IndexMap<String, Arc<EntityEntry>>>,

    /// (domain, platform, unique_id) -> entity_id
    by_identity: DashMap<(String, String, String), String>,

    /// config_entry_id -> entity_ids
    by_config_entry_id: DashMap<String, HashSet<String>>,
}

impl EntityRegistry {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            by_entity_id: RwLock::new(IndexMap::new()),
            by_identity: DashMap::new(),
            by_config_entry_id: DashMap::new(),
        }
    }

    pub async fn load(&self) -> StorageResult<()> {
        if let Some(data) = self.storage.load::<EntityRegistryData>().await? {
            info!("Loading {} entities from storage", data.entities.len());
            for entry in data.entities {
                self.index_entry(Arc::new(entry));
            }
        }
        Ok(())
    }

    pub async fn save(&self) -> StorageResult<()> {
        let data = EntityRegistryData {
            entities: self.iter().iter().map(|e| (**e).clone()).collect(),
        };
        self.storage.save(&data).await?;
        debug!("Saved {} entities to storage", data.entities.len());
        Ok(())
    }

    fn index_entry(&self, entry: Arc<EntityEntry>) {
        let entity_id = entry.entity_id.clone();

        self.by_identity.insert(entry.identity(), entity_id.clone());
        if let Some(ref config_entry_id) = entry.config_entry_id {
            self.by_config_entry_id
                .entry(config_entry_id.clone())
                .or_default()
                .insert(entity_id.clone());
        }
        if let Ok(mut idx) = self.by_entity_id.write() {
            idx.insert(entity_id, entry);
        }
    }

    /// Remove from the secondary indexes (the primary index is handled by
    /// the caller, which already took the entry out of it)
    fn unindex_secondary(&self, entry: &EntityEntry) {
        self.by_identity.remove(&entry.identity());
        if let Some(ref config_entry_id) = entry.config_entry_id {
            if let Some(mut ids) = self.by_config_entry_id.get_mut(config_entry_id) {
                ids.remove(&entry.entity_id);
            }
        }
    }

    fn take(&self, entity_id: &str) -> Option<Arc<EntityEntry>> {
        self.by_entity_id
            .write()
            .ok()
            .and_then(|mut idx| idx.shift_remove(entity_id))
    }

    pub fn get(&self, entity_id: &str) -> Option<Arc<EntityEntry>> {
        self.by_entity_id
            .read()
            .ok()
            .and_then(|idx| idx.get(entity_id).cloned())
    }

    /// Look up the entity_id registered for an identity
    pub fn get_entity_id(&self, domain: &str, platform: &str, unique_id: &str) -> Option<String> {
        self.by_identity
            .get(&(
                domain.to_string(),
                platform.to_string(),
                unique_id.to_string(),
            ))
            .map(|r| r.value().clone())
    }

    pub fn entries_for_config_entry(&self, config_entry_id: &str) -> Vec<Arc<EntityEntry>> {
        self.by_config_entry_id
            .get(config_entry_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Return the entry for an identity, registering it if it is new
    ///
    /// An existing entry keeps its entity_id; its `config_entry_id` and
    /// `original_name` are refreshed from the registration. A new entry
    /// gets `{domain}.{suggested_object_id}`, suffixed with `_2`, `_3`, ...
    /// when that is taken.
    pub fn get_or_create(&self, registration: EntityRegistration<'_>) -> Arc<EntityEntry> {
        if let Some(entity_id) = self.get_entity_id(
            registration.domain,
            registration.platform,
            registration.unique_id,
        ) {
            let config_entry_id = registration.config_entry_id.map(String::from);
            let original_name = registration.original_name.map(String::from);
            let existing = self.get(&entity_id);
            let unchanged = existing.as_ref().is_some_and(|e| {
                e.config_entry_id == config_entry_id && e.original_name == original_name
            });
            if let (Some(existing), true) = (existing, unchanged) {
                debug!("Found existing entity by unique_id: {}", existing.entity_id);
                return existing;
            }
            if let Ok(updated) = self.update(&entity_id, |entry| {
                entry.config_entry_id = config_entry_id;
                entry.original_name = original_name;
                entry.modified_at = Utc::now();
            }) {
                return updated;
            }
        }

        let entity_id = self.generate_entity_id(
            registration.domain,
            registration.suggested_object_id,
            registration.reserved_ids,
        );
        let now = Utc::now();
        let entry = Arc::new(EntityEntry {
            id: ulid::Ulid::new().to_string().to_lowercase(),
            entity_id: entity_id.clone(),
            unique_id: registration.unique_id.to_string(),
            platform: registration.platform.to_string(),
            config_entry_id: registration.config_entry_id.map(String::from),
            name: None,
            original_name: registration.original_name.map(String::from),
            disabled_by: None,
            created_at: now,
            modified_at: now,
        });
        self.index_entry(Arc::clone(&entry));

        info!("Registered new entity: {}", entity_id);
        entry
    }

    /// Apply `f` to a copy of the entry and store the result
    pub fn update<F>(&self, entity_id: &str, f: F) -> Result<Arc<EntityEntry>, EntityRegistryError>
    where
        F: FnOnce(&mut EntityEntry),
    {
        let current = self
            .take(entity_id)
            .ok_or_else(|| EntityRegistryError::NotFound(entity_id.to_string()))?;
        self.unindex_secondary(&current);

        let mut entry = (*current).clone();
        f(&mut entry);

        let entry = Arc::new(entry);
        self.index_entry(Arc::clone(&entry));
        Ok(entry)
    }

    pub fn remove(&self, entity_id: &str) -> Option<Arc<EntityEntry>> {
        let entry = self.take(entity_id)?;
        self.unindex_secondary(&entry);
        info!("Removed entity: {}", entity_id);
        Some(entry)
    }

    /// Remove every entity that belongs to a config entry
    pub fn remove_config_entry(&self, config_entry_id: &str) -> Vec<Arc<EntityEntry>> {
        let ids: Vec<String> = self
            .by_config_entry_id
            .remove(config_entry_id)
            .map(|(_, ids)| ids.into_iter().collect())
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn is_registered(&self, entity_id: &str) -> bool {
        self.by_entity_id
            .read()
            .map(|idx| idx.contains_key(entity_id))
            .unwrap_or(false)
    }

    /// First free entity_id for `domain.suggested_object_id`
    pub fn generate_entity_id(
        &self,
        domain: &str,
        suggested_object_id: &str,
        reserved_ids: &[String],
    ) -> String {
        let preferred = format!("{}.{}", domain, suggested_object_id);
        let is_available = |candidate: &str| {
            !self.is_registered(candidate) && !reserved_ids.iter().any(|r| r == candidate)
        };

        if is_available(&preferred) {
            return preferred;
        }
        (2..)
            .map(|n| format!("{}_{}", preferred, n))
            .find(|candidate| is_available(candidate))
            .unwrap_or(preferred)
    }

    /// All entries in registration order
    pub fn iter(&self) -> Vec<Arc<EntityEntry>> {
        self.by_entity_id
            .read()
            .map(|idx| idx.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entity_ids(&self) -> Vec<String> {
        self.by_entity_id
            .read()
            .map(|idx| idx.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_entity_id.read().map(|idx| idx.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
