//! Home Assistant Registries
//!
//! Persistent registries kept as versioned JSON in the `.storage/`
//! directory. Only the entity registry is needed so far.

pub mod storage;

pub mod entity_registry;

pub use storage::{Storable, Storage, StorageError, StorageFile, StorageResult};

pub use entity_registry::{
    DisabledBy, EntityEntry, EntityRegistration, EntityRegistry, EntityRegistryData,
    EntityRegistryError,
};
