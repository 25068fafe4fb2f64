use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::model::state::EntityHandle;

/// Binding of a hub device to its host entity, plus an optional entity that
/// is refreshed in lockstep with it.
#[derive(Clone, Debug)]
pub struct RegistryEntry {
    pub entity: Arc<EntityHandle>,
    pub cascade: Option<Arc<EntityHandle>>,
}

impl RegistryEntry {
    #[must_use]
    pub const fn new(entity: Arc<EntityHandle>) -> Self {
        Self {
            entity,
            cascade: None,
        }
    }

    #[must_use]
    pub fn with_cascade(self, cascade: Arc<EntityHandle>) -> Self {
        Self {
            cascade: Some(cascade),
            ..self
        }
    }
}

/// Canonical hub device id -> registered entity binding.
///
/// Written during entity setup, read from the listener task. Both may overlap,
/// so all access goes through a reader/writer lock.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    entries: RwLock<HashMap<String, RegistryEntry>>,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when `id` was already registered; the first
    /// registration always wins.
    pub fn register(&self, id: impl Into<String>, entry: RegistryEntry) -> bool {
        let id = id.into();
        let mut lock = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if lock.contains_key(&id) {
            log::debug!("Device {id} already registered, keeping existing entry");
            return false;
        }
        log::debug!("Registered device {id} -> {}", entry.entity.entity_id());
        lock.insert(id, entry);
        true
    }

    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<RegistryEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Bind a cascade entity to an already registered device.
    pub fn attach_cascade(&self, id: &str, cascade: Arc<EntityHandle>) -> bool {
        let mut lock = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = lock.get_mut(id) else {
            log::warn!("Cannot attach cascade entity to unregistered device {id}");
            return false;
        };
        entry.cascade = Some(cascade);
        true
    }

    /// Snapshot of all entries, taken under a single read lock.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, RegistryEntry)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
