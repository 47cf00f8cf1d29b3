//! In-process property maps addressed by `mem:` locators

use crate::core::{
    ConfigError, ConfigResult, LoadContext, Locator, Properties, PropertyLoader, Scheme,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Loader serving named maps that can be changed at runtime
///
/// Clones share the same maps, so a test can keep one handle, hand another
/// to a configuration and rewrite a source between reloads.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    maps: Arc<RwLock<HashMap<String, Properties>>>,
}

impl MemoryLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the map served at `mem:<name>`
    pub fn insert(&self, name: impl Into<String>, properties: Properties) {
        self.maps.write().insert(name.into(), properties);
    }

    /// Set a single key of a registered map, creating the map if needed
    pub fn set(&self, name: &str, key: impl Into<String>, value: impl Into<String>) {
        self.maps
            .write()
            .entry(name.to_string())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Remove a key from a registered map
    pub fn unset(&self, name: &str, key: &str) {
        if let Some(map) = self.maps.write().get_mut(name) {
            map.remove(key);
        }
    }

    /// Unregister a map; `mem:<name>` becomes unavailable
    pub fn remove(&self, name: &str) -> Option<Properties> {
        self.maps.write().remove(name)
    }

    /// Check whether `mem:<name>` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.maps.read().contains_key(name)
    }
}

#[async_trait]
impl PropertyLoader for MemoryLoader {
    fn accept(&self, locator: &Locator) -> bool {
        *locator.scheme() == Scheme::Memory
    }

    async fn load(&self, locator: &Locator, _cx: &LoadContext) -> ConfigResult<Properties> {
        self.maps
            .read()
            .get(locator.path())
            .cloned()
            .ok_or_else(|| ConfigError::source_unavailable(locator.to_string(), "no such map"))
    }
}
