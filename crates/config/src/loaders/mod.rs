//! Property loader implementations

mod env;
mod file;
mod memory;

pub use env::{ALL, EnvLoader, SystemPropertiesLoader};
pub use file::{FileFormat, FileLoader, flatten, parse_content, parse_properties};
pub use memory::MemoryLoader;

// Re-export trait from core for convenience
pub use crate::core::PropertyLoader;

use crate::core::{ConfigError, ConfigResult, LoadContext, Locator, Properties};
use async_trait::async_trait;
use std::sync::Arc;

/// Ordered set of loaders; the first one accepting a locator handles it
#[derive(Clone, Default)]
pub struct LoaderChain {
    loaders: Vec<Arc<dyn PropertyLoader>>,
}

impl std::fmt::Debug for LoaderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderChain")
            .field("loaders", &format!("{} loaders", self.loaders.len()))
            .finish()
    }
}

impl LoaderChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain with the file, resource, env and system loaders
    pub fn default_loaders() -> Self {
        Self::new()
            .with_loader(FileLoader::new())
            .with_loader(EnvLoader::new())
            .with_loader(SystemPropertiesLoader::new())
    }

    /// Add a loader after the existing ones
    #[must_use = "builder methods must be chained or built"]
    pub fn with_loader<L: PropertyLoader + 'static>(mut self, loader: L) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    /// Add a shared loader after the existing ones
    #[must_use = "builder methods must be chained or built"]
    pub fn with_shared_loader(mut self, loader: Arc<dyn PropertyLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Add a loader in front of the existing ones
    pub fn prepend(&mut self, loader: Arc<dyn PropertyLoader>) {
        self.loaders.insert(0, loader);
    }

    /// First loader accepting `locator`
    pub fn find(&self, locator: &Locator) -> Option<&Arc<dyn PropertyLoader>> {
        self.loaders.iter().find(|loader| loader.accept(locator))
    }

    /// Number of loaders
    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    /// Check whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

#[async_trait]
impl PropertyLoader for LoaderChain {
    fn accept(&self, locator: &Locator) -> bool {
        self.find(locator).is_some()
    }

    async fn load(&self, locator: &Locator, cx: &LoadContext) -> ConfigResult<Properties> {
        match self.find(locator) {
            Some(loader) => loader.load(locator, cx).await,
            None => Err(ConfigError::source_unavailable(
                locator.to_string(),
                format!("no loader supports scheme '{}'", locator.scheme()),
            )),
        }
    }
}
