//! Combining loaded sources under a merge policy

use crate::core::{LoadContext, LoadPolicy, Locator, Properties};
use crate::loaders::LoaderChain;

/// Result of one load pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Merged, un-expanded properties
    pub properties: Properties,
    /// Sources that loaded successfully and took part in the result
    pub contributing: Vec<Locator>,
}

/// Loads ordered sources through a loader chain and merges them
///
/// Sources nobody accepts and sources whose loader fails are skipped. Loader
/// errors never leave the engine.
#[derive(Debug, Clone, Copy)]
pub struct LoadEngine<'a> {
    loaders: &'a LoaderChain,
    cx: &'a LoadContext,
}

impl<'a> LoadEngine<'a> {
    /// Create an engine
    pub fn new(loaders: &'a LoaderChain, cx: &'a LoadContext) -> Self {
        Self { loaders, cx }
    }

    /// Load `locators` under `policy`
    ///
    /// `First` stops at the first source that loads. `Merge` reads every
    /// source concurrently and keeps, for each key, the value of the earliest
    /// source in `locators` that defines it.
    pub async fn load(&self, locators: &[Locator], policy: LoadPolicy) -> LoadOutcome {
        match policy {
            LoadPolicy::First => self.load_first(locators).await,
            LoadPolicy::Merge => self.load_merged(locators).await,
        }
    }

    async fn load_first(&self, locators: &[Locator]) -> LoadOutcome {
        for locator in locators {
            if let Some(properties) = self.load_one(locator).await {
                return LoadOutcome {
                    properties,
                    contributing: vec![locator.clone()],
                };
            }
        }
        tracing::debug!(
            action = "load_first",
            sources = locators.len(),
            "no source could be loaded"
        );
        LoadOutcome::default()
    }

    async fn load_merged(&self, locators: &[Locator]) -> LoadOutcome {
        let results =
            futures::future::join_all(locators.iter().map(|locator| self.load_one(locator))).await;

        let mut outcome = LoadOutcome::default();
        for (locator, loaded) in locators.iter().zip(results) {
            let Some(properties) = loaded else {
                continue;
            };
            for (key, value) in properties {
                outcome.properties.entry(key).or_insert(value);
            }
            outcome.contributing.push(locator.clone());
        }
        outcome
    }

    async fn load_one(&self, locator: &Locator) -> Option<Properties> {
        let Some(loader) = self.loaders.find(locator) else {
            tracing::debug!(
                action = "source_skipped",
                source = %locator,
                "no loader accepts source"
            );
            return None;
        };

        match loader.load(locator, self.cx).await {
            Ok(properties) => {
                tracing::debug!(
                    action = "source_loaded",
                    source = %locator,
                    keys = properties.len(),
                    "loaded configuration source"
                );
                Some(properties)
            }
            Err(e) => {
                tracing::warn!(
                    action = "source_unavailable",
                    source = %locator,
                    error = %e,
                    "skipping unavailable source"
                );
                None
            }
        }
    }
}

/// Overwrite `properties` with the imported maps; among imports the
/// earliest map wins
pub fn apply_imports<'i, I>(properties: &mut Properties, imports: I)
where
    I: IntoIterator<Item = &'i Properties>,
    I::IntoIter: DoubleEndedIterator,
{
    for import in imports.into_iter().rev() {
        for (key, value) in import {
            properties.insert(key.clone(), value.clone());
        }
    }
}
