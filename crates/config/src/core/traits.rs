//! Contracts between the engine and its pluggable collaborators

use super::{
    BoxError, ChangeSet, ConfigResult, Environment, Locator, Properties, PropertyChange, Snapshot,
};
use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::path::PathBuf;
use std::sync::Arc;

/// Inputs available to a loader during one resolution pass
#[derive(Debug, Clone)]
pub struct LoadContext {
    /// Environment captured for this pass
    pub env: Arc<Environment>,
    /// Roots searched for `resource:` locators
    pub resource_roots: Arc<[PathBuf]>,
}

impl LoadContext {
    /// Create a load context
    pub fn new(env: Arc<Environment>, resource_roots: Arc<[PathBuf]>) -> Self {
        Self {
            env,
            resource_roots,
        }
    }
}

/// Turns a source locator into a flat string map
#[async_trait]
pub trait PropertyLoader: Send + Sync {
    /// Check if the loader handles this locator
    fn accept(&self, locator: &Locator) -> bool;

    /// Load the source. Any error means "source unavailable".
    async fn load(&self, locator: &Locator, cx: &LoadContext) -> ConfigResult<Properties>;
}

/// Named resolver for `${name:arg}` placeholders
///
/// Instances are created once per declaration and shared by every expansion
/// and every reload, so implementations may keep state behind `&self`.
pub trait Substitutor: Send + Sync {
    /// Produce the replacement for `argument` (possibly empty)
    fn replace(&self, argument: &str) -> String;
}

impl<F> Substitutor for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn replace(&self, argument: &str) -> String {
        self(argument)
    }
}

/// Custom conversion of one raw token into a typed value
pub trait Converter: Send + Sync + 'static {
    /// Produced type
    type Output: Send + 'static;

    /// Convert a token
    fn convert(&self, token: &str) -> Result<Self::Output, BoxError>;
}

/// Object-safe view of a [`Converter`]
pub(crate) trait ErasedConverter: Send + Sync {
    fn convert_any(&self, token: &str) -> Result<Box<dyn Any + Send>, BoxError>;

    fn output_type(&self) -> &'static str;

    fn output_type_id(&self) -> TypeId;
}

impl<C: Converter> ErasedConverter for C {
    fn convert_any(&self, token: &str) -> Result<Box<dyn Any + Send>, BoxError> {
        self.convert(token)
            .map(|value| Box::new(value) as Box<dyn Any + Send>)
    }

    fn output_type(&self) -> &'static str {
        std::any::type_name::<C::Output>()
    }

    fn output_type_id(&self) -> TypeId {
        TypeId::of::<C::Output>()
    }
}

/// Splits a raw collection value into tokens
pub trait Tokenizer: Send + Sync {
    /// Split `value` into ordered tokens
    fn tokenize(&self, value: &str) -> Vec<String>;
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    fn tokenize(&self, value: &str) -> Vec<String> {
        self(value)
    }
}

/// Answer of a transactional listener to a proposed change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Let the change through
    Accept,
    /// Drop this key's change and keep its old value
    VetoKey,
    /// Discard the whole batch
    VetoBatch,
}

/// Observer of applied property changes
pub trait PropertyChangeListener: Send + Sync {
    /// Called once per applied change, after the new snapshot is published
    fn property_changed(&self, change: &PropertyChange);
}

/// Change observer that may veto changes before they are published
pub trait TransactionalListener: PropertyChangeListener {
    /// Called once per pending key change
    fn before_property_change(&self, _change: &PropertyChange) -> Verdict {
        Verdict::Accept
    }

    /// Called once with the batch that survived the per-key hooks.
    /// Any veto here discards the whole batch.
    fn before_batch(&self, _changes: &ChangeSet) -> Verdict {
        Verdict::Accept
    }
}

/// Notification that a reload was published
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    /// Changes that were applied
    pub changes: ChangeSet,
    /// Newly published snapshot
    pub snapshot: Arc<Snapshot>,
}

/// Observer of completed reloads
pub trait ReloadListener: Send + Sync {
    /// Called after every published reload
    fn reload_performed(&self, event: &ReloadEvent);
}
