//! Ordered, removable listener registrations

use crate::core::{PropertyChangeListener, ReloadListener, TransactionalListener};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle returned on registration, used to remove the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// A registered observer
#[derive(Clone)]
pub enum Registration {
    /// Observes applied changes
    Change(Arc<dyn PropertyChangeListener>),
    /// Observes applied changes and may veto pending ones
    Transactional(Arc<dyn TransactionalListener>),
    /// Observes completed reloads
    Reload(Arc<dyn ReloadListener>),
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Registration::Change(_) => "Change",
            Registration::Transactional(_) => "Transactional",
            Registration::Reload(_) => "Reload",
        })
    }
}

/// Listeners of one configuration instance, in registration order
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    entries: RwLock<Vec<(ListenerId, Registration)>>,
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener at the end of the order
    pub fn add(&self, registration: Registration) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, registration));
        tracing::debug!(listener = id.0, "listener registered");
        id
    }

    /// Remove a listener; returns `false` if it was not registered
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Copy of the current registrations, so callbacks run without the lock
    pub fn registrations(&self) -> Vec<Registration> {
        self.entries
            .read()
            .iter()
            .map(|(_, registration)| registration.clone())
            .collect()
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
