//! Veto and notification protocol around a pending change set

use super::listeners::Registration;
use crate::core::{ChangeSet, ReloadEvent, Snapshot, Verdict};
use std::sync::Arc;

/// What the transactional listeners decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Publish these (possibly reduced) changes
    Commit(ChangeSet),
    /// A listener rejected the whole batch
    Vetoed,
    /// Every key was vetoed individually; nothing to publish
    Empty,
}

/// Ask every transactional listener, in registration order, about `changes`
///
/// Each listener first sees every key change still pending, then the
/// remaining batch. `VetoKey` on a key drops that change; any veto of the
/// batch, or `VetoBatch` on a key, stops the protocol without asking the
/// listeners that follow.
pub fn decide(mut changes: ChangeSet, registrations: &[Registration]) -> Decision {
    for registration in registrations {
        let Registration::Transactional(listener) = registration else {
            continue;
        };

        let pending: Vec<_> = changes.iter().cloned().collect();
        for change in &pending {
            match listener.before_property_change(change) {
                Verdict::Accept => {}
                Verdict::VetoKey => {
                    tracing::debug!(key = %change.key, "property change vetoed");
                    changes.remove(&change.key);
                }
                Verdict::VetoBatch => {
                    tracing::info!(key = %change.key, "reload vetoed by listener");
                    return Decision::Vetoed;
                }
            }
        }

        if listener.before_batch(&changes) != Verdict::Accept {
            tracing::info!(changes = changes.len(), "reload batch vetoed by listener");
            return Decision::Vetoed;
        }
    }

    if changes.is_empty() {
        Decision::Empty
    } else {
        Decision::Commit(changes)
    }
}

/// Deliver applied changes, then the reload event, in registration order
pub fn notify(registrations: &[Registration], changes: &ChangeSet, snapshot: &Arc<Snapshot>) {
    for registration in registrations {
        for change in changes {
            match registration {
                Registration::Change(listener) => listener.property_changed(change),
                Registration::Transactional(listener) => listener.property_changed(change),
                Registration::Reload(_) => break,
            }
        }
    }

    let event = ReloadEvent {
        changes: changes.clone(),
        snapshot: Arc::clone(snapshot),
    };
    for registration in registrations {
        if let Registration::Reload(listener) = registration {
            listener.reload_performed(&event);
        }
    }
}
