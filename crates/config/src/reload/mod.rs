//! Hot reload: scheduling, veto protocol and change notification

mod listeners;
mod scheduler;
mod transaction;

pub use listeners::{ListenerId, ListenerRegistry, Registration};
pub use scheduler::{ReloadOutcome, ReloadScheduler};
pub use transaction::{Decision, decide, notify};

pub(crate) use scheduler::Pipeline;
