//! Reload triggering, single-flight execution and snapshot publication

use super::listeners::ListenerRegistry;
use super::transaction::{self, Decision};
use crate::core::{
    ChangeSet, ConfigResult, ConfigResultExt, Declaration, Environment, HotReload, LoadContext,
    Properties, ReloadMode, Snapshot,
};
use crate::loaders::LoaderChain;
use crate::resolve::{KeyTemplate, LoadEngine, SourceResolver, VariableExpander, apply_imports};
use arc_swap::ArcSwap;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Result of one reload request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Sources produced the same properties as the current snapshot
    Unchanged,
    /// A new snapshot was published
    Applied {
        /// Version of the published snapshot
        version: u64,
        /// Changes that made it into the snapshot
        changes: ChangeSet,
    },
    /// A transactional listener rejected the batch
    Vetoed,
    /// Another reload covering this request ran instead
    Coalesced,
}

impl ReloadOutcome {
    /// Check whether a new snapshot was published
    pub fn is_applied(&self) -> bool {
        matches!(self, ReloadOutcome::Applied { .. })
    }
}

/// Everything needed to build a candidate property map from scratch
pub(crate) struct Pipeline {
    pub declaration: Arc<Declaration>,
    pub loaders: LoaderChain,
    pub imports: Arc<Properties>,
    pub resource_roots: Arc<[PathBuf]>,
    /// Fixed environment; captured anew on every pass when `None`
    pub environment: Option<Arc<Environment>>,
}

impl Pipeline {
    /// Resolve, load, merge, import and default one property map
    pub async fn run(&self) -> ConfigResult<Snapshot> {
        let env = match &self.environment {
            Some(env) => Arc::clone(env),
            None => Arc::new(Environment::capture()),
        };
        let declaration = &*self.declaration;

        let locators = SourceResolver::new(&env, &self.imports)
            .with_substitutors(declaration.substitutors())
            .resolve(declaration)?;

        let cx = LoadContext::new(Arc::clone(&env), Arc::clone(&self.resource_roots));
        let outcome = LoadEngine::new(&self.loaders, &cx)
            .load(&locators, declaration.policy())
            .await;

        let mut properties = outcome.properties;
        apply_imports(&mut properties, std::iter::once(&*self.imports));
        self.insert_defaults(&mut properties);

        tracing::debug!(
            action = "resolved",
            declaration = declaration.name(),
            sources = outcome.contributing.len(),
            properties = properties.len(),
            "property map resolved"
        );
        Ok(Snapshot::new(properties, 0, outcome.contributing))
    }

    fn insert_defaults(&self, properties: &mut Properties) {
        let declaration = &*self.declaration;
        let features = declaration.features();
        let defaults: Vec<(String, String)> = {
            let expander = VariableExpander::new()
                .layer(&self.imports)
                .layer(properties)
                .substitutors(declaration.substitutors());
            declaration
                .properties()
                .filter_map(|def| {
                    let default = def.default()?;
                    let key = KeyTemplate {
                        key: def.key_template(),
                        prefix: declaration.prefix(),
                        expand: def.expands_variables(features),
                        apply_prefix: def.applies_prefix(features),
                    }
                    .resolve(&expander, None);
                    Some((key, default.to_string()))
                })
                .collect()
        };

        for (key, default) in defaults {
            properties.entry(key).or_insert(default);
        }
    }
}

/// Owns the current snapshot and decides when and how it is replaced
///
/// At most one reload runs at a time. Explicit requests queue behind a
/// running reload and are answered with [`ReloadOutcome::Coalesced`] when a
/// reload that started after them already finished. Timer and on-access
/// triggers never wait: they are dropped while a reload is running.
pub struct ReloadScheduler {
    pipeline: Pipeline,
    current: ArcSwap<Snapshot>,
    listeners: ListenerRegistry,
    settings: Option<HotReload>,
    gate: tokio::sync::Mutex<()>,
    started: AtomicU64,
    last_check: Mutex<Instant>,
}

impl ReloadScheduler {
    /// Run the first resolution and publish it as version 1
    pub(crate) async fn start(pipeline: Pipeline) -> ConfigResult<Self> {
        let initial = pipeline.run().await?;
        let initial = Snapshot::new(
            initial.properties().clone(),
            1,
            initial.contributing_sources().to_vec(),
        );
        let settings = pipeline.declaration.hot_reload();

        tracing::info!(
            action = "loaded",
            declaration = pipeline.declaration.name(),
            properties = initial.len(),
            reload = ?settings.map(|s| s.mode),
            "configuration loaded"
        );

        Ok(Self {
            pipeline,
            current: ArcSwap::from_pointee(initial),
            listeners: ListenerRegistry::new(),
            settings,
            gate: tokio::sync::Mutex::new(()),
            started: AtomicU64::new(0),
            last_check: Mutex::new(Instant::now()),
        })
    }

    /// Currently published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Hot-reload mode, `None` when reloading is disabled
    pub fn mode(&self) -> Option<ReloadMode> {
        self.settings.map(|s| s.mode)
    }

    /// Registered listeners
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub(crate) fn imports(&self) -> &Properties {
        &self.pipeline.imports
    }

    pub(crate) fn declaration(&self) -> &Declaration {
        &self.pipeline.declaration
    }

    /// Reload now, waiting for a running reload to finish first
    pub async fn reload(&self) -> ConfigResult<ReloadOutcome> {
        let ticket = self.started.load(Ordering::Acquire);
        let _guard = self.gate.lock().await;
        if self.started.load(Ordering::Acquire) != ticket {
            tracing::debug!(action = "reload", "request coalesced into a later reload");
            return Ok(ReloadOutcome::Coalesced);
        }
        self.started.fetch_add(1, Ordering::AcqRel);
        self.reload_locked("explicit").await
    }

    /// Reload unless one is already running
    pub(crate) async fn try_reload(&self, trigger: &'static str) -> ConfigResult<ReloadOutcome> {
        let Ok(_guard) = self.gate.try_lock() else {
            tracing::trace!(trigger, "reload already running, skipping");
            return Ok(ReloadOutcome::Coalesced);
        };
        self.started.fetch_add(1, Ordering::AcqRel);
        self.reload_locked(trigger).await
    }

    /// Called on every accessor read; reloads in `Sync` mode once the
    /// interval has elapsed
    pub(crate) async fn on_access(&self) {
        let Some(settings) = self.settings else {
            return;
        };
        if settings.mode != ReloadMode::Sync {
            return;
        }

        {
            let mut last_check = self.last_check.lock();
            if last_check.elapsed() < settings.interval() {
                return;
            }
            *last_check = Instant::now();
        }

        if let Err(e) = self.try_reload("access").await {
            tracing::warn!(error = %e, "reload on access failed, keeping current snapshot");
        }
    }

    /// Spawn the background timer for `Async` mode
    pub(crate) fn spawn_timer(
        self: &Arc<Self>,
        token: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let settings = self.settings?;
        if settings.mode != ReloadMode::Async {
            return None;
        }

        let scheduler: Weak<Self> = Arc::downgrade(self);
        let period = settings.interval();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        tracing::debug!("reload timer stopped");
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                let Some(scheduler) = scheduler.upgrade() else {
                    break;
                };
                // A panicking listener must not end the timer
                match AssertUnwindSafe(scheduler.try_reload("timer")).catch_unwind().await {
                    Ok(result) => {
                        result.log_error();
                    }
                    Err(panic) => tracing::error!(
                        panic = panic_message(panic.as_ref()),
                        "reload panicked, keeping current snapshot"
                    ),
                }
            }
        }))
    }

    async fn reload_locked(&self, trigger: &'static str) -> ConfigResult<ReloadOutcome> {
        let candidate = self.pipeline.run().await?;
        let current = self.current.load_full();

        let changes = ChangeSet::diff(current.properties(), candidate.properties());
        if changes.is_empty() {
            tracing::debug!(trigger, version = current.version(), "no property changes");
            return Ok(ReloadOutcome::Unchanged);
        }

        let registrations = self.listeners.registrations();
        let changes = match transaction::decide(changes, &registrations) {
            Decision::Commit(changes) => changes,
            Decision::Vetoed => return Ok(ReloadOutcome::Vetoed),
            Decision::Empty => {
                tracing::debug!(trigger, "every change vetoed, nothing to publish");
                return Ok(ReloadOutcome::Unchanged);
            }
        };

        let version = current.version() + 1;
        let next = Arc::new(current.apply(
            &changes,
            version,
            candidate.contributing_sources().to_vec(),
        ));
        self.current.store(Arc::clone(&next));

        tracing::info!(
            action = "reloaded",
            trigger,
            version,
            changes = changes.len(),
            "configuration reloaded"
        );
        transaction::notify(&registrations, &changes, &next);
        Ok(ReloadOutcome::Applied { version, changes })
    }
}

impl std::fmt::Debug for ReloadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadScheduler")
            .field("declaration", &self.pipeline.declaration.name())
            .field("version", &self.current.load().version())
            .field("settings", &self.settings)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
