//! Hot reload: atomic publication, vetoes, listeners and triggers

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use strata_config::prelude::*;
use strata_config::{ChangeKind, ChangeSet, LoadContext, Locator, MemoryLoader, ReloadEvent};
use tempfile::TempDir;

fn declaration(sources: &[&str], hot_reload: Option<HotReload>) -> Declaration {
    Declaration::builder("Reloading")
        .sources(sources.iter().copied())
        .policy(LoadPolicy::Merge)
        .with_hot_reload(hot_reload)
        .property(PropertyDef::new("some_value").key("someValue"))
        .property(PropertyDef::new("name").default_value("initial"))
        .build()
        .unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn config(hot_reload: Option<HotReload>, memory: &MemoryLoader) -> Config {
    Config::builder(declaration(&["mem:app"], hot_reload))
        .with_loader(memory.clone())
        .environment(Environment::empty())
        .build()
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_torn_values() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("app.properties");
    std::fs::write(&file, "someValue=10\n").unwrap();

    let config = Arc::new(
        Config::builder(declaration(&["file:${test.dir}/app.properties"], None))
            .environment(
                Environment::empty().with_system_property("test.dir", dir.path().to_string_lossy()),
            )
            .build()
            .await
            .unwrap(),
    );
    assert_eq!(config.get::<i32>("some_value").await.unwrap(), 10);

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..8)
        .map(|_| {
            let config = Arc::clone(&config);
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                let mut seen = Vec::new();
                while !done.load(Ordering::Acquire) {
                    let value = config.get::<i32>("some_value").await.unwrap();
                    assert!(value == 10 || value == 20, "unexpected value {value}");
                    seen.push(value);
                    tokio::task::yield_now().await;
                }
                seen
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(20)).await;
    std::fs::write(&file, "someValue=20\n").unwrap();
    let outcome = config.reload().await.unwrap();
    assert!(outcome.is_applied());
    tokio::time::sleep(Duration::from_millis(20)).await;
    done.store(true, Ordering::Release);

    for reader in readers {
        let seen = reader.await.unwrap();
        let first_twenty = seen.iter().position(|v| *v == 20).unwrap_or(seen.len());
        assert!(seen[first_twenty..].iter().all(|v| *v == 20));
    }
    assert_eq!(config.get::<i32>("some_value").await.unwrap(), 20);
    assert_eq!(config.version(), 2);
}

struct VetoEverything {
    asked: AtomicUsize,
}

impl PropertyChangeListener for VetoEverything {
    fn property_changed(&self, _change: &PropertyChange) {
        panic!("vetoed changes must not be delivered");
    }
}

impl TransactionalListener for VetoEverything {
    fn before_batch(&self, _changes: &ChangeSet) -> Verdict {
        self.asked.fetch_add(1, Ordering::Relaxed);
        Verdict::VetoBatch
    }
}

#[tokio::test]
async fn vetoed_batch_keeps_previous_values() {
    let memory = MemoryLoader::new();
    memory.set("app", "someValue", "10");
    let config = config(None, &memory).await;

    let veto = Arc::new(VetoEverything {
        asked: AtomicUsize::new(0),
    });
    let id = config.add_transactional_listener(veto.clone());

    memory.set("app", "someValue", "20");
    memory.set("app", "name", "changed");
    assert_eq!(config.reload().await.unwrap(), ReloadOutcome::Vetoed);
    assert_eq!(veto.asked.load(Ordering::Relaxed), 1);
    assert_eq!(config.get::<i32>("some_value").await.unwrap(), 10);
    assert_eq!(config.get::<String>("name").await.unwrap(), "initial");
    assert_eq!(config.version(), 1);

    assert!(config.remove_listener(id));
    assert!(config.reload().await.unwrap().is_applied());
    assert_eq!(config.get::<i32>("some_value").await.unwrap(), 20);
}

#[derive(Default)]
struct Recorder {
    changes: Mutex<Vec<(String, ChangeKind)>>,
    versions: Mutex<Vec<u64>>,
}

impl PropertyChangeListener for Recorder {
    fn property_changed(&self, change: &PropertyChange) {
        self.changes.lock().push((change.key.clone(), change.kind()));
    }
}

impl TransactionalListener for Recorder {
    fn before_property_change(&self, change: &PropertyChange) -> Verdict {
        if change.key == "someValue" {
            Verdict::VetoKey
        } else {
            Verdict::Accept
        }
    }
}

impl ReloadListener for Recorder {
    fn reload_performed(&self, event: &ReloadEvent) {
        self.versions.lock().push(event.snapshot.version());
    }
}

#[tokio::test]
async fn key_veto_and_notifications() {
    init_tracing();
    let memory = MemoryLoader::new();
    memory.set("app", "someValue", "10");
    memory.set("app", "gone", "x");
    let config = config(None, &memory).await;

    let recorder = Arc::new(Recorder::default());
    config.add_transactional_listener(recorder.clone());
    config.add_reload_listener(recorder.clone());

    memory.set("app", "someValue", "20");
    memory.set("app", "name", "changed");
    memory.set("app", "fresh", "y");
    memory.unset("app", "gone");

    let outcome = config.reload().await.unwrap();
    let ReloadOutcome::Applied { version, changes } = outcome else {
        panic!("expected applied, got {outcome:?}");
    };
    assert_eq!(version, 2);
    assert_eq!(changes.len(), 3);
    assert!(changes.get("someValue").is_none());

    assert_eq!(
        *recorder.changes.lock(),
        vec![
            ("fresh".to_string(), ChangeKind::Added),
            ("gone".to_string(), ChangeKind::Removed),
            ("name".to_string(), ChangeKind::Modified),
        ]
    );
    assert_eq!(*recorder.versions.lock(), vec![2]);
    assert_eq!(config.get::<i32>("some_value").await.unwrap(), 10);
    assert_eq!(config.get::<String>("name").await.unwrap(), "changed");
}

#[tokio::test]
async fn unchanged_sources_publish_nothing() {
    let memory = MemoryLoader::new();
    memory.set("app", "someValue", "10");
    let config = config(None, &memory).await;

    assert_eq!(config.reload().await.unwrap(), ReloadOutcome::Unchanged);
    assert_eq!(config.version(), 1);
}

#[tokio::test]
async fn concurrent_explicit_reloads_are_single_flight() {
    let memory = MemoryLoader::new();
    memory.set("app", "someValue", "10");
    let config = Arc::new(config(None, &memory).await);

    memory.set("app", "someValue", "20");
    let outcomes = futures::future::join_all((0..5).map(|_| {
        let config = Arc::clone(&config);
        async move { config.reload().await.unwrap() }
    }))
    .await;

    let applied = outcomes.iter().filter(|o| o.is_applied()).count();
    assert_eq!(applied, 1);
    assert!(outcomes.iter().all(|o| {
        o.is_applied() || matches!(o, ReloadOutcome::Unchanged | ReloadOutcome::Coalesced)
    }));
    assert_eq!(config.version(), 2);
}

#[tokio::test(start_paused = true)]
async fn async_mode_reloads_in_background() {
    let memory = MemoryLoader::new();
    memory.set("app", "someValue", "10");
    let hot_reload = HotReload::new(ReloadMode::Async, Duration::from_millis(200));
    let config = config(Some(hot_reload), &memory).await;
    assert!(config.is_reloading());

    memory.set("app", "someValue", "20");
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(config.view().get::<i32>("some_value").unwrap(), 20);

    config.stop_reloading();
    assert!(!config.is_reloading());
    memory.set("app", "someValue", "30");
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(config.view().get::<i32>("some_value").unwrap(), 20);

    assert!(config.reload().await.unwrap().is_applied());
    assert_eq!(config.view().get::<i32>("some_value").unwrap(), 30);
}

#[tokio::test(start_paused = true)]
async fn sync_mode_reloads_on_read_after_interval() {
    let memory = MemoryLoader::new();
    memory.set("app", "someValue", "10");
    let hot_reload = HotReload::new(ReloadMode::Sync, Duration::from_secs(5));
    let config = config(Some(hot_reload), &memory).await;
    assert_eq!(config.reload_mode(), Some(ReloadMode::Sync));
    assert!(!config.is_reloading());

    memory.set("app", "someValue", "20");
    assert_eq!(config.get::<i32>("some_value").await.unwrap(), 10);

    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(config.view().get::<i32>("some_value").unwrap(), 10);
    assert_eq!(config.get::<i32>("some_value").await.unwrap(), 20);
}

struct CountingLoader {
    inner: MemoryLoader,
    loads: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl PropertyLoader for CountingLoader {
    fn accept(&self, locator: &Locator) -> bool {
        self.inner.accept(locator)
    }

    async fn load(&self, locator: &Locator, cx: &LoadContext) -> ConfigResult<Properties> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(locator, cx).await
    }
}

#[tokio::test(start_paused = true)]
async fn dropping_config_stops_background_reload() {
    let memory = MemoryLoader::new();
    memory.set("app", "someValue", "10");
    let loads = Arc::new(AtomicUsize::new(0));
    let hot_reload = HotReload::new(ReloadMode::Async, Duration::from_millis(100));
    let config = Config::builder(declaration(&["mem:app"], Some(hot_reload)))
        .without_default_loaders()
        .with_loader(CountingLoader {
            inner: memory.clone(),
            loads: Arc::clone(&loads),
        })
        .environment(Environment::empty())
        .build()
        .await
        .unwrap();
    let recorder = Arc::new(Recorder::default());
    config.add_reload_listener(recorder.clone());

    memory.set("app", "someValue", "20");
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(*recorder.versions.lock(), vec![2]);
    assert!(loads.load(Ordering::SeqCst) >= 2);

    drop(config);
    tokio::task::yield_now().await;
    let after_drop = loads.load(Ordering::SeqCst);
    assert_eq!(Arc::strong_count(&recorder), 1);

    memory.set("app", "someValue", "30");
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(loads.load(Ordering::SeqCst), after_drop);
    assert_eq!(*recorder.versions.lock(), vec![2]);
}
