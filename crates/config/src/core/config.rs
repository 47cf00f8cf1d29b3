//! Main configuration container

use super::{
    ConfigError, ConfigResult, Declaration, Environment, Locator, Properties,
    PropertyChangeListener, PropertyDef, PropertyLoader, ReloadListener, ReloadMode, Snapshot,
    TransactionalListener,
};
use crate::convert::{ConversionContext, FromProperty};
use crate::loaders::LoaderChain;
use crate::reload::{ListenerId, Pipeline, Registration, ReloadOutcome, ReloadScheduler};
use crate::resolve::{KeyTemplate, VariableExpander};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Live, typed view over a declaration's resolved properties
///
/// Reads go through the current snapshot. In `SYNC` hot-reload mode a read
/// may first trigger a reload; in `ASYNC` mode a background task reloads on
/// the declared interval until the config is dropped or
/// [`stop_reloading`](Self::stop_reloading) is called.
pub struct Config {
    /// Snapshot owner and reload machinery
    scheduler: Arc<ReloadScheduler>,

    /// Cancellation token for background tasks (timer reload)
    cancel_token: CancellationToken,
}

impl Config {
    /// Start building a config for `declaration`
    pub fn builder(declaration: Declaration) -> ConfigBuilder {
        ConfigBuilder::new(declaration)
    }

    /// Declaration this config was built from
    pub fn declaration(&self) -> &Declaration {
        self.scheduler.declaration()
    }

    /// Read accessor `name`
    pub async fn get<T: FromProperty>(&self, name: &str) -> ConfigResult<T> {
        self.scheduler.on_access().await;
        self.view().get(name)
    }

    /// Read accessor `name`, resolving its key template against `args` first
    pub async fn get_with<T: FromProperty>(
        &self,
        name: &str,
        args: &Properties,
    ) -> ConfigResult<T> {
        self.scheduler.on_access().await;
        self.view().get_with(name, args)
    }

    /// Read accessor `name`, falling back to `default` on any error
    pub async fn get_or<T: FromProperty>(&self, name: &str, default: T) -> T {
        self.get(name).await.unwrap_or(default)
    }

    /// Read an undeclared key, with an optional textual default
    pub async fn resolve<T: FromProperty>(
        &self,
        key: &str,
        default: Option<&str>,
    ) -> ConfigResult<T> {
        self.scheduler.on_access().await;
        self.view().resolve(key, default)
    }

    /// View pinned to the current snapshot
    ///
    /// Reads through a view never trigger a reload and stay consistent with
    /// each other even while reloads are published.
    pub fn view(&self) -> ConfigView<'_> {
        ConfigView {
            config: self,
            snapshot: self.scheduler.snapshot(),
        }
    }

    /// Currently published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.scheduler.snapshot()
    }

    /// Raw (un-expanded) value of a key
    pub fn property(&self, key: &str) -> Option<String> {
        self.scheduler.snapshot().get(key).map(str::to_string)
    }

    /// Every key in the current snapshot
    pub fn property_names(&self) -> Vec<String> {
        self.scheduler.snapshot().keys().map(str::to_string).collect()
    }

    /// Copy of the current snapshot with every value expanded
    pub fn to_map(&self) -> Properties {
        self.view().to_map()
    }

    /// Sources that contributed to the current snapshot
    pub fn contributing_sources(&self) -> Vec<Locator> {
        self.scheduler.snapshot().contributing_sources().to_vec()
    }

    /// Version of the current snapshot; the initial load is version 1
    pub fn version(&self) -> u64 {
        self.scheduler.snapshot().version()
    }

    /// Hot-reload mode, `None` when reloading is disabled
    pub fn reload_mode(&self) -> Option<ReloadMode> {
        self.scheduler.mode()
    }

    /// Re-resolve every source and publish the result
    ///
    /// Waits for a running reload first. Resolution errors are returned and
    /// leave the current snapshot in place. A panicking listener panics this
    /// call; the background timer instead logs the panic and keeps running.
    pub async fn reload(&self) -> ConfigResult<ReloadOutcome> {
        self.scheduler.reload().await
    }

    /// Observe applied changes
    pub fn add_change_listener(&self, listener: Arc<dyn PropertyChangeListener>) -> ListenerId {
        self.scheduler.listeners().add(Registration::Change(listener))
    }

    /// Observe and possibly veto changes before they are published
    pub fn add_transactional_listener(
        &self,
        listener: Arc<dyn TransactionalListener>,
    ) -> ListenerId {
        self.scheduler
            .listeners()
            .add(Registration::Transactional(listener))
    }

    /// Observe completed reloads
    pub fn add_reload_listener(&self, listener: Arc<dyn ReloadListener>) -> ListenerId {
        self.scheduler.listeners().add(Registration::Reload(listener))
    }

    /// Remove a listener; returns `false` if it was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.scheduler.listeners().remove(id)
    }

    /// Stop the background reload task, if any
    ///
    /// A reload already in flight completes. Explicit [`reload`](Self::reload)
    /// keeps working.
    pub fn stop_reloading(&self) {
        if !self.cancel_token.is_cancelled() {
            tracing::debug!(declaration = self.declaration().name(), "stopping reload timer");
            self.cancel_token.cancel();
        }
    }

    /// Check whether a background reload task is active
    pub fn is_reloading(&self) -> bool {
        self.scheduler.mode() == Some(ReloadMode::Async) && !self.cancel_token.is_cancelled()
    }
}

impl Drop for Config {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("scheduler", &self.scheduler)
            .field("reloading", &self.is_reloading())
            .finish()
    }
}

/// Reads against one fixed snapshot
#[derive(Clone)]
pub struct ConfigView<'a> {
    config: &'a Config,
    snapshot: Arc<Snapshot>,
}

impl ConfigView<'_> {
    /// Snapshot this view reads from
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    /// Read accessor `name`
    pub fn get<T: FromProperty>(&self, name: &str) -> ConfigResult<T> {
        self.read(self.definition(name)?, None)
    }

    /// Read accessor `name`, resolving its key template against `args` first
    pub fn get_with<T: FromProperty>(&self, name: &str, args: &Properties) -> ConfigResult<T> {
        self.read(self.definition(name)?, Some(args))
    }

    /// Read an undeclared key, with an optional textual default
    ///
    /// The declaration prefix is not applied.
    pub fn resolve<T: FromProperty>(&self, key: &str, default: Option<&str>) -> ConfigResult<T> {
        let mut def = PropertyDef::new(key).apply_prefix(false);
        if let Some(default) = default {
            def = def.default_value(default);
        }
        self.read(&def, None)
    }

    /// Raw (un-expanded) value of a key
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.snapshot.get(key)
    }

    /// Expanded value of a key
    pub fn expanded(&self, key: &str) -> Option<String> {
        let raw = self.snapshot.get(key)?;
        if self.config.declaration().features().expand_variables {
            Some(self.expander().expand(raw))
        } else {
            Some(raw.to_string())
        }
    }

    /// Copy of the snapshot with every value expanded
    pub fn to_map(&self) -> Properties {
        let expand = self.config.declaration().features().expand_variables;
        let expander = self.expander();
        self.snapshot
            .properties()
            .iter()
            .map(|(key, raw)| {
                let value = if expand { expander.expand(raw) } else { raw.clone() };
                (key.clone(), value)
            })
            .collect()
    }

    fn definition(&self, name: &str) -> ConfigResult<&PropertyDef> {
        let declaration = self.config.declaration();
        declaration
            .property(name)
            .ok_or_else(|| ConfigError::unknown_property(name))
    }

    fn expander(&self) -> VariableExpander<'_> {
        VariableExpander::new()
            .layer(self.config.scheduler.imports())
            .layer(self.snapshot.properties())
            .substitutors(self.config.declaration().substitutors())
    }

    fn read<T: FromProperty>(
        &self,
        def: &PropertyDef,
        args: Option<&Properties>,
    ) -> ConfigResult<T> {
        let declaration = self.config.declaration();
        let features = declaration.features();
        let expand = def.expands_variables(features);
        let expander = self.expander();

        let key = KeyTemplate {
            key: def.key_template(),
            prefix: declaration.prefix(),
            expand,
            apply_prefix: def.applies_prefix(features),
        }
        .resolve(&expander, args);

        let editors = features.property_editors.then(|| declaration.editors());
        let cx = ConversionContext::for_property(&key, def, editors);

        match self.snapshot.get(&key).or(def.default()) {
            Some(raw) if expand => T::from_property(&expander.expand(raw), &cx),
            Some(raw) => T::from_property(raw, &cx),
            None => T::from_absent(&cx),
        }
    }
}

impl std::fmt::Debug for ConfigView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigView")
            .field("declaration", &self.config.declaration().name())
            .field("version", &self.snapshot.version())
            .finish()
    }
}

/// Builder for [`Config`]
///
/// Custom loaders are consulted before the built-in ones (file, resource,
/// env, system), in the order they were added.
pub struct ConfigBuilder {
    declaration: Declaration,
    loaders: Vec<Arc<dyn PropertyLoader>>,
    default_loaders: bool,
    imports: Vec<Properties>,
    import_error: Option<ConfigError>,
    resource_roots: Vec<PathBuf>,
    environment: Option<Environment>,
}

impl ConfigBuilder {
    /// Create a builder for `declaration`
    pub fn new(declaration: Declaration) -> Self {
        Self {
            declaration,
            loaders: Vec::new(),
            default_loaders: true,
            imports: Vec::new(),
            import_error: None,
            resource_roots: Vec::new(),
            environment: None,
        }
    }

    /// Add a loader
    #[must_use = "builder methods must be chained or built"]
    pub fn with_loader<L: PropertyLoader + 'static>(mut self, loader: L) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    /// Add a shared loader
    #[must_use = "builder methods must be chained or built"]
    pub fn with_shared_loader(mut self, loader: Arc<dyn PropertyLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Use only the loaders added to this builder
    #[must_use = "builder methods must be chained or built"]
    pub fn without_default_loaders(mut self) -> Self {
        self.default_loaders = false;
        self
    }

    /// Import a map that overrides every source; earlier imports win
    #[must_use = "builder methods must be chained or built"]
    pub fn import<I, K, V>(mut self, map: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.imports
            .push(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Import a JSON object of string values
    ///
    /// Anything else is recorded and reported by [`build`](Self::build).
    #[must_use = "builder methods must be chained or built"]
    pub fn import_value(mut self, value: serde_json::Value) -> Self {
        match import_from_json(value) {
            Ok(map) => self.imports.push(map),
            Err(e) => {
                self.import_error.get_or_insert(e);
            }
        }
        self
    }

    /// Add a root searched for `resource:` locators
    #[must_use = "builder methods must be chained or built"]
    pub fn resource_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.resource_roots.push(root.into());
        self
    }

    /// Resolve against a fixed environment instead of capturing the
    /// process environment on every pass
    #[must_use = "builder methods must be chained or built"]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Resolve, load and publish the first snapshot
    ///
    /// Must be called within a Tokio runtime; `ASYNC` hot reload spawns its
    /// timer task here.
    pub async fn build(self) -> ConfigResult<Config> {
        if let Some(e) = self.import_error {
            return Err(e);
        }

        let mut imports = Properties::new();
        for map in self.imports {
            for (key, value) in map {
                imports.entry(key).or_insert(value);
            }
        }

        let mut loaders = if self.default_loaders {
            LoaderChain::default_loaders()
        } else {
            LoaderChain::new()
        };
        for loader in self.loaders.into_iter().rev() {
            loaders.prepend(loader);
        }

        let pipeline = Pipeline {
            declaration: Arc::new(self.declaration),
            loaders,
            imports: Arc::new(imports),
            resource_roots: self.resource_roots.into(),
            environment: self.environment.map(Arc::new),
        };

        let scheduler = Arc::new(ReloadScheduler::start(pipeline).await?);
        let cancel_token = CancellationToken::new();
        // Detached; the token stops it
        drop(scheduler.spawn_timer(cancel_token.clone()));

        Ok(Config {
            scheduler,
            cancel_token,
        })
    }
}

impl std::fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("declaration", &self.declaration.name())
            .field("loaders", &self.loaders.len())
            .field("default_loaders", &self.default_loaders)
            .field("imports", &self.imports.len())
            .field("resource_roots", &self.resource_roots)
            .finish()
    }
}

fn import_from_json(value: serde_json::Value) -> ConfigResult<Properties> {
    let serde_json::Value::Object(object) = value else {
        return Err(ConfigError::definition("imported value must be a JSON object"));
    };
    object
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => Ok((key, s)),
            serde_json::Value::Null => Err(ConfigError::definition(format!(
                "imported key '{key}' has a null value"
            ))),
            other => Err(ConfigError::definition(format!(
                "imported key '{key}' must be a string, got {other}"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::MemoryLoader;
    use pretty_assertions::assert_eq;

    fn declaration() -> Declaration {
        Declaration::builder("Server")
            .source("mem:server")
            .prefix("server.")
            .property(PropertyDef::new("port").default_value("80"))
            .property(PropertyDef::new("host"))
            .property(PropertyDef::new("url").key("url").apply_prefix(false))
            .property(PropertyDef::new("endpoint").key("endpoint.${region}"))
            .build()
            .unwrap()
    }

    async fn config(memory: &MemoryLoader) -> Config {
        Config::builder(declaration())
            .without_default_loaders()
            .with_loader(memory.clone())
            .environment(Environment::empty())
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_accessors_apply_prefix_and_defaults() {
        let memory = MemoryLoader::new();
        memory.set("server", "server.host", "example.org");
        memory.set("server", "url", "http://${server.host}:${server.port}/");
        let config = config(&memory).await;

        assert_eq!(config.get::<u16>("port").await.unwrap(), 80);
        assert_eq!(config.get::<String>("host").await.unwrap(), "example.org");
        assert_eq!(
            config.get::<String>("url").await.unwrap(),
            "http://example.org:80/"
        );
        assert_eq!(config.version(), 1);
        assert_eq!(config.reload_mode(), None);
        assert!(!config.is_reloading());
    }

    #[tokio::test]
    async fn test_missing_and_unknown() {
        let memory = MemoryLoader::new();
        memory.insert("server", Properties::new());
        let config = config(&memory).await;

        let err = config.get::<String>("host").await.unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
        assert_eq!(config.get::<Option<String>>("host").await.unwrap(), None);

        let err = config.get::<String>("nope").await.unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProperty { .. }));
        assert_eq!(config.get_or("nope", 7u8).await, 7);
    }

    #[tokio::test]
    async fn test_key_arguments() {
        let memory = MemoryLoader::new();
        memory.set("server", "server.endpoint.eu", "https://eu.example.org");
        memory.set("server", "region", "us");
        let config = config(&memory).await;

        let args: Properties = [("region".to_string(), "eu".to_string())].into();
        let endpoint: url::Url = config.get_with("endpoint", &args).await.unwrap();
        assert_eq!(endpoint.host_str(), Some("eu.example.org"));

        let err = config.get::<String>("endpoint").await.unwrap_err();
        assert!(err.to_string().contains("server.endpoint.us"));
    }

    #[tokio::test]
    async fn test_imports_override_sources() {
        let memory = MemoryLoader::new();
        memory.set("server", "server.host", "from-source");
        let config = Config::builder(declaration())
            .without_default_loaders()
            .with_loader(memory.clone())
            .environment(Environment::empty())
            .import([("server.host", "first")])
            .import([("server.host", "second"), ("server.port", "81")])
            .build()
            .await
            .unwrap();

        assert_eq!(config.get::<String>("host").await.unwrap(), "first");
        assert_eq!(config.get::<u16>("port").await.unwrap(), 81);
    }

    #[tokio::test]
    async fn test_import_value_rejects_non_strings() {
        let err = Config::builder(declaration())
            .without_default_loaders()
            .import_value(serde_json::json!({ "a": "1", "b": null }))
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Definition { .. }));

        let map = import_from_json(serde_json::json!({ "a": "1" })).unwrap();
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
        assert!(import_from_json(serde_json::json!(["a"])).is_err());
    }

    #[tokio::test]
    async fn test_view_is_pinned() {
        let memory = MemoryLoader::new();
        memory.set("server", "server.host", "a");
        let config = config(&memory).await;
        let view = config.view();

        memory.set("server", "server.host", "b");
        assert!(config.reload().await.unwrap().is_applied());

        assert_eq!(view.get::<String>("host").unwrap(), "a");
        assert_eq!(config.get::<String>("host").await.unwrap(), "b");
        assert_eq!(view.raw("server.port"), Some("80"));
        assert_eq!(config.version(), 2);
    }

    #[tokio::test]
    async fn test_resolve_and_to_map() {
        let memory = MemoryLoader::new();
        memory.set("server", "a", "${b}-x");
        memory.set("server", "b", "y");
        let config = config(&memory).await;

        assert_eq!(config.resolve::<String>("a", None).await.unwrap(), "y-x");
        assert_eq!(config.resolve::<u8>("missing", Some("3")).await.unwrap(), 3);
        assert_eq!(config.property("a").as_deref(), Some("${b}-x"));
        assert_eq!(config.to_map().get("a").map(String::as_str), Some("y-x"));
        assert_eq!(config.view().expanded("a").as_deref(), Some("y-x"));
        assert!(config.property_names().contains(&"server.port".to_string()));
        assert_eq!(config.contributing_sources().len(), 1);
    }
}
