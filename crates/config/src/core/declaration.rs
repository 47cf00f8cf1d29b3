//! Static description of one configuration type
//!
//! A [`Declaration`] is what a binding layer produces for a typed
//! configuration: where to load from, how to merge, which keys its accessors
//! read and with which defaults and conversion overrides. It is built once
//! with [`DeclarationBuilder`] and never changes afterwards.

use super::traits::ErasedConverter;
use super::{
    BoxError, ConfigError, ConfigResult, ConfigResultExt, Converter, LoadPolicy, SourceSpec,
    Substitutor, Tokenizer,
};
use crate::convert::EditorRegistry;
use crate::resolve::SubstitutorRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default hot-reload check interval
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(5);

/// Default separator for collection values
pub const DEFAULT_SEPARATOR: &str = ",";

/// What triggers a reload check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReloadMode {
    /// Checked when a property is read or reload is called explicitly
    #[default]
    Sync,
    /// Checked by a background task on a fixed interval
    Async,
}

/// Hot-reload settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotReload {
    /// Trigger mode
    #[serde(default)]
    pub mode: ReloadMode,
    /// Interval between checks, in milliseconds
    #[serde(default = "default_interval_ms", rename = "interval_ms")]
    interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    DEFAULT_RELOAD_INTERVAL.as_millis() as u64
}

impl HotReload {
    /// Create hot-reload settings
    pub fn new(mode: ReloadMode, interval: Duration) -> Self {
        Self {
            mode,
            interval_ms: interval.as_millis() as u64,
        }
    }

    /// Interval between checks
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for HotReload {
    fn default() -> Self {
        Self::new(ReloadMode::Sync, DEFAULT_RELOAD_INTERVAL)
    }
}

/// A plugin supplied either as a shared instance or as a factory that is
/// invoked each time the plugin is needed
pub(crate) enum Plugin<T: ?Sized> {
    Shared(Arc<T>),
    Factory(Arc<dyn Fn() -> Result<Arc<T>, BoxError> + Send + Sync>),
}

impl<T: ?Sized> Plugin<T> {
    pub(crate) fn instantiate(&self) -> Result<Arc<T>, BoxError> {
        match self {
            Plugin::Shared(instance) => Ok(Arc::clone(instance)),
            Plugin::Factory(factory) => factory(),
        }
    }
}

impl<T: ?Sized> Clone for Plugin<T> {
    fn clone(&self) -> Self {
        match self {
            Plugin::Shared(instance) => Plugin::Shared(Arc::clone(instance)),
            Plugin::Factory(factory) => Plugin::Factory(Arc::clone(factory)),
        }
    }
}

/// One accessor of a declaration
#[derive(Clone)]
pub struct PropertyDef {
    name: String,
    key: String,
    default: Option<String>,
    separator: Option<String>,
    tokenizer: Option<Plugin<dyn Tokenizer>>,
    converter: Option<Plugin<dyn ErasedConverter>>,
    expand_variables: Option<bool>,
    apply_prefix: Option<bool>,
}

impl PropertyDef {
    /// Accessor whose key equals its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: name.clone(),
            name,
            default: None,
            separator: None,
            tokenizer: None,
            converter: None,
            expand_variables: None,
            apply_prefix: None,
        }
    }

    /// Key template, may contain `${...}`
    #[must_use = "builder methods must be chained or built"]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Default value used when no source defines the key
    #[must_use = "builder methods must be chained or built"]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Separator for collection values
    #[must_use = "builder methods must be chained or built"]
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Custom tokenizer for collection values; takes precedence over the separator
    #[must_use = "builder methods must be chained or built"]
    pub fn tokenizer<T: Tokenizer + 'static>(mut self, tokenizer: T) -> Self {
        self.tokenizer = Some(Plugin::Shared(Arc::new(tokenizer)));
        self
    }

    /// Tokenizer created on every conversion
    #[must_use = "builder methods must be chained or built"]
    pub fn tokenizer_factory<T, F>(mut self, factory: F) -> Self
    where
        T: Tokenizer + 'static,
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.tokenizer = Some(Plugin::Factory(Arc::new(move || {
            factory().map(|t| Arc::new(t) as Arc<dyn Tokenizer>)
        })));
        self
    }

    /// Custom converter; used exclusively for this accessor
    #[must_use = "builder methods must be chained or built"]
    pub fn converter<C: Converter>(mut self, converter: C) -> Self {
        self.converter = Some(Plugin::Shared(Arc::new(converter)));
        self
    }

    /// Converter created on every conversion
    #[must_use = "builder methods must be chained or built"]
    pub fn converter_factory<C, F>(mut self, factory: F) -> Self
    where
        C: Converter,
        F: Fn() -> Result<C, BoxError> + Send + Sync + 'static,
    {
        self.converter = Some(Plugin::Factory(Arc::new(move || {
            factory().map(|c| Arc::new(c) as Arc<dyn ErasedConverter>)
        })));
        self
    }

    /// Override variable expansion for this accessor
    #[must_use = "builder methods must be chained or built"]
    pub fn expand_variables(mut self, enabled: bool) -> Self {
        self.expand_variables = Some(enabled);
        self
    }

    /// Override prefix application for this accessor
    #[must_use = "builder methods must be chained or built"]
    pub fn apply_prefix(mut self, enabled: bool) -> Self {
        self.apply_prefix = Some(enabled);
        self
    }

    /// Accessor name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key template
    pub fn key_template(&self) -> &str {
        &self.key
    }

    /// Declared default
    pub fn default(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Separator, falling back to `,`
    pub fn separator_or_default(&self) -> &str {
        self.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR)
    }

    pub(crate) fn tokenizer_plugin(&self) -> Option<&Plugin<dyn Tokenizer>> {
        self.tokenizer.as_ref()
    }

    pub(crate) fn converter_plugin(&self) -> Option<&Plugin<dyn ErasedConverter>> {
        self.converter.as_ref()
    }

    /// Effective expansion flag; the accessor setting wins
    pub fn expands_variables(&self, features: &Features) -> bool {
        self.expand_variables.unwrap_or(features.expand_variables)
    }

    /// Effective prefix flag; the accessor setting wins
    pub fn applies_prefix(&self, features: &Features) -> bool {
        self.apply_prefix.unwrap_or(features.apply_prefix)
    }
}

impl std::fmt::Debug for PropertyDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyDef")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("default", &self.default)
            .field("separator", &self.separator)
            .field("has_tokenizer", &self.tokenizer.is_some())
            .field("has_converter", &self.converter.is_some())
            .field("expand_variables", &self.expand_variables)
            .field("apply_prefix", &self.apply_prefix)
            .finish()
    }
}

/// Declaration-level feature switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    /// Expand `${...}` in values and keys
    pub expand_variables: bool,
    /// Prepend the declaration prefix to keys
    pub apply_prefix: bool,
    /// Allow the property-editor fallback in type conversion
    pub property_editors: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            expand_variables: true,
            apply_prefix: true,
            property_editors: true,
        }
    }
}

/// Immutable description of a configuration type
pub struct Declaration {
    name: String,
    sources: SourceSpec,
    prefix: Option<String>,
    hot_reload: Option<HotReload>,
    features: Features,
    properties: IndexMap<String, PropertyDef>,
    substitutors: SubstitutorRegistry,
    editors: EditorRegistry,
}

impl Declaration {
    /// Start building a declaration named after the configuration type
    pub fn builder(name: impl Into<String>) -> DeclarationBuilder {
        DeclarationBuilder::new(name)
    }

    /// Fully qualified name of the configuration type
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared sources and policy
    pub fn sources(&self) -> &SourceSpec {
        &self.sources
    }

    /// Merge policy
    pub fn policy(&self) -> LoadPolicy {
        self.sources.policy
    }

    /// Key prefix template
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Hot-reload settings, `None` when disabled
    pub fn hot_reload(&self) -> Option<HotReload> {
        self.hot_reload
    }

    /// Declaration-level features
    pub fn features(&self) -> &Features {
        &self.features
    }

    /// Accessor by name
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.get(name)
    }

    /// All accessors in declaration order
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDef> {
        self.properties.values()
    }

    /// Registered substitutors
    pub fn substitutors(&self) -> &SubstitutorRegistry {
        &self.substitutors
    }

    /// Registered property editors
    pub fn editors(&self) -> &EditorRegistry {
        &self.editors
    }
}

impl std::fmt::Debug for Declaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Declaration")
            .field("name", &self.name)
            .field("sources", &self.sources)
            .field("prefix", &self.prefix)
            .field("hot_reload", &self.hot_reload)
            .field("features", &self.features)
            .field("properties", &self.properties.len())
            .field("substitutors", &self.substitutors.len())
            .finish()
    }
}

/// Builder for [`Declaration`]
pub struct DeclarationBuilder {
    name: String,
    sources: SourceSpec,
    prefix: Option<String>,
    hot_reload: Option<HotReload>,
    features: Features,
    properties: Vec<PropertyDef>,
    substitutors: Vec<(String, Arc<dyn Substitutor>)>,
    editors: EditorRegistry,
}

impl DeclarationBuilder {
    /// Create a builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: SourceSpec::default(),
            prefix: None,
            hot_reload: None,
            features: Features::default(),
            properties: Vec::new(),
            substitutors: Vec::new(),
            editors: EditorRegistry::new(),
        }
    }

    /// Append a locator template
    #[must_use = "builder methods must be chained or built"]
    pub fn source(mut self, template: impl Into<String>) -> Self {
        self.sources.locators.push(template.into());
        self
    }

    /// Append several locator templates
    #[must_use = "builder methods must be chained or built"]
    pub fn sources<I, S>(mut self, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources
            .locators
            .extend(templates.into_iter().map(Into::into));
        self
    }

    /// Set the merge policy
    #[must_use = "builder methods must be chained or built"]
    pub fn policy(mut self, policy: LoadPolicy) -> Self {
        self.sources.policy = policy;
        self
    }

    /// Replace locators and policy with a deserialized spec
    #[must_use = "builder methods must be chained or built"]
    pub fn with_spec(mut self, spec: SourceSpec) -> Self {
        self.sources = spec;
        self
    }

    /// Set the key prefix template
    #[must_use = "builder methods must be chained or built"]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Enable hot reload
    #[must_use = "builder methods must be chained or built"]
    pub fn hot_reload(mut self, mode: ReloadMode, interval: Duration) -> Self {
        self.hot_reload = Some(HotReload::new(mode, interval));
        self
    }

    /// Set hot-reload settings, `None` disables
    #[must_use = "builder methods must be chained or built"]
    pub fn with_hot_reload(mut self, settings: Option<HotReload>) -> Self {
        self.hot_reload = settings;
        self
    }

    /// Toggle variable expansion for the whole declaration
    #[must_use = "builder methods must be chained or built"]
    pub fn expand_variables(mut self, enabled: bool) -> Self {
        self.features.expand_variables = enabled;
        self
    }

    /// Toggle prefix application for the whole declaration
    #[must_use = "builder methods must be chained or built"]
    pub fn apply_prefix(mut self, enabled: bool) -> Self {
        self.features.apply_prefix = enabled;
        self
    }

    /// Toggle the property-editor conversion fallback
    #[must_use = "builder methods must be chained or built"]
    pub fn property_editors(mut self, enabled: bool) -> Self {
        self.features.property_editors = enabled;
        self
    }

    /// Declare an accessor
    #[must_use = "builder methods must be chained or built"]
    pub fn property(mut self, def: PropertyDef) -> Self {
        self.properties.push(def);
        self
    }

    /// Register a named substitutor; the instance is shared for the
    /// declaration's whole lifetime
    #[must_use = "builder methods must be chained or built"]
    pub fn substitutor<S: Substitutor + 'static>(
        mut self,
        name: impl Into<String>,
        substitutor: S,
    ) -> Self {
        self.substitutors.push((name.into(), Arc::new(substitutor)));
        self
    }

    /// Register a property editor for `T`
    #[must_use = "builder methods must be chained or built"]
    pub fn editor<T, F>(mut self, editor: F) -> Self
    where
        T: Send + 'static,
        F: Fn(&str) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.editors.register(editor);
        self
    }

    /// Validate and build the declaration
    pub fn build(self) -> ConfigResult<Declaration> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::definition("declaration name must not be empty"));
        }

        if let Some(hot_reload) = &self.hot_reload
            && hot_reload.interval().is_zero()
        {
            return Err(ConfigError::definition(
                "hot reload interval must be greater than zero",
            ));
        }

        let mut properties = IndexMap::with_capacity(self.properties.len());
        for def in self.properties {
            if def.name.trim().is_empty() {
                return Err(ConfigError::definition("accessor name must not be empty"));
            }
            if def.key.trim().is_empty() {
                return Err(ConfigError::definition(format!(
                    "accessor '{}' has an empty key",
                    def.name
                )));
            }
            if def.separator.as_deref() == Some("") {
                return Err(ConfigError::definition(format!(
                    "accessor '{}' has an empty separator",
                    def.name
                )));
            }
            if properties.contains_key(&def.name) {
                return Err(ConfigError::definition(format!(
                    "accessor '{}' declared twice",
                    def.name
                )));
            }
            properties.insert(def.name.clone(), def);
        }

        let name = &self.name;
        let substitutors = SubstitutorRegistry::from_entries(self.substitutors)
            .with_context(|| format!("declaration '{name}'"))?;

        Ok(Declaration {
            name: self.name,
            sources: self.sources,
            prefix: self.prefix,
            hot_reload: self.hot_reload,
            features: self.features,
            properties,
            substitutors,
            editors: self.editors,
        })
    }
}

impl std::fmt::Debug for DeclarationBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeclarationBuilder")
            .field("name", &self.name)
            .field("sources", &self.sources.locators.len())
            .field("policy", &self.sources.policy)
            .field("has_prefix", &self.prefix.is_some())
            .field("hot_reload", &self.hot_reload)
            .field("properties", &self.properties.len())
            .field("substitutors", &self.substitutors.len())
            .finish()
    }
}
