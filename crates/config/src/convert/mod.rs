//! Conversion of expanded string values into typed results
//!
//! Every accessor read ends in [`FromProperty::from_property`] (value
//! present) or [`FromProperty::from_absent`] (no source and no default).
//! The order of rules is:
//!
//! 1. a converter declared on the accessor, used exclusively;
//! 2. for arrays and collections, tokenization by the declared tokenizer or
//!    separator (default `,`), each trimmed token going through these rules;
//! 3. built-in rules for scalars;
//! 4. the property-editor fallback ([`Edited`]), unless disabled;
//! 5. otherwise an [`ConfigError::UnsupportedConversion`].
//!
//! Nothing is cached: each read converts the current snapshot value again.

mod collection;
mod editor;
mod scalar;

pub use editor::{Edited, EditorRegistry, Parsed};
pub use scalar::parse_duration;

use crate::core::declaration::Plugin;
use crate::core::traits::ErasedConverter;
use crate::core::{ConfigError, ConfigResult, DEFAULT_SEPARATOR, PropertyDef, Tokenizer};
use std::any::{TypeId, type_name};

/// Types an accessor can produce
pub trait FromProperty: Sized + Send + 'static {
    /// Convert a present, already expanded value
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self>;

    /// Value for an absent property; an error unless the type is optional
    fn from_absent(cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        Err(ConfigError::missing(cx.key()))
    }
}

impl<T: FromProperty> FromProperty for Option<T> {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        T::from_property(raw, cx).map(Some)
    }

    fn from_absent(_cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        Ok(None)
    }
}

/// Per-read conversion settings of one accessor
#[derive(Clone, Copy)]
pub struct ConversionContext<'a> {
    key: &'a str,
    separator: &'a str,
    tokenizer: Option<&'a Plugin<dyn Tokenizer>>,
    converter: Option<&'a Plugin<dyn ErasedConverter>>,
    editors: Option<&'a EditorRegistry>,
}

impl<'a> ConversionContext<'a> {
    /// Context with default settings for `key`
    pub fn new(key: &'a str) -> Self {
        Self {
            key,
            separator: DEFAULT_SEPARATOR,
            tokenizer: None,
            converter: None,
            editors: None,
        }
    }

    /// Context carrying an accessor's overrides
    pub(crate) fn for_property(
        key: &'a str,
        def: &'a PropertyDef,
        editors: Option<&'a EditorRegistry>,
    ) -> Self {
        Self {
            key,
            separator: def.separator_or_default(),
            tokenizer: def.tokenizer_plugin(),
            converter: def.converter_plugin(),
            editors,
        }
    }

    /// Use a different separator
    #[must_use = "builder methods must be chained or built"]
    pub fn with_separator(mut self, separator: &'a str) -> Self {
        self.separator = separator;
        self
    }

    /// Enable the property-editor fallback with `editors`
    #[must_use = "builder methods must be chained or built"]
    pub fn with_editors(mut self, editors: &'a EditorRegistry) -> Self {
        self.editors = Some(editors);
        self
    }

    /// Resolved key being converted
    pub fn key(&self) -> &'a str {
        self.key
    }

    /// Collection separator
    pub fn separator(&self) -> &'a str {
        self.separator
    }

    /// Editors, when the fallback is enabled
    pub fn editors(&self) -> Option<&'a EditorRegistry> {
        self.editors
    }

    /// Check whether a custom converter is declared
    pub fn has_converter(&self) -> bool {
        self.converter.is_some()
    }

    /// Split a collection value into trimmed tokens
    ///
    /// A blank value has no tokens.
    pub fn tokens(&self, raw: &str) -> ConfigResult<Vec<String>> {
        if let Some(plugin) = self.tokenizer {
            let tokenizer = plugin.instantiate().map_err(|e| {
                ConfigError::conversion_caused_by(self.key, "tokenizer", e)
            })?;
            return Ok(tokenizer
                .tokenize(raw)
                .into_iter()
                .map(|t| t.trim().to_string())
                .collect());
        }

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(raw
            .split(self.separator)
            .map(|t| t.trim().to_string())
            .collect())
    }

    /// Run the declared converter for a `T` target
    ///
    /// `None` when no converter is declared. A converter producing another
    /// type is an error, since a declared converter is used exclusively.
    pub fn convert_custom<T: 'static>(&self, raw: &str) -> Option<ConfigResult<T>> {
        let plugin = self.converter?;
        Some(self.run_converter(plugin, raw))
    }

    /// Run the declared converter only when it produces exactly `T`
    pub(crate) fn convert_whole<T: 'static>(&self, raw: &str) -> Option<ConfigResult<T>> {
        let plugin = self.converter?;
        let converter = match plugin.instantiate() {
            Ok(converter) => converter,
            Err(e) => {
                return Some(Err(ConfigError::conversion_caused_by(
                    self.key,
                    type_name::<T>(),
                    e,
                )));
            }
        };
        if converter.output_type_id() != TypeId::of::<T>() {
            return None;
        }
        Some(downcast_output(converter.as_ref(), raw, self.key))
    }

    /// Run a registered property editor for `T`, if enabled and registered
    pub fn edit<T: Send + 'static>(&self, raw: &str) -> Option<ConfigResult<T>> {
        let editors = self.editors?;
        let result = editors.edit::<T>(raw)?;
        Some(result.map_err(|e| ConfigError::conversion_caused_by(self.key, type_name::<T>(), e)))
    }

    fn run_converter<T: 'static>(
        &self,
        plugin: &Plugin<dyn ErasedConverter>,
        raw: &str,
    ) -> ConfigResult<T> {
        let converter = plugin
            .instantiate()
            .map_err(|e| ConfigError::conversion_caused_by(self.key, type_name::<T>(), e))?;
        if converter.output_type_id() != TypeId::of::<T>() {
            return Err(ConfigError::unsupported_conversion(
                self.key,
                type_name::<T>(),
                format!("declared converter produces {}", converter.output_type()),
            ));
        }
        downcast_output(converter.as_ref(), raw, self.key)
    }
}

fn downcast_output<T: 'static>(
    converter: &dyn ErasedConverter,
    raw: &str,
    key: &str,
) -> ConfigResult<T> {
    let value = converter
        .convert_any(raw)
        .map_err(|e| ConfigError::conversion_caused_by(key, type_name::<T>(), e))?;
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| {
            ConfigError::unsupported_conversion(key, type_name::<T>(), "converter output mismatch")
        })
}

impl std::fmt::Debug for ConversionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionContext")
            .field("key", &self.key)
            .field("separator", &self.separator)
            .field("has_tokenizer", &self.tokenizer.is_some())
            .field("has_converter", &self.converter.is_some())
            .field("editors", &self.editors.is_some())
            .finish()
    }
}

/// Convert `raw` to `T` with default settings
pub fn convert<T: FromProperty>(key: &str, raw: &str) -> ConfigResult<T> {
    T::from_property(raw, &ConversionContext::new(key))
}
