//! Property-editor fallback for types without built-in rules

use super::{ConversionContext, FromProperty};
use crate::core::{BoxError, ConfigError, ConfigResult};
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

type EditFn = Arc<dyn Fn(&str) -> Result<Box<dyn Any + Send>, BoxError> + Send + Sync>;

/// Text-to-value editors keyed by target type
#[derive(Clone, Default)]
pub struct EditorRegistry {
    editors: HashMap<TypeId, (&'static str, EditFn)>,
}

impl EditorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the editor for `T`, replacing any previous one
    pub fn register<T, F>(&mut self, editor: F)
    where
        T: Send + 'static,
        F: Fn(&str) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let erased: EditFn = Arc::new(move |raw: &str| {
            editor(raw).map(|value| Box::new(value) as Box<dyn Any + Send>)
        });
        self.editors
            .insert(TypeId::of::<T>(), (type_name::<T>(), erased));
    }

    /// Check whether an editor for `T` exists
    pub fn contains<T: 'static>(&self) -> bool {
        self.editors.contains_key(&TypeId::of::<T>())
    }

    /// Edit `raw` into a `T`; `None` when no editor is registered
    pub fn edit<T: 'static>(&self, raw: &str) -> Option<Result<T, BoxError>> {
        let (_, editor) = self.editors.get(&TypeId::of::<T>())?;
        Some(editor(raw).and_then(|value| {
            value
                .downcast::<T>()
                .map(|boxed| *boxed)
                .map_err(|_| BoxError::from("editor produced the wrong type"))
        }))
    }

    /// Number of registered editors
    pub fn len(&self) -> usize {
        self.editors.len()
    }

    /// Check whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.editors.is_empty()
    }
}

impl std::fmt::Debug for EditorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.editors.values().map(|(name, _)| name))
            .finish()
    }
}

/// Target converted through a registered property editor
///
/// Read an accessor as `Edited<T>` for a `T` without built-in rules. A
/// converter declared on the accessor still takes precedence. Fails when
/// the editor fallback is disabled for the declaration or no editor for
/// `T` is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edited<T>(pub T);

impl<T> Edited<T> {
    /// Unwrap the value
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Edited<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Send + 'static> FromProperty for Edited<T> {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        if let Some(custom) = cx.convert_custom::<T>(raw) {
            return custom.map(Edited);
        }
        if cx.editors().is_none() {
            return Err(ConfigError::unsupported_conversion(
                cx.key(),
                type_name::<T>(),
                "property editors are disabled",
            ));
        }
        match cx.edit::<T>(raw) {
            Some(result) => result.map(Edited),
            None => Err(ConfigError::unsupported_conversion(
                cx.key(),
                type_name::<T>(),
                "no property editor registered",
            )),
        }
    }
}

/// Target converted through its `FromStr` implementation
///
/// Covers application types that already know how to parse themselves.
/// The value is trimmed first; a declared converter takes precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Parsed<T>(pub T);

impl<T> Parsed<T> {
    /// Unwrap the value
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Parsed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> FromProperty for Parsed<T>
where
    T: FromStr + Send + 'static,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        if let Some(custom) = cx.convert_custom::<T>(raw) {
            return custom.map(Parsed);
        }
        raw.trim()
            .parse::<T>()
            .map(Parsed)
            .map_err(|e| ConfigError::conversion_caused_by(cx.key(), type_name::<T>(), e))
    }
}
