//! `${...}` expansion for values, keys and locator templates

use crate::core::{ConfigError, ConfigResult, Properties, Substitutor};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Maximum number of nested property lookups in one expansion
pub const MAX_EXPANSION_DEPTH: usize = 32;

/// Longest string one expansion may produce, in bytes
pub const MAX_EXPANDED_LEN: usize = 1 << 20;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(.+?)\}").expect("placeholder pattern is valid"));

/// Named substitutors of one declaration, fixed after construction
#[derive(Clone, Default)]
pub struct SubstitutorRegistry {
    entries: IndexMap<String, Arc<dyn Substitutor>>,
}

impl SubstitutorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry, rejecting invalid or duplicate names
    pub fn from_entries<I>(entries: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (String, Arc<dyn Substitutor>)>,
    {
        let mut map = IndexMap::new();
        for (name, substitutor) in entries {
            if name.is_empty()
                || name
                    .chars()
                    .any(|c| c.is_whitespace() || matches!(c, ':' | '{' | '}'))
            {
                return Err(ConfigError::definition(format!(
                    "invalid substitutor name '{name}'"
                )));
            }
            if map.insert(name.clone(), substitutor).is_some() {
                return Err(ConfigError::definition(format!(
                    "substitutor '{name}' registered twice"
                )));
            }
        }
        Ok(Self { entries: map })
    }

    /// Substitutor registered under `name`
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Substitutor>> {
        self.entries.get(name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of substitutors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether no substitutor is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for SubstitutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

/// Resolves placeholders against an ordered chain of lookup layers
///
/// `${name}` is looked up layer by layer and resolves to the empty string
/// when no layer defines it. Looked-up values are expanded again; a key that
/// is already being expanded higher up the stack resolves to the empty
/// string. Within one call every key is expanded at most once and the
/// result is cut at [`MAX_EXPANDED_LEN`] bytes. `${name:arg}` calls the
/// substitutor `name` when one is registered and uses its result verbatim,
/// otherwise `name:arg` is an ordinary key.
#[derive(Debug, Clone)]
pub struct VariableExpander<'a> {
    layers: Vec<&'a Properties>,
    substitutors: Option<&'a SubstitutorRegistry>,
}

impl<'a> VariableExpander<'a> {
    /// Expander with no layers and no substitutors
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            substitutors: None,
        }
    }

    /// Append a lookup layer with lower priority than the existing ones
    #[must_use = "builder methods must be chained or built"]
    pub fn layer(mut self, layer: &'a Properties) -> Self {
        self.layers.push(layer);
        self
    }

    /// Use the given substitutors for `${name:arg}`
    #[must_use = "builder methods must be chained or built"]
    pub fn substitutors(mut self, registry: &'a SubstitutorRegistry) -> Self {
        self.substitutors = Some(registry);
        self
    }

    /// Expand every placeholder in `value`
    pub fn expand(&self, value: &str) -> String {
        self.expand_inner(value, &mut Expansion::default())
    }

    /// Expand a key template, consulting `args` before the regular layers
    pub fn expand_key(&self, template: &str, args: Option<&Properties>) -> String {
        match args {
            Some(args) if !args.is_empty() => {
                let mut layers = Vec::with_capacity(self.layers.len() + 1);
                layers.push(args);
                layers.extend(self.layers.iter().copied());
                VariableExpander {
                    layers,
                    substitutors: self.substitutors,
                }
                .expand(template)
            }
            _ => self.expand(template),
        }
    }

    /// First layer defining `key`
    pub fn lookup(&self, key: &str) -> Option<&'a str> {
        self.layers
            .iter()
            .find_map(|layer| layer.get(key))
            .map(String::as_str)
    }

    fn expand_inner(&self, value: &str, state: &mut Expansion) -> String {
        if !value.contains("${") {
            return value.to_string();
        }

        let mut out = String::with_capacity(value.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(value) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&value[last..whole.start()]);
            out.push_str(&self.resolve(inner.as_str(), state));
            last = whole.end();
            if state.overflow(&mut out) {
                return out;
            }
        }
        out.push_str(&value[last..]);
        state.overflow(&mut out);
        out
    }

    fn resolve(&self, inner: &str, state: &mut Expansion) -> String {
        if state.overflowed {
            return String::new();
        }
        if let Some((name, arg)) = inner.split_once(':')
            && let Some(substitutor) = self.substitutors.and_then(|r| r.get(name))
        {
            tracing::trace!(substitutor = name, argument = arg, "invoking substitutor");
            return substitutor.replace(arg);
        }
        if let Some(done) = state.done.get(inner) {
            return done.clone();
        }

        if state.visiting.iter().any(|k| k == inner) {
            tracing::warn!(
                key = inner,
                chain = %state.visiting.join(" -> "),
                "cyclic property reference, resolving to empty string"
            );
            state.cuts += 1;
            return String::new();
        }
        if state.visiting.len() >= MAX_EXPANSION_DEPTH {
            tracing::warn!(
                key = inner,
                depth = state.visiting.len(),
                "expansion depth exceeded, resolving to empty string"
            );
            state.cuts += 1;
            return String::new();
        }

        let Some(raw) = self.lookup(inner) else {
            tracing::trace!(key = inner, "unresolved placeholder");
            return String::new();
        };

        let cuts = state.cuts;
        state.visiting.push(inner.to_string());
        let expanded = self.expand_inner(raw, state);
        state.visiting.pop();
        // A value cut short depends on the path that reached it
        if state.cuts == cuts {
            state.done.insert(inner.to_string(), expanded.clone());
        }
        expanded
    }
}

/// Bookkeeping for one top-level expansion
#[derive(Default)]
struct Expansion {
    visiting: Vec<String>,
    done: HashMap<String, String>,
    cuts: usize,
    overflowed: bool,
}

impl Expansion {
    /// Cut `out` at the length limit; true once the limit has been hit
    fn overflow(&mut self, out: &mut String) -> bool {
        if out.len() <= MAX_EXPANDED_LEN {
            return self.overflowed;
        }
        let mut end = MAX_EXPANDED_LEN;
        while !out.is_char_boundary(end) {
            end -= 1;
        }
        out.truncate(end);
        if !self.overflowed {
            tracing::warn!(limit = MAX_EXPANDED_LEN, "expanded value too long, truncating");
        }
        self.overflowed = true;
        self.cuts += 1;
        true
    }
}

impl Default for VariableExpander<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Inputs for turning an accessor's key template into a concrete key
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyTemplate<'t> {
    pub key: &'t str,
    pub prefix: Option<&'t str>,
    pub expand: bool,
    pub apply_prefix: bool,
}

impl KeyTemplate<'_> {
    /// Concrete key: expanded template, with the expanded prefix in front
    pub(crate) fn resolve(
        &self,
        expander: &VariableExpander<'_>,
        args: Option<&Properties>,
    ) -> String {
        let key = if self.expand {
            expander.expand_key(self.key, args)
        } else {
            self.key.to_string()
        };

        match self.prefix {
            Some(prefix) if self.apply_prefix => {
                let prefix = if self.expand {
                    expander.expand_key(prefix, args)
                } else {
                    prefix.to_string()
                };
                format!("{prefix}{key}")
            }
            _ => key,
        }
    }
}
