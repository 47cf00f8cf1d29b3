//! Expansion of locator templates into concrete, ordered locators

use super::{SubstitutorRegistry, VariableExpander};
use crate::core::{ConfigResult, Declaration, Environment, Locator, Properties};

const CLASSPATH_PREFIX: &str = "classpath:";
const RESOURCE_PREFIX: &str = "resource:";
const FILE_PREFIX: &str = "file:";

/// Turns the declared locator templates into locators for one pass
///
/// Templates are expanded against imported overrides, then system
/// properties, then environment variables, all taken from the captured
/// [`Environment`]. A leading `~` is replaced by the captured home directory
/// and `classpath:` locators become `resource:` locators.
#[derive(Debug, Clone, Copy)]
pub struct SourceResolver<'a> {
    env: &'a Environment,
    imports: &'a Properties,
    substitutors: Option<&'a SubstitutorRegistry>,
}

impl<'a> SourceResolver<'a> {
    /// Create a resolver over a captured environment and imported overrides
    pub fn new(env: &'a Environment, imports: &'a Properties) -> Self {
        Self {
            env,
            imports,
            substitutors: None,
        }
    }

    /// Allow `${name:arg}` substitutors inside locator templates
    #[must_use = "builder methods must be chained or built"]
    pub fn with_substitutors(mut self, substitutors: &'a SubstitutorRegistry) -> Self {
        self.substitutors = Some(substitutors);
        self
    }

    /// Resolve every locator of a declaration, in declaration order
    ///
    /// A declaration without templates gets one default locator derived from
    /// its name. The first malformed locator fails the whole resolution.
    pub fn resolve(&self, declaration: &Declaration) -> ConfigResult<Vec<Locator>> {
        let templates = &declaration.sources().locators;
        if templates.is_empty() {
            let template = default_locator(declaration.name());
            tracing::debug!(
                config = declaration.name(),
                locator = %template,
                "no sources declared, using default locator"
            );
            return Ok(vec![self.resolve_one(&template)?]);
        }

        templates
            .iter()
            .map(|template| self.resolve_one(template))
            .collect()
    }

    /// Resolve a single template
    pub fn resolve_one(&self, template: &str) -> ConfigResult<Locator> {
        let mut expander = VariableExpander::new()
            .layer(self.imports)
            .layer(self.env.system_properties())
            .layer(self.env.vars());
        if let Some(substitutors) = self.substitutors {
            expander = expander.substitutors(substitutors);
        }

        let expanded = expander.expand(template);
        let expanded = self.expand_home(expanded.trim());
        let expanded = map_classpath(&expanded);
        Locator::parse(&expanded)
    }

    fn expand_home(&self, locator: &str) -> String {
        let Some(home) = self.env.home_dir() else {
            return locator.to_string();
        };
        let home = home.trim_end_matches(['/', '\\']);

        let rest = locator.strip_prefix(FILE_PREFIX).unwrap_or(locator);
        if rest == "~" {
            return format!("{FILE_PREFIX}{home}");
        }
        match rest.strip_prefix("~/") {
            Some(tail) => format!("{FILE_PREFIX}{home}/{tail}"),
            None => locator.to_string(),
        }
    }
}

/// Default locator for a configuration type with no declared sources
///
/// `app::net::ServerConfig` and `app.net.ServerConfig` both map to
/// `classpath:app/net/ServerConfig.properties`.
pub fn default_locator(type_name: &str) -> String {
    let path = type_name.replace("::", "/").replace('.', "/");
    format!("{CLASSPATH_PREFIX}{path}.properties")
}

fn map_classpath(locator: &str) -> String {
    match locator.get(..CLASSPATH_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(CLASSPATH_PREFIX) => {
            let rest = locator[CLASSPATH_PREFIX.len()..].trim_start_matches('/');
            format!("{RESOURCE_PREFIX}{rest}")
        }
        _ => locator.to_string(),
    }
}
