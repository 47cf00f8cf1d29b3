//! `env:` and `system:` loaders over the captured environment

use crate::core::{ConfigResult, LoadContext, Locator, Properties, PropertyLoader, Scheme};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Selects every entry
pub const ALL: &str = "*";

/// Loader for `env:<prefix>` locators
///
/// `env:*` yields every captured environment variable, `env:APP_` only the
/// ones starting with `APP_`. Keys are kept verbatim unless prefix stripping
/// is enabled.
#[derive(Debug, Clone, Default)]
pub struct EnvLoader {
    /// Remove the selecting prefix from keys
    pub strip_prefix: bool,
    /// Whether to log sensitive values
    pub log_sensitive: bool,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the selecting prefix from returned keys
    #[must_use = "builder methods must be chained or built"]
    pub fn with_strip_prefix(mut self, strip: bool) -> Self {
        self.strip_prefix = strip;
        self
    }

    /// Set whether to log sensitive values
    #[must_use = "builder methods must be chained or built"]
    pub fn with_log_sensitive(mut self, log_sensitive: bool) -> Self {
        self.log_sensitive = log_sensitive;
        self
    }
}

#[async_trait]
impl PropertyLoader for EnvLoader {
    fn accept(&self, locator: &Locator) -> bool {
        *locator.scheme() == Scheme::Env
    }

    async fn load(&self, locator: &Locator, cx: &LoadContext) -> ConfigResult<Properties> {
        Ok(select(
            cx.env.vars(),
            locator.path(),
            self.strip_prefix,
            self.log_sensitive,
        ))
    }
}

/// Loader for `system:<prefix>` locators over captured system properties
#[derive(Debug, Clone, Default)]
pub struct SystemPropertiesLoader {
    /// Remove the selecting prefix from keys
    pub strip_prefix: bool,
}

impl SystemPropertiesLoader {
    /// Create a new system properties loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the selecting prefix from returned keys
    #[must_use = "builder methods must be chained or built"]
    pub fn with_strip_prefix(mut self, strip: bool) -> Self {
        self.strip_prefix = strip;
        self
    }
}

#[async_trait]
impl PropertyLoader for SystemPropertiesLoader {
    fn accept(&self, locator: &Locator) -> bool {
        *locator.scheme() == Scheme::System
    }

    async fn load(&self, locator: &Locator, cx: &LoadContext) -> ConfigResult<Properties> {
        Ok(select(
            cx.env.system_properties(),
            locator.path(),
            self.strip_prefix,
            true,
        ))
    }
}

fn select(
    source: &BTreeMap<String, String>,
    prefix: &str,
    strip: bool,
    log_sensitive: bool,
) -> Properties {
    let prefix = if prefix == ALL { "" } else { prefix };
    let mut out = Properties::new();

    for (key, value) in source.range(prefix.to_string()..) {
        let Some(rest) = key.strip_prefix(prefix) else {
            break;
        };
        let key = if strip { rest } else { key.as_str() };
        if key.is_empty() {
            continue;
        }

        if is_sensitive_key(key) && !log_sensitive {
            tracing::trace!(key, "loading env property = [REDACTED]");
        } else {
            tracing::trace!(key, value = %value, "loading env property");
        }
        out.insert(key.to_string(), value.clone());
    }
    out
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    ["password", "secret", "token", "api_key", "private", "credential"]
        .iter()
        .any(|marker| key.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Environment;
    use std::sync::Arc;

    fn cx() -> LoadContext {
        let env = Environment::empty()
            .with_var("APP_PORT", "8080")
            .with_var("APP_HOST", "localhost")
            .with_var("OTHER", "x")
            .with_system_property("user.home", "/home/a")
            .with_system_property("os.name", "linux");
        LoadContext::new(Arc::new(env), Arc::from(Vec::new()))
    }

    #[tokio::test]
    async fn test_env_prefix_selection() {
        let cx = cx();
        let loader = EnvLoader::new();
        let all = loader.load(&Locator::parse("env:*").unwrap(), &cx).await.unwrap();
        assert_eq!(all.len(), 3);

        let app = loader.load(&Locator::parse("env:APP_").unwrap(), &cx).await.unwrap();
        assert_eq!(app.keys().collect::<Vec<_>>(), vec!["APP_HOST", "APP_PORT"]);

        let stripped = EnvLoader::new()
            .with_strip_prefix(true)
            .load(&Locator::parse("env:APP_").unwrap(), &cx)
            .await
            .unwrap();
        assert_eq!(stripped.get("PORT").map(String::as_str), Some("8080"));
    }

    #[tokio::test]
    async fn test_system_properties() {
        let cx = cx();
        let loader = SystemPropertiesLoader::new();
        assert!(loader.accept(&Locator::parse("system:*").unwrap()));
        assert!(!loader.accept(&Locator::parse("env:*").unwrap()));

        let user = loader
            .load(&Locator::parse("system:user.").unwrap(), &cx)
            .await
            .unwrap();
        assert_eq!(user.len(), 1);
        assert_eq!(user.get("user.home").map(String::as_str), Some("/home/a"));
    }

    #[test]
    fn test_sensitive_keys() {
        assert!(is_sensitive_key("DB_PASSWORD"));
        assert!(is_sensitive_key("github_token"));
        assert!(!is_sensitive_key("APP_PORT"));
    }
}
