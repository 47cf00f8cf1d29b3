//! File-based property loader

// Standard library
use std::path::{Path, PathBuf};

// External dependencies
use async_trait::async_trait;

// Internal crates
use crate::core::{
    ConfigError, ConfigResult, LoadContext, Locator, Properties, PropertyLoader, Scheme,
};

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Java-style `.properties`
    Properties,
    /// JSON document, flattened to dot keys
    Json,
    /// TOML document, flattened to dot keys
    #[cfg(feature = "toml")]
    Toml,
    /// YAML document, flattened to dot keys
    #[cfg(feature = "yaml")]
    Yaml,
}

impl FileFormat {
    /// Format for a lowercased extension; no extension means `.properties`
    pub fn from_extension(ext: Option<&str>) -> Option<Self> {
        match ext {
            None | Some("properties" | "props") => Some(Self::Properties),
            Some("json") => Some(Self::Json),
            #[cfg(feature = "toml")]
            Some("toml") => Some(Self::Toml),
            #[cfg(feature = "yaml")]
            Some("yaml" | "yml") => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Loader for `file:` and `resource:` locators
///
/// `file:` paths are used as given, relative ones against the base directory
/// when set. `resource:` paths are looked up in each resource root of the
/// load context in order; the first existing file wins.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    /// Base directory for relative `file:` paths
    pub base_dir: Option<PathBuf>,
}

impl FileLoader {
    /// Create a new file loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new file loader with base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve_path(&self, locator: &Locator, cx: &LoadContext) -> ConfigResult<PathBuf> {
        let path = Path::new(locator.path());
        match locator.scheme() {
            Scheme::File => Ok(match &self.base_dir {
                Some(base_dir) if path.is_relative() => base_dir.join(path),
                _ => path.to_path_buf(),
            }),
            Scheme::Resource => cx
                .resource_roots
                .iter()
                .map(|root| root.join(path))
                .find(|candidate| candidate.is_file())
                .ok_or_else(|| {
                    ConfigError::source_unavailable(
                        locator.to_string(),
                        "not found in any resource root",
                    )
                }),
            other => Err(ConfigError::source_unavailable(
                locator.to_string(),
                format!("scheme '{other}' is not file based"),
            )),
        }
    }
}

#[async_trait]
impl PropertyLoader for FileLoader {
    fn accept(&self, locator: &Locator) -> bool {
        matches!(locator.scheme(), Scheme::File | Scheme::Resource)
    }

    async fn load(&self, locator: &Locator, cx: &LoadContext) -> ConfigResult<Properties> {
        let ext = locator.extension();
        let format = FileFormat::from_extension(ext.as_deref()).ok_or_else(|| {
            ConfigError::source_unavailable(
                locator.to_string(),
                format!("unsupported file format '{}'", ext.as_deref().unwrap_or_default()),
            )
        })?;

        let path = self.resolve_path(locator, cx)?;
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ConfigError::source_unavailable(locator.to_string(), format!("{}: {e}", path.display()))
        })?;

        parse_content(&content, format)
            .map_err(|e| ConfigError::source_unavailable(locator.to_string(), e.to_string()))
    }
}

/// Parse file content into a flat map
pub fn parse_content(content: &str, format: FileFormat) -> ConfigResult<Properties> {
    match format {
        FileFormat::Properties => Ok(parse_properties(content)),
        FileFormat::Json => {
            let value: serde_json::Value = serde_json::from_str(content)?;
            Ok(flatten(&value))
        }
        #[cfg(feature = "toml")]
        FileFormat::Toml => {
            let value: serde_json::Value = toml::from_str(content)?;
            Ok(flatten(&value))
        }
        #[cfg(feature = "yaml")]
        FileFormat::Yaml => {
            let value: serde_json::Value = serde_yaml::from_str(content).map_err(|e| {
                ConfigError::source_unavailable("yaml", format!("YAML error: {e}"))
            })?;
            Ok(flatten(&value))
        }
    }
}

/// Parse `.properties` text
///
/// Follows the usual rules: `#`/`!` comments, `=`, `:` or whitespace as
/// separator, backslash line continuation and `\t \n \r \f \uXXXX` escapes.
/// Later duplicates replace earlier ones.
pub fn parse_properties(content: &str) -> Properties {
    let mut out = Properties::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = String::from(trimmed);
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        out.insert(unescape(key), unescape(value));
    }
    out
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let rest = line[key_end..].trim_start_matches([' ', '\t', '\u{c}']);
    let rest = rest
        .strip_prefix(['=', ':'])
        .map_or(rest, |r| r.trim_start_matches([' ', '\t', '\u{c}']));
    (key, rest)
}

fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Flatten a document into dot-separated keys
///
/// Arrays of scalars become comma-separated values so collection accessors
/// can read them; arrays containing tables are indexed (`servers.0.host`).
/// Nulls are dropped.
pub fn flatten(value: &serde_json::Value) -> Properties {
    let mut out = Properties::new();
    flatten_into(&mut out, String::new(), value);
    out
}

fn flatten_into(out: &mut Properties, prefix: String, value: &serde_json::Value) {
    use serde_json::Value;

    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };

    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(out, join(key), child);
            }
        }
        Value::Array(items) if items.iter().all(is_scalar) => {
            let joined = items
                .iter()
                .filter_map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix, joined);
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_into(out, join(&i.to_string()), child);
            }
        }
        scalar => {
            if let Some(s) = scalar_to_string(scalar) {
                out.insert(prefix, s);
            }
        }
    }
}

fn is_scalar(value: &serde_json::Value) -> bool {
    !matches!(
        value,
        serde_json::Value::Object(_) | serde_json::Value::Array(_)
    )
}

fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Environment;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_properties() {
        let text = "\
# comment
! also a comment
server.host = example.org
server.port:8080
name value with spaces
list=1, 2, \\
     3
escaped\\ key=tab\\there
unicode=caf\\u00e9
empty=
";
        assert_eq!(
            parse_properties(text),
            props(&[
                ("server.host", "example.org"),
                ("server.port", "8080"),
                ("name", "value with spaces"),
                ("list", "1, 2, 3"),
                ("escaped key", "tab\there"),
                ("unicode", "café"),
                ("empty", ""),
            ])
        );
    }

    #[test]
    fn test_flatten_json() {
        let value = serde_json::json!({
            "server": {"host": "h", "port": 80, "tls": false},
            "tags": ["a", "b"],
            "routes": [{"path": "/x"}],
            "unset": null
        });
        assert_eq!(
            flatten(&value),
            props(&[
                ("routes.0.path", "/x"),
                ("server.host", "h"),
                ("server.port", "80"),
                ("server.tls", "false"),
                ("tags", "a,b"),
            ])
        );
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_parse_toml() {
        let parsed = parse_content("[db]\nurl = \"pg\"\npool = 4\n", FileFormat::Toml).unwrap();
        assert_eq!(parsed, props(&[("db.pool", "4"), ("db.url", "pg")]));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_parse_yaml() {
        let parsed =
            parse_content("cache:\n  ttl: 30\n  hosts: [a, b]\n", FileFormat::Yaml).unwrap();
        assert_eq!(parsed, props(&[("cache.hosts", "a,b"), ("cache.ttl", "30")]));
    }

    #[tokio::test]
    async fn test_load_file_and_resource() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.properties"), "a=1\n").unwrap();
        std::fs::create_dir(dir.path().join("res")).unwrap();
        std::fs::write(dir.path().join("res").join("r.json"), r#"{"b": 2}"#).unwrap();

        let cx = LoadContext::new(
            Arc::new(Environment::empty()),
            Arc::from(vec![dir.path().join("missing"), dir.path().join("res")]),
        );
        let loader = FileLoader::with_base_dir(dir.path());

        let file = loader
            .load(&Locator::parse("file:app.properties").unwrap(), &cx)
            .await
            .unwrap();
        assert_eq!(file, props(&[("a", "1")]));

        let resource = loader
            .load(&Locator::parse("resource:r.json").unwrap(), &cx)
            .await
            .unwrap();
        assert_eq!(resource, props(&[("b", "2")]));

        let err = loader
            .load(&Locator::parse("file:nope.properties").unwrap(), &cx)
            .await
            .unwrap_err();
        assert!(err.is_recoverable());

        let err = loader
            .load(&Locator::parse("file:app.ini").unwrap(), &cx)
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
    }
}
