//! Source locators and merge policy

use super::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Characters a locator may not contain after expansion
const FORBIDDEN_CHARS: &[char] = &['<', '>', '"', '{', '}', '|', '\\', '^', '`'];

/// How multiple sources are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoadPolicy {
    /// Take the whole map of the first source that loads
    #[default]
    First,
    /// Union of every source that loads; earliest source wins per key
    Merge,
}

impl std::fmt::Display for LoadPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadPolicy::First => write!(f, "FIRST"),
            LoadPolicy::Merge => write!(f, "MERGE"),
        }
    }
}

/// Declared locator templates plus the policy used to combine them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Locator templates in priority order; may contain `${...}`
    #[serde(default)]
    pub locators: Vec<String>,

    /// Merge policy
    #[serde(default)]
    pub policy: LoadPolicy,
}

impl SourceSpec {
    /// Create a spec from templates and a policy
    pub fn new<I, S>(locators: I, policy: LoadPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locators: locators.into_iter().map(Into::into).collect(),
            policy,
        }
    }
}

/// Locator scheme
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Local file, absolute or relative to the working directory
    File,
    /// Resource searched in the configured resource roots
    Resource,
    /// Captured environment variables
    Env,
    /// Captured system properties
    System,
    /// In-process map registered with a memory loader
    Memory,
    /// Plain HTTP
    Http,
    /// HTTPS
    Https,
    /// Any other well-formed scheme, lowercased
    Other(String),
}

impl Scheme {
    fn parse(scheme: &str) -> Self {
        match scheme.to_ascii_lowercase().as_str() {
            "file" => Scheme::File,
            "resource" => Scheme::Resource,
            "env" => Scheme::Env,
            "system" => Scheme::System,
            "mem" => Scheme::Memory,
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => Scheme::Other(other.to_string()),
        }
    }

    /// Scheme name as written in locators
    pub fn as_str(&self) -> &str {
        match self {
            Scheme::File => "file",
            Scheme::Resource => "resource",
            Scheme::Env => "env",
            Scheme::System => "system",
            Scheme::Memory => "mem",
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::Other(s) => s,
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete, parsed source location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    scheme: Scheme,
    path: String,
}

impl Locator {
    /// Parse an already expanded locator
    ///
    /// A locator must carry a scheme (`file:`, `resource:`, `env:` ...) and
    /// contain only URI-legal characters. `file:` paths are file system
    /// paths: backslashes become `/` and spaces are allowed.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::invalid_locator(raw, "empty locator"));
        }

        let (scheme, rest) = raw
            .split_once(':')
            .ok_or_else(|| ConfigError::invalid_locator(raw, "missing scheme"))?;
        if !is_valid_scheme(scheme) {
            return Err(ConfigError::invalid_locator(
                raw,
                format!("malformed scheme '{scheme}'"),
            ));
        }
        if rest.is_empty() {
            return Err(ConfigError::invalid_locator(raw, "empty path"));
        }

        let scheme = Scheme::parse(scheme);
        let path = match &scheme {
            Scheme::File => {
                let normalized = rest.replace('\\', "/");
                let encoded = normalized.replace(' ', "%20");
                check_chars(raw, &encoded)?;
                file_path(raw, &normalized, &encoded)?
            }
            Scheme::Http | Scheme::Https => {
                check_chars(raw, rest)?;
                url::Url::parse(raw).map_err(|e| ConfigError::invalid_locator(raw, e.to_string()))?;
                rest.to_string()
            }
            _ => {
                check_chars(raw, rest)?;
                rest.to_string()
            }
        };

        Ok(Self { scheme, path })
    }

    /// Build a locator from parts without validation
    pub fn new(scheme: Scheme, path: impl Into<String>) -> Self {
        Self {
            scheme,
            path: path.into(),
        }
    }

    /// Scheme of this locator
    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Scheme-specific part
    pub fn path(&self) -> &str {
        &self.path
    }

    /// File system path for `file:` locators
    pub fn to_file_path(&self) -> Option<PathBuf> {
        match self.scheme {
            Scheme::File => Some(PathBuf::from(&self.path)),
            _ => None,
        }
    }

    /// Lowercased extension of the path, if any
    pub fn extension(&self) -> Option<String> {
        let name = self.path.rsplit('/').next()?;
        let (_, ext) = name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scheme, self.path)
    }
}

impl std::str::FromStr for Locator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn check_chars(raw: &str, part: &str) -> ConfigResult<()> {
    match part
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        Some(c) => Err(ConfigError::invalid_locator(raw, format!("illegal character '{c}'"))),
        None => Ok(()),
    }
}

/// `file:` locators keep relative paths relative; `file://` forms go through
/// `url` with spaces already percent-encoded
fn file_path(raw: &str, normalized: &str, encoded: &str) -> ConfigResult<String> {
    if !normalized.starts_with("//") {
        return Ok(normalized.to_string());
    }
    let url = url::Url::parse(&format!("file:{encoded}"))
        .map_err(|e| ConfigError::invalid_locator(raw, e.to_string()))?;
    let path = url
        .to_file_path()
        .map_err(|()| ConfigError::invalid_locator(raw, "not a local file URL"))?;
    Ok(path.to_string_lossy().into_owned())
}
