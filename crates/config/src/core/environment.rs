//! Point-in-time view of process environment and system properties
//!
//! Resolution never reads `std::env` directly. A pass captures one
//! [`Environment`] up front and threads it through source resolution,
//! locator expansion and the `env:` / `system:` loaders, so a concurrent
//! `set_var` elsewhere in the process cannot produce a half-updated view.

use std::collections::BTreeMap;

/// Captured environment variables and system properties
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
    system: BTreeMap<String, String>,
}

impl Environment {
    /// Capture the current process environment
    pub fn capture() -> Self {
        let vars: BTreeMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        let system = system_properties(&vars);
        Self { vars, system }
    }

    /// Create an environment from explicit maps
    pub fn from_parts(
        vars: impl IntoIterator<Item = (String, String)>,
        system: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            vars: vars.into_iter().collect(),
            system: system.into_iter().collect(),
        }
    }

    /// Empty environment
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add or replace an environment variable
    #[must_use = "builder methods must be chained or built"]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Add or replace a system property
    #[must_use = "builder methods must be chained or built"]
    pub fn with_system_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.system.insert(key.into(), value.into());
        self
    }

    /// Environment variable lookup
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// System property lookup
    pub fn system_property(&self, key: &str) -> Option<&str> {
        self.system.get(key).map(String::as_str)
    }

    /// All environment variables
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// All system properties
    pub fn system_properties(&self) -> &BTreeMap<String, String> {
        &self.system
    }

    /// User home directory, taken from the captured view
    pub fn home_dir(&self) -> Option<&str> {
        self.system_property("user.home")
            .or_else(|| self.var("HOME"))
            .or_else(|| self.var("USERPROFILE"))
            .filter(|home| !home.is_empty())
    }
}

fn system_properties(vars: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut system = BTreeMap::new();
    let mut put = |key: &str, value: Option<String>| {
        if let Some(value) = value {
            system.insert(key.to_string(), value);
        }
    };

    put(
        "user.home",
        vars.get("HOME").or_else(|| vars.get("USERPROFILE")).cloned(),
    );
    put(
        "user.name",
        vars.get("USER").or_else(|| vars.get("USERNAME")).cloned(),
    );
    put(
        "user.dir",
        std::env::current_dir()
            .ok()
            .map(|p| p.to_string_lossy().into_owned()),
    );
    put(
        "tmp.dir",
        Some(std::env::temp_dir().to_string_lossy().into_owned()),
    );
    put("os.name", Some(std::env::consts::OS.to_string()));
    put("os.arch", Some(std::env::consts::ARCH.to_string()));
    put(
        "file.separator",
        Some(std::path::MAIN_SEPARATOR.to_string()),
    );
    put(
        "path.separator",
        Some(if cfg!(windows) { ";" } else { ":" }.to_string()),
    );
    put(
        "line.separator",
        Some(if cfg!(windows) { "\r\n" } else { "\n" }.to_string()),
    );
    system
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_has_system_properties() {
        let env = Environment::capture();
        assert_eq!(env.system_property("os.name"), Some(std::env::consts::OS));
        assert!(env.system_property("tmp.dir").is_some());
    }

    #[test]
    fn test_home_dir_precedence() {
        let env = Environment::empty()
            .with_var("HOME", "/home/env")
            .with_system_property("user.home", "/home/sys");
        assert_eq!(env.home_dir(), Some("/home/sys"));

        let env = Environment::empty().with_var("USERPROFILE", "C:/Users/x");
        assert_eq!(env.home_dir(), Some("C:/Users/x"));

        assert_eq!(Environment::empty().home_dir(), None);
    }
}
