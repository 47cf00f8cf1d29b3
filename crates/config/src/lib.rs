//! Strata Config - declarative property resolution with hot reload
//!
//! A [`Declaration`] names the sources of a configuration type, the
//! accessors it exposes and how their values are converted. Building a
//! [`Config`] from it resolves the source templates, loads them through the
//! loader chain, merges the result into an immutable [`Snapshot`] and keeps
//! that snapshot fresh according to the declared hot-reload mode.
//!
//! # Example
//!
//! ```rust,no_run
//! use strata_config::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> ConfigResult<()> {
//!     let declaration = Declaration::builder("ServerConfig")
//!         .sources(["file:${user.dir}/server.properties", "classpath:server.properties"])
//!         .policy(LoadPolicy::Merge)
//!         .prefix("server.")
//!         .hot_reload(ReloadMode::Async, Duration::from_secs(5))
//!         .property(PropertyDef::new("port").default_value("8080"))
//!         .property(PropertyDef::new("hosts").separator(";"))
//!         .build()?;
//!
//!     let config = Config::builder(declaration)
//!         .resource_root("resources")
//!         .build()
//!         .await?;
//!
//!     let port: u16 = config.get("port").await?;
//!     let hosts: Vec<String> = config.get("hosts").await?;
//!     println!("{hosts:?}:{port}");
//!     Ok(())
//! }
//! ```

#![deny(unused_must_use)]
#![warn(missing_docs)]

// Core module with main functionality
pub mod core;

// Implementation modules
pub mod convert;
pub mod loaders;
pub mod reload;
pub mod resolve;

// Re-export main types from core
pub use core::{
    BoxError, ChangeKind, ChangeSet, Config, ConfigBuilder, ConfigError, ConfigResult,
    ConfigResultExt, ConfigView, Declaration, DeclarationBuilder, Environment, ErrorCategory,
    Features, HotReload, LoadPolicy, Locator, Properties, PropertyChange, PropertyDef,
    ReloadEvent, ReloadMode, Scheme, Snapshot, SourceSpec, Verdict,
};

// Re-export traits
pub use core::{
    Converter, LoadContext, PropertyChangeListener, PropertyLoader, ReloadListener, Substitutor,
    Tokenizer, TransactionalListener,
};

// Re-export concrete implementations
pub use convert::{Edited, EditorRegistry, FromProperty, Parsed};
pub use loaders::{EnvLoader, FileLoader, LoaderChain, MemoryLoader, SystemPropertiesLoader};
pub use reload::{ListenerId, ReloadOutcome};

/// Prelude module for convenient imports
pub mod prelude {
    //! Prelude for common imports
    //!
    //! # Example
    //! ```rust
    //! use strata_config::prelude::*;
    //! ```

    // Core types
    pub use crate::core::{
        Config, ConfigBuilder, ConfigError, ConfigResult, ConfigResultExt, ConfigView,
        Declaration, Environment, HotReload, LoadPolicy, Properties, PropertyChange, PropertyDef,
        ReloadMode, Verdict,
    };

    // Traits
    pub use crate::core::{
        Converter, PropertyChangeListener, PropertyLoader, ReloadListener, Substitutor,
        Tokenizer, TransactionalListener,
    };
    pub use crate::convert::FromProperty;

    // Wrappers and outcomes
    pub use crate::convert::{Edited, Parsed};
    pub use crate::reload::ReloadOutcome;
}
