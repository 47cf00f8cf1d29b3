//! Core configuration functionality

pub mod config;
pub mod declaration;
pub mod environment;
pub mod error;
pub mod result;
pub mod snapshot;
pub mod source;
pub mod traits;

// Re-export core types
pub use config::{Config, ConfigBuilder, ConfigView};
pub use declaration::{
    DEFAULT_RELOAD_INTERVAL, DEFAULT_SEPARATOR, Declaration, DeclarationBuilder, Features,
    HotReload, PropertyDef, ReloadMode,
};
pub use environment::Environment;
pub use error::{BoxError, ConfigError, ErrorCategory};
pub use result::{ConfigResult, ConfigResultExt};
pub use snapshot::{ChangeKind, ChangeSet, Properties, PropertyChange, Snapshot};
pub use source::{LoadPolicy, Locator, Scheme, SourceSpec};

// Re-export core traits
pub use traits::{
    Converter, LoadContext, PropertyChangeListener, PropertyLoader, ReloadEvent, ReloadListener,
    Substitutor, Tokenizer, TransactionalListener, Verdict,
};
