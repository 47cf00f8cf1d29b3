//! Source resolution, loading and variable expansion

pub mod engine;
pub mod expander;
pub mod resolver;

pub use engine::{LoadEngine, LoadOutcome, apply_imports};
pub use expander::{MAX_EXPANSION_DEPTH, SubstitutorRegistry, VariableExpander};
pub(crate) use expander::KeyTemplate;
pub use resolver::{SourceResolver, default_locator};
