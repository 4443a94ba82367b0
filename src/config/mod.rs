//! Protocol file configuration
//!
//! Loads and validates user-supplied breathing protocols written in YAML.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, LoadResult, LoadWarning, LoaderOptions, ProtocolLoader};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
