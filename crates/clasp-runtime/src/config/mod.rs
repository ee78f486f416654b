//! Configuration for the Clasp runtime.
//!
//! Configuration is layered with figment (see [`loader`]), described by the
//! serde schema in [`schema`] and checked by [`validate_config`] before the
//! runtime starts.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ClaspConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;
