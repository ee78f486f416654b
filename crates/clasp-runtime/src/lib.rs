//! # Clasp Runtime
//!
//! Orchestration layer of the Clasp framework:
//!
//! - Layered configuration with figment ([`config`])
//! - `tracing-subscriber` setup ([`logging`])
//! - [`ClaspRuntime`], owning the dispatcher, the command registry with its
//!   result cache and the plugin manager
//!
//! ```rust,ignore
//! use clasp_runtime::ClaspRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = ClaspRuntime::builder().build()?;
//!     runtime.load_plugin(my_plugin(&runtime));
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ClaspConfig, ConfigError, ConfigLoader, ConfigResult, LoggingConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{ClaspRuntime, RuntimeBuilder};

pub use tracing;
pub use tracing_subscriber;

/// Logging macros for plugin code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
