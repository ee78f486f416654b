//! # Clasp Framework
//!
//! Dispatch and command resolution for chat bots.
//!
//! This layer provides:
//! - The [`Dispatcher`] and its interrupt waiters
//! - Plugins, the [`PluginManager`] and plugin behaviours
//! - Axum-style handlers with parameter injection, stacked as tower services
//! - Structured command parsing bound to the dispatcher ([`command`])

pub mod command;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod interrupt;
pub mod manager;
pub mod plugin;
pub mod routing;

pub use context::ClaspContext;
pub use dispatcher::Dispatcher;
pub use error::{EventSkipped, ExtractError, ExtractResult};
pub use extractor::FromContext;
pub use handler::{HandlerResponse, HandlerService, ServiceBuilderExt};
pub use interrupt::{Interrupts, WaitHandle};
pub use manager::{Behaviour, PluginManager};
pub use plugin::{Plugin, Schema};
pub use routing::{on, on_event_type, on_message};
