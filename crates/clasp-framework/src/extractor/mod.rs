//! Extractor system for the Clasp framework.
//!
//! This module provides the [`FromContext`] trait and built-in implementations
//! that power parameter injection. Handler functions declare what they need
//! and the framework provides it from the current [`ClaspContext`].
//!
//! ```rust,ignore
//! pub trait FromContext: Sized {
//!     fn from_context(ctx: &ClaspContext) -> ExtractResult<Self>;
//! }
//! ```
//!
//! # Error Handling
//!
//! If an extractor fails, the handler is not invoked. Optional extractors
//! with [`Option<T>`] never fail.
//!
//! Command-specific extractors (`Match`, `Query`, `Arg`, ...) live in
//! [`crate::command::extractor`].
//!
//! [`ClaspContext`]: crate::context::ClaspContext

pub mod bot;
pub mod core;
pub mod event;
pub mod plugin;

pub use bot::Bot;
pub use core::FromContext;
pub use event::Event;
pub use plugin::PluginConfig;
