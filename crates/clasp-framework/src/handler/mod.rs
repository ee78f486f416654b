//! Handler, service and routing system for the Clasp framework.
//!
//! - **Functions** ([`traits`]): the [`FromCtxFn`] trait adapts async
//!   functions with injected parameters, similar to Axum's handlers.
//! - **Service** ([`service`]): [`HandlerService`] wraps such a function and
//!   implements `tower::Service`.
//! - **Builder** ([`builder`]): filters, blocking and the
//!   [`ServiceBuilderExt`] sugar for stacking them.
//!
//! ```text
//! on_message()                 ← ServiceBuilder with FilterLayer pre-stacked
//!     .layer(command_layer)    ← parse, dedup, complete, publish
//!     .handler(my_handler)     ← HandlerService at the bottom
//! ```

pub mod builder;
pub mod service;
pub mod traits;

pub use builder::{AsyncRule, Rule, ServiceBuilderExt, Stop, StopLayer};
pub use service::{HandlerResponse, HandlerService};
pub use traits::FromCtxFn;

pub use tower::Layer;
