//! Core handler service for the Clasp framework.
//!
//! [`HandlerService<F, R, T>`] wraps a single handler function and
//! implements `tower::Service<Arc<ClaspContext>>`. Filtering, command
//! resolution and the rest are ordinary tower [`Layer`](tower::Layer)s
//! stacked on top.

use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::{BoxError, Service};
use tracing::{debug, error};

use super::traits::FromCtxFn;
use crate::context::ClaspContext;
use clasp_core::Message;

// ============================================================================
// HandlerResponse
// ============================================================================

/// A trait for types that can be returned from handlers.
#[async_trait]
pub trait HandlerResponse: Send + 'static {
    /// Performs the side effects of the response (usually sending it).
    async fn process_response(self, ctx: &ClaspContext);
}

#[async_trait]
impl HandlerResponse for () {
    async fn process_response(self, _ctx: &ClaspContext) {}
}

/// Sends the string back as a plain-text message.
#[async_trait]
impl HandlerResponse for String {
    async fn process_response(self, ctx: &ClaspContext) {
        Message::plain(self).process_response(ctx).await;
    }
}

#[async_trait]
impl HandlerResponse for Message {
    async fn process_response(self, ctx: &ClaspContext) {
        if let Err(e) = ctx.bot().send(&**ctx.event(), &self).await {
            error!("Failed to send message: {e}");
        }
    }
}

/// On `Some` the inner value is processed, on `None` nothing happens.
#[async_trait]
impl<T: HandlerResponse> HandlerResponse for Option<T> {
    async fn process_response(self, ctx: &ClaspContext) {
        if let Some(t) = self {
            t.process_response(ctx).await;
        }
    }
}

/// On `Ok` the inner value is processed, on `Err` the error is logged.
#[async_trait]
impl<T: HandlerResponse, E: std::fmt::Display + Send + 'static> HandlerResponse for Result<T, E> {
    async fn process_response(self, ctx: &ClaspContext) {
        match self {
            Ok(t) => t.process_response(ctx).await,
            Err(e) => {
                error!("Handler error: {e}");
            }
        }
    }
}

// ============================================================================
// HandlerService
// ============================================================================

/// A tower [`Service`] that calls a single handler function.
///
/// ```rust,ignore
/// let svc = HandlerService::new(my_handler);
/// let filtered = on_message().service(svc);
/// ```
pub struct HandlerService<F, R, T> {
    handler: F,
    _marker: PhantomData<fn() -> (R, T)>,
}

impl<F, R, T> HandlerService<F, R, T> {
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

impl<F: Clone, R, T> Clone for HandlerService<F, R, T> {
    fn clone(&self) -> Self {
        HandlerService {
            handler: self.handler.clone(),
            _marker: PhantomData,
        }
    }
}

impl<F, R, T> From<F> for HandlerService<F, R, T> {
    fn from(handler: F) -> Self {
        HandlerService::new(handler)
    }
}

impl<F, R, T> Service<Arc<ClaspContext>> for HandlerService<F, R, T>
where
    F: FromCtxFn<R, T>,
    R: HandlerResponse,
{
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<ClaspContext>) -> Self::Future {
        let handler = self.handler.clone();
        async move {
            match handler.call(ctx.clone()).await {
                Ok(r) => r.process_response(&ctx).await,
                Err(e) => debug!(plugin = ctx.plugin_name(), "handler not invoked: {e}"),
            }
            Ok(())
        }
        .boxed()
    }
}
