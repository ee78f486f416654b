//! Rules and propagation control stacked on a [`ServiceBuilder`].
//!
//! A [`Rule`] is a synchronous check on the context, composable with
//! [`Rule::and`] and [`Rule::not`]. An [`AsyncRule`] is a handler-shaped
//! predicate whose parameters are extracted like a handler's, so it can look
//! at a published command result. Both reject with [`EventSkipped`].
//!
//! ```rust,ignore
//! let svc = on_message()
//!     .layer(commands.on_parsed(ban.clone()))
//!     .rule(|target: Match<String, Target>| async move { target.available })
//!     .stop()
//!     .handler(ban_user);
//! ```

use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::filter::{AsyncFilterLayer, AsyncPredicate, FilterLayer, Predicate};
use tower::{BoxError, Layer, Service, ServiceBuilder};
use tower_layer::Stack;

use super::service::{HandlerResponse, HandlerService};
use super::traits::FromCtxFn;
use crate::context::ClaspContext;
use crate::error::EventSkipped;

type Check = dyn Fn(&ClaspContext) -> bool + Send + Sync;

/// A synchronous check on the dispatch context.
#[derive(Clone)]
pub struct Rule(Arc<Check>);

impl Rule {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&ClaspContext) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(check))
    }

    /// Passes when both rules pass. `other` is not evaluated if `self`
    /// already failed.
    pub fn and(self, other: Rule) -> Self {
        Rule::new(move |ctx| (self.0)(ctx) && (other.0)(ctx))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Rule::new(move |ctx| !(self.0)(ctx))
    }

    pub fn check(&self, ctx: &ClaspContext) -> bool {
        (self.0)(ctx)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Rule")
    }
}

impl Predicate<Arc<ClaspContext>> for Rule {
    type Request = Arc<ClaspContext>;

    fn check(&mut self, ctx: Arc<ClaspContext>) -> Result<Arc<ClaspContext>, BoxError> {
        match Rule::check(self, &ctx) {
            true => Ok(ctx),
            false => Err(EventSkipped.into()),
        }
    }
}

/// A predicate with extracted parameters.
///
/// A parameter that cannot be extracted fails the rule.
pub struct AsyncRule<F, T> {
    predicate: F,
    _params: PhantomData<fn() -> T>,
}

impl<F, T> AsyncRule<F, T>
where
    F: FromCtxFn<bool, T>,
{
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            _params: PhantomData,
        }
    }
}

impl<F: Clone, T> Clone for AsyncRule<F, T> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            _params: PhantomData,
        }
    }
}

impl<F, T> AsyncPredicate<Arc<ClaspContext>> for AsyncRule<F, T>
where
    F: FromCtxFn<bool, T>,
{
    type Future = BoxFuture<'static, Result<Arc<ClaspContext>, BoxError>>;
    type Request = Arc<ClaspContext>;

    fn check(&mut self, ctx: Arc<ClaspContext>) -> Self::Future {
        let verdict = self.predicate.call(ctx.clone());
        async move {
            match verdict.await {
                Ok(true) => Ok(ctx),
                Ok(false) | Err(_) => Err(EventSkipped.into()),
            }
        }
        .boxed()
    }
}

/// Stops propagation to later services and plugins once the wrapped
/// service accepted the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopLayer;

impl<S> Layer<S> for StopLayer {
    type Service = Stop<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Stop { inner }
    }
}

/// The service produced by [`StopLayer`].
#[derive(Debug, Clone)]
pub struct Stop<S> {
    inner: S,
}

impl<S> Service<Arc<ClaspContext>> for Stop<S>
where
    S: Service<Arc<ClaspContext>, Response = (), Error = BoxError>,
    S::Future: Send + 'static,
{
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<(), BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), BoxError>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, ctx: Arc<ClaspContext>) -> Self::Future {
        let accepted = self.inner.call(ctx.clone());
        async move {
            accepted.await?;
            ctx.stop_propagation();
            Ok(())
        }
        .boxed()
    }
}

/// Handler and rule sugar for [`ServiceBuilder`].
///
/// Available through `use clasp::prelude::*`.
pub trait ServiceBuilderExt<L> {
    /// Finishes the stack with `handler` at the bottom.
    fn handler<F, R, T>(self, handler: F) -> L::Service
    where
        F: FromCtxFn<R, T>,
        R: HandlerResponse,
        L: Layer<HandlerService<F, R, T>>;

    /// Adds a synchronous check.
    fn rule_sync<F>(self, check: F) -> ServiceBuilder<Stack<FilterLayer<Rule>, L>>
    where
        F: Fn(&ClaspContext) -> bool + Send + Sync + 'static;

    /// Adds a predicate whose parameters are extracted like a handler's.
    fn rule<F, T>(self, predicate: F) -> ServiceBuilder<Stack<AsyncFilterLayer<AsyncRule<F, T>>, L>>
    where
        F: FromCtxFn<bool, T>;

    /// See [`StopLayer`].
    fn stop(self) -> ServiceBuilder<Stack<StopLayer, L>>;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn handler<F, R, T>(self, handler: F) -> L::Service
    where
        F: FromCtxFn<R, T>,
        R: HandlerResponse,
        L: Layer<HandlerService<F, R, T>>,
    {
        self.service(HandlerService::new(handler))
    }

    fn rule_sync<F>(self, check: F) -> ServiceBuilder<Stack<FilterLayer<Rule>, L>>
    where
        F: Fn(&ClaspContext) -> bool + Send + Sync + 'static,
    {
        self.filter(Rule::new(check))
    }

    fn rule<F, T>(self, predicate: F) -> ServiceBuilder<Stack<AsyncFilterLayer<AsyncRule<F, T>>, L>>
    where
        F: FromCtxFn<bool, T>,
    {
        self.filter_async(AsyncRule::new(predicate))
    }

    fn stop(self) -> ServiceBuilder<Stack<StopLayer, L>> {
        self.layer(StopLayer)
    }
}

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;
    use crate::context::testing::{TestMessage, context};
    use crate::extractor::Event;

    fn from(sender: &str, text: &str) -> Arc<ClaspContext> {
        let mut msg = TestMessage::new("1", text);
        msg.sender_id = Some(sender.into());
        context(msg, Default::default())
    }

    fn sent_by(sender: &'static str) -> Rule {
        Rule::new(move |ctx| ctx.event().sender_id() == Some(sender))
    }

    #[test]
    fn test_rules_compose() {
        let ctx = from("alice", "/ban bob");
        assert!(sent_by("alice").check(&ctx));
        assert!(!sent_by("alice").not().check(&ctx));
        assert!(!sent_by("alice").and(sent_by("bob")).check(&ctx));
        assert!(sent_by("alice").and(sent_by("bob").not()).check(&ctx));
    }

    #[tokio::test]
    async fn test_rule_sync_skips_on_false() {
        let svc = ServiceBuilder::new()
            .rule_sync(|ctx: &ClaspContext| ctx.event().sender_id() == Some("admin"))
            .handler(|| async {});

        let err = svc.oneshot(from("alice", "/ban bob")).await.unwrap_err();
        assert!(err.is::<EventSkipped>());
    }

    #[tokio::test]
    async fn test_async_rule_extracts_and_stop_halts_propagation() {
        let svc = ServiceBuilder::new()
            .rule(|event: Event<TestMessage>| async move {
                event.message.extract_plain_text().starts_with("/ban")
            })
            .stop()
            .handler(|| async {});

        let ctx = from("alice", "/ban bob");
        svc.clone().oneshot(ctx.clone()).await.unwrap();
        assert!(!ctx.is_propagating());

        let ctx = from("alice", "hello");
        assert!(svc.oneshot(ctx.clone()).await.is_err());
        assert!(ctx.is_propagating());
    }

    #[tokio::test]
    async fn test_failed_extraction_fails_the_rule() {
        // Never available.
        #[derive(Clone)]
        struct Unrelated;
        impl crate::extractor::FromContext for Unrelated {
            fn from_context(_: &ClaspContext) -> crate::error::ExtractResult<Self> {
                Err(crate::error::ExtractError::custom("unavailable"))
            }
        }

        let svc = ServiceBuilder::new()
            .rule(|_: Unrelated| async { true })
            .handler(|| async {});
        let err = svc.oneshot(from("alice", "/ban bob")).await.unwrap_err();
        assert!(err.is::<EventSkipped>());
    }
}
