//! The command layer: resolves one message against one command before the
//! wrapped service runs.
//!
//! For every event the layer
//!
//! 1. extracts tokens, applying the self-mention gate and the quote merge,
//! 2. looks up the [`ResultCache`]; a dispatch that finds an entry waits for
//!    it instead of parsing again,
//! 3. parses, and runs a completion session for incomplete input when one
//!    is configured,
//! 4. decides what to do with output text according to the [`SendMode`],
//! 5. resolves the cache entry and stores the `Arc<CommandResult>` in the
//!    context,
//! 6. calls the inner service only for a full match or when output was kept
//!    for it.
//!
//! Anything that ends the dispatch early is reported as [`EventSkipped`].
//!
//! ```rust,ignore
//! let svc = ServiceBuilder::new()
//!     .layer(commands.on_parsed(add.clone()).send_mode(SendMode::Reply))
//!     .handler(|a: Arg<i64, A>, b: Arg<i64, B>| async move { format!("{}", *a + *b) });
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tower::{BoxError, Layer, Service};
use tracing::{Instrument, debug, debug_span, trace, warn};

use clasp_core::BoxedEvent;

use super::adapter::{CommandAdapter, DefaultAdapter};
use super::cache::{Lookup, ResultCache, SuccessPolicy};
use super::completion::{CompletionConfig, SessionEnd, run_session};
use super::output::OutputMessage;
use super::parser::{CommandParser, parse_guarded};
use super::projection::CommandResult;
use super::token::{QuoteSide, Token, extract, leading_mention, merge_quote, strip_mention};
use crate::context::ClaspContext;
use crate::error::EventSkipped;
use crate::handler::{FromCtxFn, HandlerResponse, HandlerService};

/// Where output text goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    /// Sent back to the conversation through the adapter.
    #[default]
    Reply,
    /// Published as an [`OutputMessage`] event.
    Post,
    /// Kept in [`CommandResult::output`] for the handler.
    Stay,
}

#[derive(Clone)]
struct Settings {
    parser: Arc<dyn CommandParser>,
    cache: Arc<ResultCache>,
    adapter: Arc<dyn CommandAdapter>,
    send_mode: SendMode,
    skip_for_unmatch: bool,
    completion: Option<CompletionConfig>,
    need_tome: bool,
    remove_tome: bool,
    merge_quote: Option<QuoteSide>,
    success_policy: SuccessPolicy,
    block: bool,
}

/// A tower [`Layer`] binding one command to the wrapped service.
#[derive(Clone)]
pub struct CommandLayer {
    settings: Settings,
}

impl CommandLayer {
    pub fn new(parser: Arc<dyn CommandParser>, cache: Arc<ResultCache>) -> Self {
        Self {
            settings: Settings {
                parser,
                cache,
                adapter: Arc::new(DefaultAdapter::new()),
                send_mode: SendMode::default(),
                skip_for_unmatch: true,
                completion: None,
                need_tome: false,
                remove_tome: false,
                merge_quote: None,
                success_policy: SuccessPolicy::default(),
                block: false,
            },
        }
    }

    pub fn send_mode(mut self, mode: SendMode) -> Self {
        self.settings.send_mode = mode;
        self
    }

    /// With `false`, parse errors are reported like help output instead of
    /// being dropped silently.
    pub fn skip_for_unmatch(mut self, skip: bool) -> Self {
        self.settings.skip_for_unmatch = skip;
        self
    }

    /// Enables interactive completion of incomplete input.
    pub fn completion(mut self, config: CompletionConfig) -> Self {
        self.settings.completion = Some(config);
        self
    }

    /// Only handles messages that start by mentioning the bot. The mention
    /// is removed before parsing.
    pub fn need_tome(mut self, need: bool) -> Self {
        self.settings.need_tome = need;
        self
    }

    /// Removes a leading mention of the bot before parsing.
    pub fn remove_tome(mut self, remove: bool) -> Self {
        self.settings.remove_tome = remove;
        self
    }

    /// Merges the quoted message into the input.
    pub fn merge_quote(mut self, side: QuoteSide) -> Self {
        self.settings.merge_quote = Some(side);
        self
    }

    pub fn adapter(mut self, adapter: Arc<dyn CommandAdapter>) -> Self {
        self.settings.adapter = adapter;
        self
    }

    pub fn success_policy(mut self, policy: SuccessPolicy) -> Self {
        self.settings.success_policy = policy;
        self
    }

    /// Stops propagation to later services once the head matched.
    pub fn block(mut self, block: bool) -> Self {
        self.settings.block = block;
        self
    }

    /// Wraps a handler function directly.
    pub fn handler<F, R, T>(self, handler: F) -> CommandService<HandlerService<F, R, T>>
    where
        F: FromCtxFn<R, T>,
        R: HandlerResponse,
    {
        self.layer(HandlerService::new(handler))
    }
}

impl<S> Layer<S> for CommandLayer {
    type Service = CommandService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CommandService {
            settings: Arc::new(self.settings.clone()),
            inner,
        }
    }
}

/// The service produced by [`CommandLayer`].
pub struct CommandService<S> {
    settings: Arc<Settings>,
    inner: S,
}

impl<S: Clone> Clone for CommandService<S> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<S> Service<Arc<ClaspContext>> for CommandService<S>
where
    S: Service<Arc<ClaspContext>, Response = (), Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, ctx: Arc<ClaspContext>) -> Self::Future {
        let settings = self.settings.clone();
        let mut inner = self.inner.clone();
        let span = debug_span!("command", name = %settings.parser.name());

        async move {
            let Some(result) = settings.resolve(&ctx).await else {
                return Err(EventSkipped.into());
            };

            ctx.set_state(result.clone());
            if settings.block && result.outcome.head_matched {
                ctx.stop_propagation();
            }
            if !result.outcome.matched && result.output.is_none() {
                return Err(EventSkipped.into());
            }

            inner.call(ctx.clone()).await?;

            if result.outcome.matched {
                if let Some(key) = ctx.event().message_id() {
                    settings
                        .cache
                        .notify_success(settings.parser.id(), key, settings.success_policy);
                }
            }
            Ok(())
        }
        .instrument(span)
        .boxed()
    }
}

impl Settings {
    /// Steps 1 to 5: everything up to the published result.
    async fn resolve(&self, ctx: &ClaspContext) -> Option<Arc<CommandResult>> {
        let event = ctx.event();
        if !self.adapter.gate(&**event) {
            return None;
        }
        let mut tokens = extract(event.message()?);

        let self_id = event.self_id().unwrap_or_else(|| ctx.bot().id()).to_string();
        if self.need_tome && !leading_mention(&tokens, &self_id) {
            trace!("Message does not mention the bot");
            return None;
        }
        if self.need_tome || self.remove_tome {
            strip_mention(&mut tokens, &self_id);
        }
        if let (Some(side), Some(quote)) = (self.merge_quote, event.quote()) {
            tokens = merge_quote(tokens, extract(quote), side);
        }

        let resolver = match event.message_id() {
            Some(key) => match self.cache.get_or_create(self.parser.id(), key) {
                Lookup::Existing(waiter) => {
                    trace!(message_id = %key, "Waiting for the dispatch that owns this message");
                    return waiter.wait().await;
                }
                Lookup::Fresh(resolver) => Some(resolver),
            },
            None => None,
        };

        let result = self.run(ctx, tokens).await;
        if let Some(resolver) = resolver {
            resolver.resolve(result.clone());
        }
        result
    }

    async fn run(&self, ctx: &ClaspContext, tokens: Vec<Token>) -> Option<Arc<CommandResult>> {
        let mut outcome = parse_guarded(&*self.parser, &tokens);
        if !outcome.head_matched {
            trace!("Head did not match");
            return None;
        }
        if self.block {
            ctx.stop_propagation();
        }

        if outcome.is_incomplete() {
            if let Some(config) = &self.completion {
                let strip = self.need_tome || self.remove_tome;
                // Whatever the ending, the last outcome goes through the
                // usual disposition below.
                let end =
                    run_session(ctx, &*self.parser, &*self.adapter, config, strip, outcome).await;
                outcome = match end {
                    SessionEnd::Resolved(outcome)
                    | SessionEnd::Cancelled(outcome)
                    | SessionEnd::TimedOut(outcome) => outcome,
                };
            }
        }

        let text = match &outcome.error {
            None => None,
            Some(error) => match error.special_text() {
                Some(text) => Some(text),
                None if self.skip_for_unmatch => {
                    debug!(error = %error, "Input did not match, skipping");
                    return None;
                }
                None => Some(error.to_string()),
            },
        };
        let output_type = text
            .as_ref()
            .and(outcome.error.as_ref())
            .map(|error| error.output_type());

        let mut output = None;
        if let (Some(text), Some(kind)) = (text, output_type) {
            match self.send_mode {
                SendMode::Reply => {
                    if let Err(e) = self.adapter.send(ctx.bot(), &**ctx.event(), kind, &text).await {
                        warn!(error = %e, "Failed to send command output");
                    }
                }
                SendMode::Post => {
                    let event = OutputMessage {
                        command: Arc::from(self.parser.name()),
                        command_id: self.parser.id(),
                        output: text,
                        output_type: kind,
                        source: ctx.event().clone(),
                    };
                    ctx.post(BoxedEvent::new(event)).await;
                }
                SendMode::Stay => output = Some(text),
            }
        }

        Some(Arc::new(CommandResult {
            outcome: Arc::new(outcome),
            output_type,
            output,
            source: ctx.event().clone(),
            command: self.parser.clone(),
            adapter: self.adapter.clone(),
        }))
    }
}

impl std::fmt::Debug for CommandLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandLayer")
            .field("command", &self.settings.parser.name())
            .field("send_mode", &self.settings.send_mode)
            .field("completion", &self.settings.completion.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use clasp_core::Message;
    use tower::ServiceExt;

    use super::*;
    use clasp_core::BoxedBot;

    use crate::command::completion::{EXIT_NOTICE, TIMEOUT_NOTICE};
    use crate::command::extractor::{Arg, Output};
    use crate::command::grammar::{Arg as ArgSpec, ArgKind, Command, CommandBuilder};
    use crate::context::testing::{RecordingBot, TestMessage, context, context_on};
    use crate::dispatcher::Dispatcher;

    crate::param!(Text = "text");
    crate::param!(A = "a");

    fn add() -> Arc<Command> {
        CommandBuilder::new("add")
            .header("/")
            .arg(ArgSpec::new("a", ArgKind::Int))
            .arg(ArgSpec::new("b", ArgKind::Int))
            .build()
            .unwrap()
    }

    fn echo() -> Arc<Command> {
        CommandBuilder::new("echo")
            .header("/")
            .arg(ArgSpec::new("text", ArgKind::Str))
            .description("Repeats the text")
            .build()
            .unwrap()
    }

    fn layer(cmd: &Arc<Command>) -> CommandLayer {
        CommandLayer::new(cmd.clone(), Arc::new(ResultCache::default()))
    }

    fn is_skipped(result: Result<(), BoxError>) -> bool {
        matches!(result, Err(e) if e.is::<EventSkipped>())
    }

    #[tokio::test]
    async fn test_match_runs_handler_with_result() {
        let bot = Arc::new(RecordingBot::default());
        let svc = layer(&echo()).handler(|text: Arg<String, Text>| async move { text.into_inner() });

        let ctx = context(TestMessage::new("1", "/echo hello"), bot.clone());
        svc.oneshot(ctx.clone()).await.unwrap();
        assert_eq!(bot.sent(), vec!["hello".to_string()]);
        assert!(ctx.has_state::<Arc<CommandResult>>());
    }

    #[tokio::test]
    async fn test_head_mismatch_is_silent() {
        let bot = Arc::new(RecordingBot::default());
        for mode in [SendMode::Reply, SendMode::Post, SendMode::Stay] {
            let svc = layer(&echo())
                .send_mode(mode)
                .skip_for_unmatch(false)
                .handler(|| async {});
            let ctx = context(TestMessage::new("1", "/other hello"), bot.clone());
            assert!(is_skipped(svc.oneshot(ctx.clone()).await));
            assert!(!ctx.has_state::<Arc<CommandResult>>());
        }
        assert!(bot.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_is_skipped_unless_reported() {
        let bot = Arc::new(RecordingBot::default());
        let svc = layer(&echo()).handler(|| async {});
        let ctx = context(TestMessage::new("1", "/echo a b"), bot.clone());
        assert!(is_skipped(svc.oneshot(ctx).await));
        assert!(bot.sent().is_empty());

        let svc = layer(&echo()).skip_for_unmatch(false).handler(|| async {});
        let ctx = context(TestMessage::new("2", "/echo a b"), bot.clone());
        assert!(is_skipped(svc.oneshot(ctx).await));
        assert_eq!(bot.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_help_reply_and_stay() {
        let bot = Arc::new(RecordingBot::default());
        let svc = layer(&echo()).handler(|| async {});
        let ctx = context(TestMessage::new("1", "/echo --help"), bot.clone());
        assert!(is_skipped(svc.oneshot(ctx).await));
        assert!(bot.sent()[0].contains("Repeats the text"));

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let svc = layer(&echo())
            .send_mode(SendMode::Stay)
            .handler(move |output: Output| {
                let counter = counter.clone();
                async move {
                    assert!(output.text.is_some_and(|t| t.contains("Repeats the text")));
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
        let ctx = context(TestMessage::new("2", "/echo --help"), bot.clone());
        svc.oneshot(ctx).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(bot.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_mention_gate_and_strip() {
        let bot = Arc::new(RecordingBot::default());
        let svc = layer(&echo())
            .need_tome(true)
            .handler(|text: Arg<String, Text>| async move { text.into_inner() });

        let ctx = context(TestMessage::new("1", "/echo plain"), bot.clone());
        assert!(is_skipped(svc.clone().oneshot(ctx).await));

        let mentioned = Message::new().at("bot").text("/echo hi");
        let ctx = context(TestMessage::new("2", mentioned), bot.clone());
        svc.oneshot(ctx).await.unwrap();
        assert_eq!(bot.sent(), vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn test_quote_is_merged() {
        let bot = Arc::new(RecordingBot::default());
        let svc = layer(&echo())
            .merge_quote(QuoteSide::Right)
            .handler(|text: Arg<String, Text>| async move { text.into_inner() });

        let mut event = TestMessage::new("1", "/echo");
        event.quote = Some(Message::plain("quoted"));
        svc.oneshot(context(event, bot.clone())).await.unwrap();
        assert_eq!(bot.sent(), vec!["quoted".to_string()]);
    }

    #[tokio::test]
    async fn test_block_stops_propagation_after_head_match() {
        let svc = layer(&echo()).block(true).handler(|| async {});
        let ctx = context(TestMessage::new("1", "/echo a b"), Default::default());
        assert!(is_skipped(svc.clone().oneshot(ctx.clone()).await));
        assert!(!ctx.is_propagating());

        let ctx = context(TestMessage::new("2", "/nope"), Default::default());
        assert!(is_skipped(svc.oneshot(ctx.clone()).await));
        assert!(ctx.is_propagating());
    }

    #[tokio::test]
    async fn test_non_message_events_are_gated() {
        let svc = layer(&echo()).handler(|| async {});
        let event = OutputMessage {
            command: Arc::from("echo"),
            command_id: echo().id(),
            output: "/echo hi".into(),
            output_type: crate::command::OutputType::Help,
            source: BoxedEvent::new(TestMessage::new("1", "x")),
        };
        let ctx = context(event, Default::default());
        assert!(is_skipped(svc.oneshot(ctx).await));
    }

    #[tokio::test]
    async fn test_stay_passes_partial_arguments() {
        let bot = Arc::new(RecordingBot::default());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let svc = layer(&add())
            .send_mode(SendMode::Stay)
            .skip_for_unmatch(false)
            .handler(move |output: Output, a: Arg<i64, A>| {
                let counter = counter.clone();
                async move {
                    assert!(output.text.is_some_and(|t| t.contains("<b: int>")));
                    assert_eq!(*a, 1);
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });

        let ctx = context(TestMessage::new("1", "/add 1"), bot.clone());
        svc.oneshot(ctx).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(bot.sent().is_empty());
    }

    async fn exit_completion(skip_for_unmatch: bool) -> Vec<String> {
        let dispatcher = Dispatcher::new();
        let bot = Arc::new(RecordingBot::default());
        let svc = layer(&add())
            .completion(CompletionConfig::default())
            .skip_for_unmatch(skip_for_unmatch)
            .handler(|| async {});
        let ctx = context_on(
            &dispatcher,
            BoxedEvent::new(TestMessage::new("1", "/add 1")),
            bot.clone(),
        );

        let feed = async {
            while dispatcher.interrupts().is_empty() {
                tokio::task::yield_now().await;
            }
            let boxed: BoxedBot = bot.clone();
            let exit = BoxedEvent::new(TestMessage::new("2", ".exit"));
            assert!(dispatcher.dispatch(exit, boxed).await);
        };
        let (result, ()) = tokio::join!(svc.oneshot(ctx), feed);
        assert!(is_skipped(result));
        assert!(dispatcher.interrupts().is_empty());
        bot.sent()
    }

    #[tokio::test]
    async fn test_exited_completion_follows_skip_setting() {
        let sent = exit_completion(true).await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], EXIT_NOTICE);

        let sent = exit_completion(false).await;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1], EXIT_NOTICE);
        assert_eq!(sent[2], "missing required argument(s): <b: int>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_completion_reports_when_asked() {
        let bot = Arc::new(RecordingBot::default());
        let svc = layer(&add())
            .completion(CompletionConfig::default().with_timeout(std::time::Duration::ZERO))
            .skip_for_unmatch(false)
            .handler(|| async {});

        let ctx = context(TestMessage::new("1", "/add 1"), bot.clone());
        assert!(is_skipped(svc.oneshot(ctx).await));
        let sent = bot.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1], TIMEOUT_NOTICE);
        assert!(sent[2].contains("<b: int>"));
    }
}
