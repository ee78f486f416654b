//! Context types for the Clasp framework.
//!
//! - [`BaseContext`]: the **shared** base for one dispatch cycle. A single
//!   `Arc<BaseContext>` is created per incoming event and handed to every
//!   plugin. It holds the event, the bot, the propagation flag and a handle
//!   back to the dispatcher.
//!
//! - [`PluginContext`]: **plugin-specific** data: the plugin's name, its
//!   config section and an isolated state map.
//!
//! - [`ClaspContext`]: the full context handed to services and handlers,
//!   combining the two. Stopping propagation writes through to the shared
//!   base; state stays private to the plugin.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;

use clasp_core::{BoxedBot, BoxedEvent};

use crate::dispatcher::Dispatcher;
use crate::interrupt::Interrupts;

// =============================================================================
// BaseContext: shared base, one per dispatch cycle
// =============================================================================

/// The shared base context for a single event dispatch cycle.
pub struct BaseContext {
    event: BoxedEvent,
    bot: BoxedBot,
    dispatcher: Dispatcher,
    /// Cleared by any service that calls [`ClaspContext::stop_propagation`].
    is_propagating: AtomicBool,
}

impl BaseContext {
    pub(crate) fn new(event: BoxedEvent, bot: BoxedBot, dispatcher: Dispatcher) -> Self {
        Self {
            event,
            bot,
            dispatcher,
            is_propagating: AtomicBool::new(true),
        }
    }

    pub(crate) fn is_propagating(&self) -> bool {
        self.is_propagating.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_propagation(&self) {
        self.is_propagating.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for BaseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseContext")
            .field("event", &self.event)
            .field("is_propagating", &self.is_propagating())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// PluginContext: per-plugin data, one per plugin per dispatch
// =============================================================================

/// Plugin-specific data carried alongside the shared [`BaseContext`].
#[derive(Debug)]
pub struct PluginContext {
    name: String,
    config: Arc<Value>,
    state: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl PluginContext {
    pub(crate) fn new(name: &str, config: Arc<Value>) -> Self {
        Self {
            name: name.to_string(),
            config,
            state: Mutex::new(HashMap::new()),
        }
    }
}

// =============================================================================
// ClaspContext: full context, handed to services
// =============================================================================

/// The full context object passed to services and handlers.
///
/// # Example
///
/// ```rust,ignore
/// async fn handle(ctx: Arc<ClaspContext>) {
///     ctx.set_state(42u32);             // isolated to this plugin
///     ctx.stop_propagation();           // no further services will run
///     ctx.bot().send(&**ctx.event(), &"hi".into()).await.ok();
/// }
/// ```
#[derive(Debug)]
pub struct ClaspContext {
    base: Arc<BaseContext>,
    plugin: PluginContext,
}

impl ClaspContext {
    pub(crate) fn new(base: Arc<BaseContext>, plugin: PluginContext) -> Self {
        Self { base, plugin }
    }

    // ─── Shared base delegation ───────────────────────────────────────────────

    /// Returns the event being dispatched.
    pub fn event(&self) -> &BoxedEvent {
        &self.base.event
    }

    /// Returns the bot that received the event.
    pub fn bot(&self) -> &BoxedBot {
        &self.base.bot
    }

    /// Returns a clone of the bot `Arc`.
    pub fn bot_arc(&self) -> BoxedBot {
        self.base.bot.clone()
    }

    /// Stops propagation of this event to subsequent services and plugins.
    pub fn stop_propagation(&self) {
        self.base.stop_propagation();
    }

    /// Returns `true` if the event is still propagating.
    pub fn is_propagating(&self) -> bool {
        self.base.is_propagating()
    }

    /// Publishes an internal event to every plugin of the dispatcher that
    /// delivered this one, using the same bot.
    ///
    /// Resolves once all listeners have run; `true` if any service accepted
    /// the event.
    pub fn post(&self, event: BoxedEvent) -> BoxFuture<'static, bool> {
        self.base.dispatcher.dispatch(event, self.bot_arc())
    }

    /// Interrupt waiters of the dispatcher that delivered this event.
    pub fn interrupts(&self) -> &Interrupts {
        self.base.dispatcher.interrupts()
    }

    // ─── Plugin state ─────────────────────────────────────────────────────────

    /// Stores a value in this plugin's isolated state map.
    ///
    /// Only one value per type can be stored; subsequent calls overwrite.
    pub fn set_state<T: Send + Sync + 'static>(&self, value: T) {
        self.plugin
            .state
            .lock()
            .insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a cloned value from this plugin's state map.
    pub fn get_state<T: Clone + 'static>(&self) -> Option<T> {
        self.plugin
            .state
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Returns `true` if a value of type `T` exists in this plugin's state.
    pub fn has_state<T: 'static>(&self) -> bool {
        self.plugin.state.lock().contains_key(&TypeId::of::<T>())
    }

    /// Removes and returns a value from this plugin's state.
    pub fn take_state<T: 'static>(&self) -> Option<T> {
        self.plugin
            .state
            .lock()
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    // ─── Plugin-specific ──────────────────────────────────────────────────────

    /// Returns the name of the currently executing plugin.
    pub fn plugin_name(&self) -> &str {
        &self.plugin.name
    }

    /// Returns the plugin's config section (or `null`).
    pub fn plugin_config(&self) -> Arc<Value> {
        self.plugin.config.clone()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers shared by unit tests across the crate.

    use std::any::Any;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use clasp_core::{ApiResult, Bot, BoxedBot, BoxedEvent, Event, EventType, Message};

    use super::*;

    /// A message event with every identity field settable.
    #[derive(Debug, Clone, Default)]
    pub struct TestMessage {
        pub message: Message,
        pub message_id: Option<String>,
        pub session_id: Option<String>,
        pub sender_id: Option<String>,
        pub quote: Option<Message>,
    }

    impl TestMessage {
        pub fn new(id: &str, message: impl Into<Message>) -> Self {
            Self {
                message: message.into(),
                message_id: Some(id.to_string()),
                session_id: Some("room".into()),
                sender_id: Some("alice".into()),
                quote: None,
            }
        }
    }

    impl Event for TestMessage {
        fn event_name(&self) -> &'static str {
            "test.message"
        }

        fn platform(&self) -> &'static str {
            "test"
        }

        fn event_type(&self) -> EventType {
            EventType::Message
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn message(&self) -> Option<&Message> {
            Some(&self.message)
        }

        fn message_id(&self) -> Option<&str> {
            self.message_id.as_deref()
        }

        fn session_id(&self) -> Option<&str> {
            self.session_id.as_deref()
        }

        fn sender_id(&self) -> Option<&str> {
            self.sender_id.as_deref()
        }

        fn self_id(&self) -> Option<&str> {
            Some("bot")
        }

        fn quote(&self) -> Option<&Message> {
            self.quote.as_ref()
        }
    }

    /// A bot that records every sent message.
    #[derive(Default)]
    pub struct RecordingBot {
        pub sent: Mutex<Vec<String>>,
    }

    impl RecordingBot {
        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Bot for RecordingBot {
        fn id(&self) -> &str {
            "bot"
        }

        async fn send(&self, _event: &dyn Event, message: &Message) -> ApiResult<String> {
            let mut sent = self.sent.lock();
            sent.push(message.extract_plain_text());
            Ok(sent.len().to_string())
        }

        async fn fetch_name(&self, user_id: &str) -> ApiResult<Option<String>> {
            Ok(Some(format!("name-of-{user_id}")))
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    /// Builds a standalone context for `event` on a fresh dispatcher.
    pub fn context(event: impl Event, bot: Arc<RecordingBot>) -> Arc<ClaspContext> {
        context_on(&Dispatcher::new(), BoxedEvent::new(event), bot)
    }

    pub fn context_on(
        dispatcher: &Dispatcher,
        event: BoxedEvent,
        bot: Arc<RecordingBot>,
    ) -> Arc<ClaspContext> {
        let bot: BoxedBot = bot;
        let base = Arc::new(BaseContext::new(event, bot, dispatcher.clone()));
        Arc::new(ClaspContext::new(
            base,
            PluginContext::new("test", Arc::new(Value::Null)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;

    #[test]
    fn test_state_roundtrip_and_take() {
        let ctx = context(TestMessage::new("1", "hi"), Default::default());
        assert!(!ctx.has_state::<u32>());
        ctx.set_state(7u32);
        assert_eq!(ctx.get_state::<u32>(), Some(7));
        assert_eq!(ctx.take_state::<u32>(), Some(7));
        assert!(!ctx.has_state::<u32>());
    }

    #[test]
    fn test_stop_propagation_writes_through() {
        let ctx = context(TestMessage::new("1", "hi"), Default::default());
        assert!(ctx.is_propagating());
        ctx.stop_propagation();
        assert!(!ctx.is_propagating());
    }
}
