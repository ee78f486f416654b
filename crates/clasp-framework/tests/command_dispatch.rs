//! End-to-end dispatch of chat messages through command layers.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tower::ServiceBuilder;

use clasp_core::{ApiResult, Bot, BoxedBot, BoxedEvent, Event, EventType, Message};
use clasp_framework::command::completion::TIMEOUT_NOTICE;
use clasp_framework::command::extractor::Arg;
use clasp_framework::command::projection::{Provided, Request, project};
use clasp_framework::command::{
    ArgKind, ArgValue, Command, CommandBehaviour, CommandBuilder, CommandConfig, CommandId,
    CommandManager, CommandParser, CommandResult, CommandSchema, CompletionConfig, Output,
    OutputMessage, OutputType, ParseOutcome, SendMode, SuccessPolicy, Token,
};
use clasp_framework::extractor::Event as EventOf;
use clasp_framework::{Dispatcher, Plugin, PluginManager, ServiceBuilderExt, on};
use clasp_framework::param;

param!(A = "a");
param!(B = "b");

#[derive(Clone)]
struct ChatMessage {
    id: String,
    message: Message,
}

impl ChatMessage {
    fn new(id: &str, text: &str) -> BoxedEvent {
        BoxedEvent::new(Self {
            id: id.to_string(),
            message: Message::plain(text),
        })
    }
}

impl Event for ChatMessage {
    fn event_name(&self) -> &'static str {
        "chat.message"
    }

    fn platform(&self) -> &'static str {
        "chat"
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
        Some(&self.id)
    }

    fn session_id(&self) -> Option<&str> {
        Some("general")
    }

    fn sender_id(&self) -> Option<&str> {
        Some("carol")
    }
}

#[derive(Default)]
struct ChatBot {
    sent: Mutex<Vec<String>>,
}

impl ChatBot {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Bot for ChatBot {
    fn id(&self) -> &str {
        "clasp"
    }

    async fn send(&self, _event: &dyn Event, message: &Message) -> ApiResult<String> {
        self.sent.lock().push(message.extract_plain_text());
        Ok(String::new())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Counts how often the wrapped command is parsed.
struct Counting {
    inner: Arc<Command>,
    calls: AtomicUsize,
}

impl CommandParser for Counting {
    fn id(&self) -> CommandId {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn parse(&self, tokens: &[Token]) -> ParseOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.parse(tokens)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn add_command() -> Arc<Command> {
    CommandBuilder::new("add")
        .header("/")
        .arg(clasp_framework::command::Arg::new("a", ArgKind::Int))
        .arg(clasp_framework::command::Arg::new("b", ArgKind::Int))
        .description("Adds two numbers")
        .build()
        .unwrap()
}

struct Harness {
    commands: Arc<CommandManager>,
    plugins: PluginManager,
    bot: Arc<ChatBot>,
}

impl Harness {
    fn new(config: CommandConfig) -> Self {
        let commands = Arc::new(CommandManager::new(config));
        let plugins = PluginManager::new(Dispatcher::new(), HashMap::new());
        plugins.add_behaviour(Arc::new(CommandBehaviour::new(commands.clone())));
        Self {
            commands,
            plugins,
            bot: Arc::new(ChatBot::default()),
        }
    }

    fn dispatcher(&self) -> Dispatcher {
        self.plugins.dispatcher().clone()
    }

    fn adder(&self, name: &'static str, command: Arc<dyn CommandParser>) -> Plugin {
        Plugin::new(name)
            .schema(CommandSchema(command.clone()))
            .service(
                self.commands
                    .on_parsed(command)
                    .handler(|a: Arg<i64, A>, b: Arg<i64, B>| async move {
                        (*a + *b).to_string()
                    }),
            )
    }

    async fn send(&self, id: &str, text: &str) -> bool {
        let bot: BoxedBot = self.bot.clone();
        self.dispatcher().dispatch(ChatMessage::new(id, text), bot).await
    }
}

#[tokio::test]
async fn test_message_is_parsed_once_per_command() {
    let harness = Harness::new(CommandConfig::default());
    let counting = Arc::new(Counting {
        inner: add_command(),
        calls: AtomicUsize::new(0),
    });
    let seen: Arc<Mutex<Vec<Arc<CommandResult>>>> = Arc::default();

    for name in ["first", "second"] {
        let seen = seen.clone();
        let parser: Arc<dyn CommandParser> = counting.clone();
        harness.plugins.load(
            Plugin::new(name).service(harness.commands.on_parsed(parser).handler(
                move |result: Arc<CommandResult>| {
                    let seen = seen.clone();
                    async move { seen.lock().push(result) }
                },
            )),
        );
    }

    assert!(harness.send("m1", "/add 1 2").await);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert!(Arc::ptr_eq(&seen[0], &seen[1]));
    assert_eq!(seen[0].outcome.main_args["a"], ArgValue::Int(1));
}

#[tokio::test]
async fn test_unrelated_messages_are_silent() {
    let harness = Harness::new(CommandConfig {
        skip_for_unmatch: false,
        ..Default::default()
    });
    harness.plugins.load(harness.adder("adder", add_command()));

    assert!(!harness.send("m1", "/sub 1 2").await);
    assert!(!harness.send("m2", "hello there").await);
    assert!(harness.bot.sent().is_empty());

    assert!(harness.send("m3", "/add 1 2").await);
    assert_eq!(harness.bot.sent(), vec!["3".to_string()]);
}

#[tokio::test]
async fn test_help_follows_send_mode() {
    // Reply
    let harness = Harness::new(CommandConfig::default());
    harness.plugins.load(harness.adder("adder", add_command()));
    assert!(!harness.send("m1", "/add --help").await);
    assert_eq!(harness.bot.sent().len(), 1);
    assert!(harness.bot.sent()[0].contains("Adds two numbers"));

    // Post
    let harness = Harness::new(CommandConfig {
        send_mode: SendMode::Post,
        ..Default::default()
    });
    harness.plugins.load(harness.adder("adder", add_command()));
    let posted: Arc<Mutex<Vec<(String, OutputType)>>> = Arc::default();
    let sink = posted.clone();
    harness.plugins.load(Plugin::new("listener").service(on::<OutputMessage>().handler(
        move |out: EventOf<OutputMessage>| {
            let sink = sink.clone();
            async move { sink.lock().push((out.output.clone(), out.output_type)) }
        },
    )));
    harness.send("m1", "/add --help").await;
    assert!(harness.bot.sent().is_empty());
    let posted = posted.lock();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].1, OutputType::Help);

    // Stay
    let harness = Harness::new(CommandConfig {
        send_mode: SendMode::Stay,
        ..Default::default()
    });
    let command = add_command();
    harness.plugins.load(
        Plugin::new("adder").service(harness.commands.on_parsed(command).handler(
            |output: Output| async move { output.text.map(|text| format!("kept: {}", text.len())) },
        )),
    );
    harness.send("m1", "/add --help").await;
    let sent = harness.bot.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("kept: "));
}

#[tokio::test]
async fn test_completion_round_trip() {
    let harness = Harness::new(CommandConfig {
        completion: Some(CompletionConfig::default()),
        ..Default::default()
    });
    harness.plugins.load(harness.adder("adder", add_command()));

    let dispatcher = harness.dispatcher();
    let bot: BoxedBot = harness.bot.clone();
    let pending = tokio::spawn(dispatcher.dispatch(ChatMessage::new("m1", "/add 1"), bot));

    while dispatcher.interrupts().is_empty() {
        tokio::task::yield_now().await;
    }
    assert!(harness.send("m2", ".enter 2").await);
    assert!(pending.await.unwrap());

    let sent = harness.bot.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].contains("<b: int>"));
    assert_eq!(sent[1], "3");
    assert!(dispatcher.interrupts().is_empty());
}

#[tokio::test]
async fn test_completion_times_out() {
    let harness = Harness::new(CommandConfig {
        completion: Some(CompletionConfig::default().with_timeout(Duration::ZERO)),
        ..Default::default()
    });
    harness.plugins.load(harness.adder("adder", add_command()));

    assert!(!harness.send("m1", "/add 1").await);
    let sent = harness.bot.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1], TIMEOUT_NOTICE);
    assert!(harness.dispatcher().interrupts().is_empty());
}

#[tokio::test]
async fn test_projection_of_published_result() {
    let harness = Harness::new(CommandConfig::default());
    let captured: Arc<Mutex<Option<Arc<CommandResult>>>> = Arc::default();
    let sink = captured.clone();
    harness.plugins.load(Plugin::new("adder").service(
        ServiceBuilder::new()
            .layer(harness.commands.on_parsed(add_command()))
            .handler(move |result: Arc<CommandResult>| {
                let sink = sink.clone();
                async move { *sink.lock() = Some(result) }
            }),
    ));

    harness.send("m1", "/add 4 5").await;
    let result = captured.lock().clone().unwrap();
    assert!(matches!(
        project(&result, &Request::Match("b")),
        Some(Provided::Value(ArgValue::Int(5)))
    ));
    assert!(project(&result, &Request::Match("c")).is_none());
    assert_eq!(result.query::<i64>("a"), Some(4));
}

#[tokio::test]
async fn test_reload_drops_cached_results() {
    let harness = Harness::new(CommandConfig::default());
    let command = add_command();
    let id = command.id();

    harness.plugins.load(harness.adder("adder", command.clone()));
    harness.send("m1", "/add 1 2").await;
    assert_eq!(harness.commands.cache().len(id), 1);

    harness.plugins.load(harness.adder("adder", command.clone()));
    assert_eq!(harness.commands.cache().len(id), 0);
    assert_eq!(harness.commands.len(), 1);

    harness.plugins.unload("adder");
    assert!(harness.commands.is_empty());
}

#[tokio::test]
async fn test_success_policy_entry_forgets_handled_message() {
    let harness = Harness::new(CommandConfig {
        success_policy: SuccessPolicy::Entry,
        ..Default::default()
    });
    let command = add_command();
    harness.plugins.load(harness.adder("adder", command.clone()));

    harness.send("m1", "/add 1 2").await;
    assert_eq!(harness.commands.cache().len(command.id()), 0);

    harness.send("m2", "/add 1").await;
    assert_eq!(harness.commands.cache().len(command.id()), 1);
}
