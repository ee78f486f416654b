//! Console Bot Example
//!
//! Every line typed on stdin is a chat message from the user `you`; replies
//! are printed to stdout. Words starting with `@` are sent as mentions.
//!
//! ```text
//! > /echo hello there
//! hello there
//! > /add 1
//! (prompt listing the missing `<b: int>`)
//! > .enter 2
//! 3
//! > /greet @alice --loud
//! HELLO, ALICE!
//! > hi
//! Hello, you!
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot
//! ```

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use clasp::core::{ApiResult, BoxedEvent, EventType};
use clasp::framework::command::{CommandParser, OutputMessage, OutputType};
use clasp::prelude::*;
use clasp::runtime::config::ClaspConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

const USER: &str = "you";
const SELF_ID: &str = "clasp";

// ============================================================================
// Console transport
// ============================================================================

struct ConsoleLine {
    id: String,
    message: Message,
}

impl ConsoleLine {
    fn parse(id: u64, line: &str) -> Self {
        let mut message = Message::new();
        let mut text = String::new();
        for word in line.split_whitespace() {
            match word.strip_prefix('@').filter(|name| !name.is_empty()) {
                Some(name) => {
                    if !text.is_empty() {
                        message.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    message.push(Segment::At(name.to_string()));
                }
                None => {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(word);
                }
            }
        }
        if !text.is_empty() {
            message.push(Segment::Text(text));
        }
        Self {
            id: id.to_string(),
            message,
        }
    }
}

impl __Event for ConsoleLine {
    fn event_name(&self) -> &'static str {
        "console.line"
    }

    fn platform(&self) -> &'static str {
        "console"
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
        Some("console")
    }

    fn sender_id(&self) -> Option<&str> {
        Some(USER)
    }

    fn self_id(&self) -> Option<&str> {
        Some(SELF_ID)
    }
}

struct ConsoleBot;

#[async_trait]
impl __Bot for ConsoleBot {
    fn id(&self) -> &str {
        SELF_ID
    }

    async fn send(&self, _event: &dyn __Event, message: &Message) -> ApiResult<String> {
        println!("{}", message.extract_plain_text());
        Ok(String::new())
    }

    async fn fetch_name(&self, user_id: &str) -> ApiResult<Option<String>> {
        Ok(Some(user_id.to_string()))
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// ============================================================================
// Plugins
// ============================================================================

param!(Text = "text");
param!(A = "a");
param!(B = "b");
param!(Loud = "loud");

fn calculator(runtime: &ClaspRuntime) -> Result<Plugin, Box<dyn std::error::Error>> {
    let echo = CommandBuilder::new("echo")
        .header("/")
        .arg(ArgSpec::new("text", ArgKind::Str).multiple())
        .description("Repeats what you say")
        .build()?;

    let add = CommandBuilder::new("add")
        .header("/")
        .alias("plus")
        .arg(ArgSpec::new("a", ArgKind::Int).help("first addend"))
        .arg(ArgSpec::new("b", ArgKind::Int).help("second addend"))
        .description("Adds two integers")
        .example("/add 1 2")
        .shortcut_option(true)
        .build()?;

    Ok(Plugin::new("calculator")
        .schema(CommandSchema(echo.clone()))
        .schema(CommandSchema(add.clone()))
        .service(
            on_message()
                .layer(runtime.on_parsed(echo).send_mode(SendMode::Post))
                .handler(|text: Arg<Vec<String>, Text>| async move {
                    text.into_inner().join(" ")
                }),
        )
        .service(
            on_message()
                .layer(runtime.on_parsed(add))
                .handler(|a: Arg<i64, A>, b: Arg<i64, B>| async move { (*a + *b).to_string() }),
        ))
}

fn greeter(runtime: &ClaspRuntime) -> Result<Plugin, Box<dyn std::error::Error>> {
    let greet = CommandBuilder::new("greet")
        .header("/")
        .arg(ArgSpec::new("target", ArgKind::At).optional())
        .option(Opt::new("loud").short('l').help("shout"))
        .description("Greets someone, or you")
        .shortcut("hi", "/greet")
        .build()?;

    let parser: Arc<dyn CommandParser> = greet.clone();
    Ok(Plugin::new("greeter")
        .schema(CommandSchema(parser.clone()))
        .service(on_message().layer(runtime.on_parsed(parser)).handler(
            |result: Arc<CommandResult>, bot: BoxedBot, loud: Query<bool, Loud>| async move {
                let name = result
                    .fetch_name(&bot, "target")
                    .await
                    .unwrap_or_else(|| USER.to_string());
                let greeting = format!("Hello, {name}!");
                if loud.available {
                    greeting.to_uppercase()
                } else {
                    greeting
                }
            },
        )))
}

/// Relays and logs output that a command layer in post mode publishes.
fn audit() -> Plugin {
    Plugin::new("audit").service(on::<OutputMessage>().handler(
        |out: Event<OutputMessage>| async move {
            if out.output_type == OutputType::Error {
                info!(command = %out.command, "Command reported an error");
            }
            format!("[{}] {}", out.command, out.output)
        },
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ClaspConfig::default();
    config.command.completion = Some(CompletionConfig::default());
    config.command.skip_for_unmatch = false;

    let runtime = Arc::new(
        ClaspRuntime::builder()
            .config(config)
            .build()?,
    );
    runtime.load_plugin(calculator(&runtime)?);
    runtime.load_plugin(greeter(&runtime)?);
    runtime.load_plugin(audit());
    runtime.start()?;

    let bot: BoxedBot = Arc::new(ConsoleBot);
    let ids = AtomicU64::new(0);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        let event = ConsoleLine::parse(ids.fetch_add(1, Ordering::Relaxed), line);
        if runtime.dispatch(BoxedEvent::new(event), bot.clone()).is_none() {
            error!("Runtime stopped, dropping input");
        }
    }

    runtime.stop()?;
    Ok(())
}
