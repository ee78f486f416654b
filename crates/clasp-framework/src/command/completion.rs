//! Interactive completion of incomplete commands.
//!
//! When a command's head matched but required arguments are missing, the
//! layer can open a session with the sender. The session lists the
//! candidates reported by the parser and reads follow-up messages from the
//! same sender in the same conversation:
//!
//! - `.tab [n]` moves the cursor by `n` (default 1)
//! - `.enter [value]` submits `value`, or the selected candidate's default
//! - `.exit` leaves the session
//!
//! Anything else is forwarded as `.enter` content, or rejected, depending on
//! [`RawInput`]. The session's interrupt waiter is released when the
//! session ends, whichever way it ends.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use clasp_core::{BoxedEvent, EventType};

use super::adapter::CommandAdapter;
use super::outcome::{Candidate, OutputType, ParseOutcome};
use super::parser::{CommandParser, parse_guarded};
use super::token::{Token, extract, shell_split, strip_mention};
use crate::context::ClaspContext;

pub const TIMEOUT_NOTICE: &str = "Completion timed out.";
pub const EXIT_NOTICE: &str = "Completion exited.";

/// A session control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    Tab,
    Enter,
    Exit,
}

/// What happens to follow-up messages that are not controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawInput {
    /// Treat them as `.enter` content.
    #[default]
    Forward,
    /// Ignore them and show the selected candidate again.
    Reject,
}

/// Completion session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub tab: String,
    pub enter: String,
    pub exit: String,
    /// How long to wait for each follow-up message.
    pub timeout_ms: u64,
    /// Interrupt priority of the session's waiter. Lower runs first.
    pub priority: i32,
    /// Show only the selected candidate after `.tab`.
    pub hide_tabs: bool,
    /// Controls left out of the prompt footer.
    pub hides: HashSet<Control>,
    /// Controls that are not recognised at all.
    pub disables: HashSet<Control>,
    /// Prompts without the footer.
    pub lite: bool,
    pub raw_input: RawInput,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            tab: ".tab".into(),
            enter: ".enter".into(),
            exit: ".exit".into(),
            timeout_ms: 30_000,
            priority: 10,
            hide_tabs: false,
            hides: HashSet::new(),
            disables: HashSet::new(),
            lite: false,
            raw_input: RawInput::Forward,
        }
    }
}

impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn hide(mut self, control: Control) -> Self {
        self.hides.insert(control);
        self
    }

    pub fn disable(mut self, control: Control) -> Self {
        self.disables.insert(control);
        self
    }

    pub fn raw_input(mut self, policy: RawInput) -> Self {
        self.raw_input = policy;
        self
    }

    fn enabled(&self, control: Control) -> bool {
        !self.disables.contains(&control)
    }

    fn footer(&self) -> Option<String> {
        let visible = |c: Control| self.enabled(c) && !self.hides.contains(&c);
        let mut parts = Vec::new();
        if visible(Control::Tab) {
            parts.push(format!("`{} [n]` to switch", self.tab));
        }
        if visible(Control::Enter) {
            parts.push(format!("`{} [value]` to submit", self.enter));
        }
        if visible(Control::Exit) {
            parts.push(format!("`{}` to exit", self.exit));
        }
        (!parts.is_empty()).then(|| format!("Use {}.", parts.join(", ")))
    }
}

/// A classified follow-up message.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Tab(i64),
    Enter(Option<Vec<Token>>),
    Exit,
    Raw(Vec<Token>),
}

pub fn classify(tokens: Vec<Token>, config: &CompletionConfig) -> Input {
    let head = tokens.first().and_then(Token::as_text);

    if head == Some(config.exit.as_str()) && tokens.len() == 1 && config.enabled(Control::Exit) {
        return Input::Exit;
    }
    if head == Some(config.tab.as_str()) && config.enabled(Control::Tab) {
        match &tokens[1..] {
            [] => return Input::Tab(1),
            [Token::Text(n)] => {
                if let Ok(offset) = n.parse() {
                    return Input::Tab(offset);
                }
            }
            _ => {}
        }
    }
    if head == Some(config.enter.as_str()) && config.enabled(Control::Enter) {
        let content = tokens[1..].to_vec();
        return Input::Enter((!content.is_empty()).then_some(content));
    }
    Input::Raw(tokens)
}

/// Where a session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Resolved,
    Cancelled,
    TimedOut,
}

/// The mutable part of a session.
#[derive(Debug, Clone)]
pub struct CompletionState {
    pub cursor: usize,
    pub candidates: Vec<Candidate>,
    /// The latest incomplete outcome; its tokens are what has been typed.
    pub outcome: ParseOutcome,
    pub state: SessionState,
}

impl CompletionState {
    pub fn new(outcome: ParseOutcome) -> Self {
        let candidates = outcome
            .error
            .as_ref()
            .map(|e| e.candidates().to_vec())
            .unwrap_or_default();
        Self {
            cursor: 0,
            candidates,
            outcome,
            state: SessionState::AwaitingInput,
        }
    }

    /// Moves the cursor, wrapping around in both directions.
    pub fn tab(&mut self, offset: i64) {
        let len = self.candidates.len() as i64;
        if len > 0 {
            // Reduced first: `offset` is user input and may be any i64.
            let step = offset.rem_euclid(len);
            self.cursor = ((self.cursor as i64 + step) % len) as usize;
        }
    }

    pub fn current(&self) -> Option<&Candidate> {
        self.candidates.get(self.cursor)
    }

    pub fn render_current(&self) -> String {
        self.current()
            .map(|c| format!("* {}", c.text))
            .unwrap_or_default()
    }

    pub fn render(&self, config: &CompletionConfig) -> String {
        let mut lines = Vec::new();
        if let Some(err) = &self.outcome.error {
            lines.push(err.to_string());
        }
        for (i, candidate) in self.candidates.iter().enumerate() {
            let marker = if i == self.cursor { '*' } else { ' ' };
            match &candidate.help {
                Some(help) => lines.push(format!("{marker} {}  {help}", candidate.text)),
                None => lines.push(format!("{marker} {}", candidate.text)),
            }
        }
        if !config.lite {
            lines.extend(config.footer());
        }
        lines.join("\n")
    }

    /// The full token sequence to re-parse after an `.enter`.
    pub fn submission(&self, content: Option<Vec<Token>>) -> Result<Vec<Token>, String> {
        let mut tokens = self.outcome.tokens.clone();
        let current = self.current();
        match content {
            Some(content) => {
                if let Some(prefix) = current.and_then(|c| c.prefix.as_deref()) {
                    tokens.extend(shell_split(prefix).into_iter().map(Token::Text));
                }
                tokens.extend(content);
            }
            None => {
                let fill = current
                    .and_then(|c| c.fill.as_deref())
                    .ok_or_else(|| match current {
                        Some(c) => format!("{} has no default value.", c.text),
                        None => "Nothing to enter.".to_string(),
                    })?;
                tokens.extend(shell_split(fill).into_iter().map(Token::Text));
            }
        }
        Ok(tokens)
    }

    /// Takes a new outcome. Returns the message to show, if any.
    ///
    /// A failed outcome leaves the state untouched.
    pub fn advance(&mut self, outcome: ParseOutcome, config: &CompletionConfig) -> Option<String> {
        if outcome.matched {
            self.outcome = outcome;
            self.state = SessionState::Resolved;
            return None;
        }
        if outcome.is_incomplete() {
            *self = CompletionState::new(outcome);
            return Some(self.render(config));
        }
        Some(
            outcome
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Input does not match.".to_string()),
        )
    }
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    Resolved(ParseOutcome),
    /// Left with the exit control; carries the outcome so far.
    Cancelled(ParseOutcome),
    /// No follow-up arrived in time; carries the outcome so far.
    TimedOut(ParseOutcome),
}

/// Runs a completion session for an incomplete `outcome`.
pub(crate) async fn run_session(
    ctx: &ClaspContext,
    parser: &dyn CommandParser,
    adapter: &dyn CommandAdapter,
    config: &CompletionConfig,
    strip_self_mention: bool,
    outcome: ParseOutcome,
) -> SessionEnd {
    let session = ctx.event().session_id().map(str::to_string);
    let sender = ctx.event().sender_id().map(str::to_string);
    let self_id = ctx
        .event()
        .self_id()
        .unwrap_or_else(|| ctx.bot().id())
        .to_string();

    // Registered before the first prompt goes out.
    let mut waiter = ctx
        .interrupts()
        .register(config.priority, move |event: &BoxedEvent| {
            event.event_type() == EventType::Message
                && event.session_id() == session.as_deref()
                && event.sender_id() == sender.as_deref()
        });

    let mut state = CompletionState::new(outcome);
    notify(ctx, adapter, &state.render(config)).await;

    loop {
        let Some(event) = waiter.next(config.timeout()).await else {
            state.state = SessionState::TimedOut;
            debug!(command = %parser.name(), "Completion timed out");
            notify(ctx, adapter, TIMEOUT_NOTICE).await;
            return SessionEnd::TimedOut(state.outcome);
        };

        let mut tokens = event.message().map(extract).unwrap_or_default();
        if strip_self_mention {
            strip_mention(&mut tokens, &self_id);
        }

        let content = match classify(tokens, config) {
            Input::Exit => {
                state.state = SessionState::Cancelled;
                notify(ctx, adapter, EXIT_NOTICE).await;
                return SessionEnd::Cancelled(state.outcome);
            }
            Input::Tab(offset) => {
                state.tab(offset);
                let text = if config.hide_tabs {
                    state.render_current()
                } else {
                    state.render(config)
                };
                notify(ctx, adapter, &text).await;
                continue;
            }
            Input::Enter(content) => content,
            Input::Raw(tokens) if tokens.is_empty() || config.raw_input == RawInput::Reject => {
                notify(ctx, adapter, &state.render_current()).await;
                continue;
            }
            Input::Raw(tokens) => Some(tokens),
        };

        let reply = match state.submission(content) {
            Ok(tokens) => state.advance(parse_guarded(parser, &tokens), config),
            Err(message) => Some(message),
        };
        if state.state == SessionState::Resolved {
            debug!(command = %parser.name(), "Completion resolved");
            return SessionEnd::Resolved(state.outcome);
        }
        if let Some(reply) = reply {
            notify(ctx, adapter, &reply).await;
        }
    }
}

async fn notify(ctx: &ClaspContext, adapter: &dyn CommandAdapter, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Err(e) = adapter
        .send(ctx.bot(), &**ctx.event(), OutputType::Completion, text)
        .await
    {
        warn!(error = %e, "Failed to send completion prompt");
    }
}
