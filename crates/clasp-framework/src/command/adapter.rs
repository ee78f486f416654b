//! Platform strategy used by the command layer.
//!
//! A [`CommandAdapter`] is chosen once when a [`CommandLayer`] is built and
//! never swapped afterwards. It decides which events the layer looks at, how
//! command output reaches the chat and how user names are looked up.
//!
//! [`CommandLayer`]: super::layer::CommandLayer

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use clasp_core::{ApiResult, BoxedBot, Event, EventType, Message};

use super::outcome::OutputType;

/// Turns command output into a chat message.
pub type Converter = Arc<dyn Fn(OutputType, &str) -> Message + Send + Sync>;

#[async_trait]
pub trait CommandAdapter: Send + Sync + 'static {
    /// Delivers command output to the conversation of `event`.
    async fn send(
        &self,
        bot: &BoxedBot,
        event: &dyn Event,
        kind: OutputType,
        text: &str,
    ) -> ApiResult<()>;

    /// Looks up a user's display name.
    async fn fetch_name(&self, bot: &BoxedBot, user_id: &str) -> Option<String>;

    /// Returns `false` for events the layer must not touch.
    fn gate(&self, event: &dyn Event) -> bool {
        event.event_type() == EventType::Message
    }
}

/// Sends plain text through [`Bot::send`](clasp_core::Bot::send).
#[derive(Clone, Default)]
pub struct DefaultAdapter {
    converter: Option<Converter>,
}

impl DefaultAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the plain-text conversion of outgoing output.
    pub fn with_converter(
        converter: impl Fn(OutputType, &str) -> Message + Send + Sync + 'static,
    ) -> Self {
        Self {
            converter: Some(Arc::new(converter)),
        }
    }
}

#[async_trait]
impl CommandAdapter for DefaultAdapter {
    async fn send(
        &self,
        bot: &BoxedBot,
        event: &dyn Event,
        kind: OutputType,
        text: &str,
    ) -> ApiResult<()> {
        let message = match &self.converter {
            Some(convert) => convert(kind, text),
            None => Message::plain(text),
        };
        bot.send(event, &message).await?;
        Ok(())
    }

    async fn fetch_name(&self, bot: &BoxedBot, user_id: &str) -> Option<String> {
        match bot.fetch_name(user_id).await {
            Ok(name) => name,
            Err(e) => {
                debug!(user = %user_id, error = %e, "Failed to fetch user name");
                None
            }
        }
    }
}

impl std::fmt::Debug for DefaultAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultAdapter")
            .field("converter", &self.converter.is_some())
            .finish()
    }
}
