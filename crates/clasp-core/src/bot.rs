//! Bot trait and related types.
//!
//! A bot is the handle through which handlers talk back to a platform.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::event::Event;
use crate::message::Message;

/// The core Bot trait.
///
/// Adapters implement this for their connection type. Only the operations
/// the dispatch layer needs are part of the trait; protocol-specific APIs
/// belong on the concrete type and are reached through
/// [`as_any`](Bot::as_any).
#[async_trait]
pub trait Bot: Send + Sync + 'static {
    /// Returns the bot's account identifier.
    fn id(&self) -> &str;

    /// Sends a message to the conversation the event came from.
    ///
    /// Returns the platform id of the sent message.
    async fn send(&self, event: &dyn Event, message: &Message) -> ApiResult<String>;

    /// Pulls the display name of a user.
    ///
    /// Returns `Ok(None)` when the platform has no profile data.
    async fn fetch_name(&self, user_id: &str) -> ApiResult<Option<String>> {
        let _ = user_id;
        Ok(None)
    }

    /// Returns self as an `Arc<dyn Any>` for safe downcasting.
    ///
    /// Implementors should simply return `self`.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A shared Bot trait object.
pub type BoxedBot = Arc<dyn Bot>;
