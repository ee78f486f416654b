//! Event system for the Clasp framework.
//!
//! - [`Event`] - object-safe base trait for all events
//! - [`EventType`] - coarse classification used for routing
//! - [`BoxedEvent`] - cheap, clonable, type-erased container
//!
//! Message events expose their content and identity through optional
//! accessors so that the command layer can work with any adapter without
//! knowing its concrete event types.

use std::any::Any;
use std::sync::Arc;

use crate::message::Message;

// ============================================================================
// Event Type Classification
// ============================================================================

/// Classification of event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Chat messages (private, group, channel ...).
    Message,
    /// Notices (member changes, recalls ...).
    Notice,
    /// Requests (friend requests, invitations ...).
    Request,
    /// Meta events (lifecycle, heartbeat ...).
    Meta,
    /// Framework-internal or unknown events.
    Other,
}

// ============================================================================
// Core Event Trait
// ============================================================================

/// The base trait for all events in the Clasp framework.
///
/// Only [`event_name`](Event::event_name), [`platform`](Event::platform) and
/// [`as_any`](Event::as_any) are mandatory. Message events should also
/// override the message accessors; every one of them defaults to `None`.
pub trait Event: Any + Send + Sync {
    /// Returns the human-readable name of this event type.
    fn event_name(&self) -> &'static str;

    /// Returns the platform/adapter name (e.g. `"console"`).
    fn platform(&self) -> &'static str;

    /// Returns the high-level event type classification.
    fn event_type(&self) -> EventType {
        EventType::Other
    }

    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// The message carried by this event, if any.
    fn message(&self) -> Option<&Message> {
        None
    }

    /// Platform identity of the carried message.
    ///
    /// Two deliveries of the same physical message must report the same id;
    /// the command layer uses it to deduplicate work.
    fn message_id(&self) -> Option<&str> {
        None
    }

    /// Identity of the conversation (group, channel, private chat) the event
    /// belongs to.
    fn session_id(&self) -> Option<&str> {
        None
    }

    /// Identity of the user who produced the event.
    fn sender_id(&self) -> Option<&str> {
        None
    }

    /// Identity of the bot account that received the event.
    fn self_id(&self) -> Option<&str> {
        None
    }

    /// The message this one replies to, when the platform provides it.
    fn quote(&self) -> Option<&Message> {
        None
    }
}

// ============================================================================
// Boxed Event
// ============================================================================

/// A type-erased container for events that supports runtime downcasting.
///
/// `BoxedEvent` implements `Deref<Target = dyn Event>`, so trait methods can
/// be called directly:
///
/// ```rust,ignore
/// let event: BoxedEvent = /* ... */;
/// let id = event.message_id();
/// ```
#[derive(Clone)]
pub struct BoxedEvent {
    inner: Arc<dyn Event>,
}

impl BoxedEvent {
    /// Creates a new `BoxedEvent` from any type implementing `Event`.
    pub fn new<E: Event>(event: E) -> Self {
        Self {
            inner: Arc::new(event),
        }
    }

    /// Returns the inner `Arc<dyn Event>`.
    pub fn inner(&self) -> &Arc<dyn Event> {
        &self.inner
    }

    /// Attempts to downcast to a concrete event type.
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.inner.as_any().downcast_ref()
    }

    /// Returns `true` if both handles point at the same event instance.
    pub fn ptr_eq(&self, other: &BoxedEvent) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::ops::Deref for BoxedEvent {
    type Target = dyn Event;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl std::fmt::Debug for BoxedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedEvent")
            .field("event_name", &self.event_name())
            .field("platform", &self.platform())
            .field("message_id", &self.message_id())
            .finish()
    }
}
