//! # Clasp Core
//!
//! Foundation layer of the Clasp framework.
//!
//! This crate only defines the vocabulary shared by every other layer:
//!
//! - **Events**: the object-safe [`Event`] trait and its type-erased
//!   [`BoxedEvent`] container
//! - **Messages**: the protocol-agnostic [`Message`] made of [`Segment`]s
//! - **Bots**: the [`Bot`] trait used to reply and to pull profile data
//! - **Errors**: [`ApiError`] returned by bot operations
//!
//! Nothing here knows about commands, parsing or dispatching; those live in
//! `clasp-framework`.

pub mod bot;
pub mod error;
pub mod event;
pub mod message;

pub use bot::{Bot, BoxedBot};
pub use error::{ApiError, ApiResult};
pub use event::{BoxedEvent, Event, EventType};
pub use message::{Message, Segment};
