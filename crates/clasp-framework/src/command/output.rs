//! The internal event published in post mode.

use std::any::Any;
use std::sync::Arc;

use clasp_core::{BoxedEvent, Event, EventType};

use super::grammar::CommandId;
use super::outcome::OutputType;

/// Command output handed to other listeners instead of being sent.
///
/// Identity accessors forward to the event that triggered the command, so
/// filters keyed on the conversation or the sender keep working.
#[derive(Debug, Clone)]
pub struct OutputMessage {
    pub command: Arc<str>,
    pub command_id: CommandId,
    pub output: String,
    pub output_type: OutputType,
    pub source: BoxedEvent,
}

impl Event for OutputMessage {
    fn event_name(&self) -> &'static str {
        "clasp.output"
    }

    fn platform(&self) -> &'static str {
        "clasp"
    }

    fn event_type(&self) -> EventType {
        EventType::Other
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn session_id(&self) -> Option<&str> {
        self.source.session_id()
    }

    fn sender_id(&self) -> Option<&str> {
        self.source.sender_id()
    }

    fn self_id(&self) -> Option<&str> {
        self.source.self_id()
    }
}
