//! Message types for the Clasp framework.
//!
//! A [`Message`] is an ordered list of [`Segment`]s. Plain text is only one
//! kind of segment; mentions, images and anything a platform invents travel
//! alongside it so that command parsing can treat them as opaque values.

use std::fmt::{self, Display};
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

// ============================================================================
// Segment
// ============================================================================

/// A platform-agnostic message segment.
///
/// Adapters convert their native elements into these variants. Elements that
/// have no dedicated variant are kept as [`Segment::Other`] so they can pass
/// through the command parser untouched instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text content.
    Text(String),
    /// An image, identified by a platform-specific reference string
    /// (file path, URL, base64, ...).
    Image(String),
    /// A user mention, identified by the user id.
    At(String),
    /// Any other element, kept verbatim.
    Other { kind: String, data: String },
}

impl Segment {
    /// Creates a text segment.
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text(text.into())
    }

    /// Returns the type identifier of this segment (`"text"`, `"image"`, ...).
    pub fn kind(&self) -> &str {
        match self {
            Segment::Text(_) => "text",
            Segment::Image(_) => "image",
            Segment::At(_) => "at",
            Segment::Other { kind, .. } => kind,
        }
    }

    /// Returns the text content if this is a text segment.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Segment::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the mentioned user id if this is a mention.
    pub fn as_at(&self) -> Option<&str> {
        match self {
            Segment::At(id) => Some(id),
            _ => None,
        }
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Text(s) => write!(f, "{s}"),
            Segment::Image(r) => write!(f, "[Image: {r}]"),
            Segment::At(id) => write!(f, "@{id}"),
            Segment::Other { kind, data } => write!(f, "[{kind}: {data}]"),
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// A message composed of [`Segment`]s.
///
/// Dereferences to `[Segment]`, so slice methods such as `first()` or
/// `iter()` work directly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message {
    segments: Vec<Segment>,
}

impl Message {
    /// Creates a new empty message.
    pub const fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Creates a message holding a single text segment.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new().text(text)
    }

    /// Adds a text segment (builder pattern).
    pub fn text(self, text: impl Into<String>) -> Self {
        self.with(Segment::Text(text.into()))
    }

    /// Adds an at-mention segment (builder pattern).
    pub fn at(self, id: impl Into<String>) -> Self {
        self.with(Segment::At(id.into()))
    }

    /// Adds an image segment (builder pattern).
    pub fn image(self, reference: impl Into<String>) -> Self {
        self.with(Segment::Image(reference.into()))
    }

    /// Consumes the message and adds a segment (builder pattern).
    pub fn with(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Adds a segment to the end of the message.
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Concatenates the content of all text segments, ignoring other kinds.
    pub fn extract_plain_text(&self) -> String {
        self.iter().filter_map(Segment::as_text).collect()
    }

    /// Consumes the message and returns the inner segments.
    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }
}

impl Deref for Message {
    type Target = [Segment];

    fn deref(&self) -> &Self::Target {
        &self.segments
    }
}

impl DerefMut for Message {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.segments
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<Vec<Segment>> for Message {
    fn from(segments: Vec<Segment>) -> Self {
        Self { segments }
    }
}

impl From<Segment> for Message {
    fn from(segment: Segment) -> Self {
        Self {
            segments: vec![segment],
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::plain(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::plain(text)
    }
}

impl FromIterator<Segment> for Message {
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_plain_text() {
        let msg = Message::new().at("42").text("hello ").image("a.png").text("world");
        assert_eq!(msg.len(), 4);
        assert_eq!(msg.extract_plain_text(), "hello world");
        assert_eq!(msg.to_string(), "@42hello [Image: a.png]world");
    }

    #[test]
    fn test_segment_kind() {
        assert_eq!(Segment::text("x").kind(), "text");
        assert_eq!(
            Segment::Other {
                kind: "face".into(),
                data: "1".into()
            }
            .kind(),
            "face"
        );
        assert_eq!(Segment::At("7".into()).as_at(), Some("7"));
    }

    #[test]
    fn test_serde_shape() {
        let msg = Message::plain("hi").at("1");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"[{"type":"text","data":"hi"},{"type":"at","data":"1"}]"#
        );
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
