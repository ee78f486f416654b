//! Token source: chat messages to parser tokens and back.
//!
//! Text segments are split with shell-like rules; rich elements (mentions,
//! images, anything else) pass through untouched as [`Token::Element`].
//! Nothing here can fail.

use serde::{Deserialize, Serialize};

use clasp_core::{Message, Segment};

/// One unit of parser input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A literal text fragment.
    Text(String),
    /// An opaque rich element.
    Element(Segment),
}

impl Token {
    pub fn text(text: impl Into<String>) -> Self {
        Token::Text(text.into())
    }

    /// Returns the literal text of a text token.
    pub fn as_text(&self) -> Option<&str> {
        to_text(self)
    }

    /// Returns `true` if this is a mention of `user_id`.
    pub fn is_mention_of(&self, user_id: &str) -> bool {
        matches!(self, Token::Element(Segment::At(id)) if id == user_id)
    }
}

impl From<&str> for Token {
    fn from(text: &str) -> Self {
        Token::Text(text.to_string())
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Text(s) => write!(f, "{s}"),
            Token::Element(seg) => write!(f, "{seg}"),
        }
    }
}

/// Where quoted content goes relative to the message's own tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSide {
    /// Quote first, then the message.
    Left,
    /// Message first, then the quote.
    Right,
}

/// Simple shell-like argument splitting for plain text.
///
/// Handles:
/// - Space-separated arguments
/// - Quoted strings (single and double quotes)
/// - Escape sequences within double quotes
pub fn shell_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;
    // An empty pair of quotes is still an argument.
    let mut quoted = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_double_quote => {
                escape_next = true;
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                quoted = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                quoted = true;
            }
            c if c.is_whitespace() && !in_single_quote && !in_double_quote => {
                if !current.is_empty() || quoted {
                    args.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if !current.is_empty() || quoted {
        args.push(current);
    }

    args
}

/// Converts a message into tokens.
///
/// A segment boundary always acts as a word break, so text in separate
/// segments is never concatenated.
pub fn extract(message: &Message) -> Vec<Token> {
    let mut tokens = Vec::new();
    for seg in message.iter() {
        match seg {
            Segment::Text(text) => tokens.extend(shell_split(text).into_iter().map(Token::Text)),
            other => tokens.push(Token::Element(other.clone())),
        }
    }
    tokens
}

/// Text projection of a token, used when rendering prompts.
pub fn to_text(token: &Token) -> Option<&str> {
    match token {
        Token::Text(s) => Some(s),
        Token::Element(_) => None,
    }
}

/// Builds a message from tokens.
///
/// Adjacent text tokens are joined with single spaces into one text segment;
/// elements become their own segments.
pub fn wrap(tokens: &[Token]) -> Message {
    let mut message = Message::new();
    let mut text = String::new();
    for token in tokens {
        match token {
            Token::Text(s) => {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(s);
            }
            Token::Element(seg) => {
                if !text.is_empty() {
                    message.push(Segment::Text(std::mem::take(&mut text)));
                }
                message.push(seg.clone());
            }
        }
    }
    if !text.is_empty() {
        message.push(Segment::Text(text));
    }
    message
}

/// Renders tokens as a single line of text.
pub fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns `true` if the first token mentions `self_id`.
pub fn leading_mention(tokens: &[Token], self_id: &str) -> bool {
    tokens.first().is_some_and(|t| t.is_mention_of(self_id))
}

/// Removes a leading mention of `self_id`. Returns whether one was removed.
pub fn strip_mention(tokens: &mut Vec<Token>, self_id: &str) -> bool {
    let found = leading_mention(tokens, self_id);
    if found {
        tokens.remove(0);
    }
    found
}

/// Merges the tokens of a quoted message into the message's own tokens.
pub fn merge_quote(tokens: Vec<Token>, quote: Vec<Token>, side: QuoteSide) -> Vec<Token> {
    match side {
        QuoteSide::Left => quote.into_iter().chain(tokens).collect(),
        QuoteSide::Right => tokens.into_iter().chain(quote).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_split_simple() {
        assert_eq!(shell_split("/echo hello world"), vec!["/echo", "hello", "world"]);
    }

    #[test]
    fn test_shell_split_quoted() {
        let args = shell_split(r#"/echo "hello world" 'it''s' "a\"b""#);
        assert_eq!(args, vec!["/echo", "hello world", "its", "a\"b"]);
    }

    #[test]
    fn test_shell_split_keeps_empty_quotes() {
        assert_eq!(shell_split(r#"say "" now"#), vec!["say", "", "now"]);
    }

    #[test]
    fn test_shell_split_whitespace_only() {
        assert!(shell_split("  \t\n ").is_empty());
    }

    #[test]
    fn test_extract_mixed_segments() {
        let msg = Message::new()
            .text("/kick ")
            .at("12345")
            .text(" reason")
            .image("a.png");
        let tokens = extract(&msg);
        assert_eq!(
            tokens,
            vec![
                Token::text("/kick"),
                Token::Element(Segment::At("12345".into())),
                Token::text("reason"),
                Token::Element(Segment::Image("a.png".into())),
            ]
        );
    }

    #[test]
    fn test_extract_segment_boundary_breaks() {
        let msg = Message::new().text("/echo").text("hello");
        assert_eq!(extract(&msg), vec![Token::text("/echo"), Token::text("hello")]);
    }

    #[test]
    fn test_unknown_elements_pass_through() {
        let face = Segment::Other {
            kind: "face".into(),
            data: "14".into(),
        };
        let msg = Message::new().text("hi").with(face.clone());
        assert_eq!(extract(&msg)[1], Token::Element(face));
        assert_eq!(to_text(&extract(&msg)[1]), None);
    }

    #[test]
    fn test_wrap_joins_text_runs() {
        let tokens = vec![
            Token::text("a"),
            Token::text("b"),
            Token::Element(Segment::At("1".into())),
            Token::text("c"),
        ];
        let msg = wrap(&tokens);
        assert_eq!(
            msg.into_segments(),
            vec![
                Segment::Text("a b".into()),
                Segment::At("1".into()),
                Segment::Text("c".into()),
            ]
        );
    }

    #[test]
    fn test_strip_mention_only_when_leading() {
        let mut tokens = extract(&Message::new().at("bot").text("echo hi"));
        assert!(strip_mention(&mut tokens, "bot"));
        assert_eq!(tokens, vec![Token::text("echo"), Token::text("hi")]);
        assert!(!strip_mention(&mut tokens, "bot"));

        let mut tokens = extract(&Message::new().text("echo ").at("bot"));
        assert!(!strip_mention(&mut tokens, "bot"));
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_merge_quote_sides() {
        let own = vec![Token::text("translate")];
        let quote = vec![Token::text("bonjour")];
        assert_eq!(
            merge_quote(own.clone(), quote.clone(), QuoteSide::Right),
            vec![Token::text("translate"), Token::text("bonjour")]
        );
        assert_eq!(
            merge_quote(own, quote, QuoteSide::Left),
            vec![Token::text("bonjour"), Token::text("translate")]
        );
    }
}
