//! Rich elements inside clap argument lists.
//!
//! clap only parses strings, so before parsing every element token is
//! replaced by a unique placeholder (`\x00AT_0`, `\x00IMG_0`, ...). The
//! [`Placeholders`] table produced alongside the argument list maps those
//! placeholders back to their segments once clap is done.

use std::collections::HashMap;

use clasp_core::Segment;

use super::token::Token;
use super::value::{ArgValue, FromArgValue};

/// Prefix used for image placeholder tokens in command argument strings.
pub const IMAGE_PLACEHOLDER_PREFIX: &str = "\x00IMG_";

/// Prefix used for at-mention placeholder tokens in command argument strings.
pub const AT_PLACEHOLDER_PREFIX: &str = "\x00AT_";

/// Prefix used for every other element.
pub const ELEMENT_PLACEHOLDER_PREFIX: &str = "\x00EL_";

/// Maps placeholder tokens to the elements they stand for.
#[derive(Clone, Debug, Default)]
pub struct Placeholders {
    elements: HashMap<String, Segment>,
}

impl Placeholders {
    /// Encodes tokens as clap arguments.
    pub fn encode(tokens: &[Token]) -> (Vec<String>, Placeholders) {
        let mut table = Placeholders::default();
        let args = tokens
            .iter()
            .enumerate()
            .map(|(i, token)| match token {
                Token::Text(s) => s.clone(),
                Token::Element(seg) => {
                    let prefix = match seg {
                        Segment::At(_) => AT_PLACEHOLDER_PREFIX,
                        Segment::Image(_) => IMAGE_PLACEHOLDER_PREFIX,
                        _ => ELEMENT_PLACEHOLDER_PREFIX,
                    };
                    let placeholder = format!("{prefix}{i}");
                    table.elements.insert(placeholder.clone(), seg.clone());
                    placeholder
                }
            })
            .collect();
        (args, table)
    }

    /// Looks up the element behind a placeholder.
    pub fn element(&self, arg: &str) -> Option<&Segment> {
        self.elements.get(arg)
    }

    /// Decodes one clap argument back into a token.
    pub fn decode(&self, arg: &str) -> Token {
        match self.element(arg) {
            Some(seg) => Token::Element(seg.clone()),
            None => Token::Text(arg.to_string()),
        }
    }
}

/// A mentioned user, taken from an argument.
///
/// Dereferences to the user id:
///
/// ```rust,ignore
/// param!(Target = "target");
///
/// async fn kick(target: Match<AtSegment, Target>) {
///     if let Some(user) = target.result {
///         println!("kicking {}", &*user);
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtSegment(String);

impl std::ops::Deref for AtSegment {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for AtSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromArgValue for AtSegment {
    fn from_arg_value(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::At(id) => Some(AtSegment(id.clone())),
            _ => None,
        }
    }
}

/// An image taken from an argument. Dereferences to the image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSegment(String);

impl std::ops::Deref for ImageSegment {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ImageSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromArgValue for ImageSegment {
    fn from_arg_value(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Image(r) => Some(ImageSegment(r.clone())),
            _ => None,
        }
    }
}
