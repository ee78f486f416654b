//! Filters and helpers built on the published result and the raw message.
//!
//! The filters return closures for
//! [`rule_sync`](crate::handler::ServiceBuilderExt::rule_sync):
//!
//! ```rust,ignore
//! let svc = ServiceBuilder::new()
//!     .layer(commands.on_parsed(admin.clone()))
//!     .rule_sync(match_path("kick"))
//!     .rule_sync(check_account("kick.target").not())
//!     .handler(kick);
//! ```

use std::sync::Arc;

use regex::Regex;

use clasp_core::{Message, Segment};

use super::adapter::{CommandAdapter, DefaultAdapter};
use super::projection::CommandResult;
use super::value::ArgValue;
use crate::context::ClaspContext;
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::FromContext;

/// A filter closure for `rule_sync`.
pub trait ContextFilter: Fn(&ClaspContext) -> bool + Clone + Send + Sync + 'static {
    /// Inverts the filter.
    fn not(self) -> impl ContextFilter {
        move |ctx: &ClaspContext| !self(ctx)
    }
}

impl<F> ContextFilter for F where F: Fn(&ClaspContext) -> bool + Clone + Send + Sync + 'static {}

fn published(ctx: &ClaspContext) -> Option<Arc<CommandResult>> {
    ctx.get_state::<Arc<CommandResult>>()
}

/// Passes when `path` resolves.
///
/// `$main` passes when no option or subcommand matched.
pub fn match_path(path: impl Into<String>) -> impl ContextFilter {
    let path = path.into();
    move |ctx: &ClaspContext| {
        let Some(result) = published(ctx) else {
            return false;
        };
        if path == "$main" {
            return !result.outcome.has_components();
        }
        result.outcome.query(&path).is_some()
    }
}

/// Passes when `path` resolves to `value`, or when it does not resolve at
/// all and `or_not` is set.
pub fn match_value(path: impl Into<String>, value: impl Into<ArgValue>, or_not: bool) -> impl ContextFilter {
    assign(path, Some(value.into()), or_not)
}

/// Combined form of [`match_path`] and [`match_value`].
///
/// With `value` the resolved value must equal it; without, resolving is
/// enough. `or_not` also lets unresolved paths through.
pub fn assign(path: impl Into<String>, value: Option<ArgValue>, or_not: bool) -> impl ContextFilter {
    let path = path.into();
    move |ctx: &ClaspContext| {
        let Some(result) = published(ctx) else {
            return false;
        };
        if path == "$main" {
            return !result.outcome.has_components();
        }
        match (result.outcome.query(&path), &value) {
            (Some(found), Some(expected)) => found == *expected,
            (Some(_), None) => true,
            (None, _) => or_not,
        }
    }
}

/// Passes when `path` resolves to the bot's own account.
pub fn check_account(path: impl Into<String>) -> impl ContextFilter {
    let path = path.into();
    move |ctx: &ClaspContext| {
        let Some(result) = published(ctx) else {
            return false;
        };
        let self_id = ctx.event().self_id().unwrap_or_else(|| ctx.bot().id());
        match result.outcome.query(&path) {
            Some(ArgValue::At(id) | ArgValue::Str(id)) => id == self_id,
            _ => false,
        }
    }
}

/// Resolves a display name through the published result; see
/// [`CommandResult::fetch_name`]. Without a result the sender's name is
/// looked up.
pub async fn fetch_name(ctx: &ClaspContext, path: &str) -> Option<String> {
    match published(ctx) {
        Some(result) => result.fetch_name(ctx.bot(), path).await,
        None => {
            let sender = ctx.event().sender_id()?;
            DefaultAdapter::new().fetch_name(ctx.bot(), sender).await
        }
    }
}

// ============================================================================
// Prefix / suffix filters
// ============================================================================

/// What [`startswith`] and [`endswith`] look for.
#[derive(Debug, Clone)]
pub enum Affix {
    /// Any of several words.
    Literal(Vec<String>),
    /// A pattern, anchored at the matching end.
    Regex { prefix: Regex, suffix: Regex },
    /// A mention of one user.
    At(String),
}

impl Affix {
    /// Words separated by `|`.
    pub fn literal(words: &str) -> Self {
        Affix::Literal(words.split('|').map(str::to_string).collect())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Affix::Regex {
            prefix: Regex::new(&format!("^(?:{pattern})"))?,
            suffix: Regex::new(&format!("(?:{pattern})$"))?,
        })
    }

    pub fn at(user_id: impl Into<String>) -> Self {
        Affix::At(user_id.into())
    }

    fn strip_prefix(&self, message: &Message) -> Option<(String, Message)> {
        let (first, rest) = message.split_first()?;
        let (matched, remainder) = match (self, first) {
            (Affix::At(id), Segment::At(user)) if id == user => (format!("@{id}"), None),
            (Affix::Literal(words), Segment::Text(text)) => {
                let word = words
                    .iter()
                    .filter(|w| !w.is_empty() && text.starts_with(w.as_str()))
                    .max_by_key(|w| w.len())?;
                (word.clone(), Some(text[word.len()..].trim_start()))
            }
            (Affix::Regex { prefix, .. }, Segment::Text(text)) => {
                let m = prefix.find(text).filter(|m| !m.is_empty())?;
                (m.as_str().to_string(), Some(text[m.end()..].trim_start()))
            }
            _ => return None,
        };

        let mut out = Message::new();
        if let Some(text) = remainder.filter(|t| !t.is_empty()) {
            out.push(Segment::text(text));
        }
        rest.iter().cloned().for_each(|seg| out.push(seg));
        Some((matched, out))
    }

    fn strip_suffix(&self, message: &Message) -> Option<(String, Message)> {
        let (last, rest) = message.split_last()?;
        let (matched, remainder) = match (self, last) {
            (Affix::At(id), Segment::At(user)) if id == user => (format!("@{id}"), None),
            (Affix::Literal(words), Segment::Text(text)) => {
                let word = words
                    .iter()
                    .filter(|w| !w.is_empty() && text.ends_with(w.as_str()))
                    .max_by_key(|w| w.len())?;
                (word.clone(), Some(text[..text.len() - word.len()].trim_end()))
            }
            (Affix::Regex { suffix, .. }, Segment::Text(text)) => {
                let m = suffix.find(text).filter(|m| !m.is_empty())?;
                (m.as_str().to_string(), Some(text[..m.start()].trim_end()))
            }
            _ => return None,
        };

        let mut out: Message = rest.iter().cloned().collect();
        if let Some(text) = remainder.filter(|t| !t.is_empty()) {
            out.push(Segment::text(text));
        }
        Some((matched, out))
    }
}

/// What a prefix or suffix filter matched.
///
/// `rest` is the message without the affix in extract mode, and the whole
/// message otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct AffixMatch {
    pub matched: String,
    pub rest: Message,
}

impl FromContext for AffixMatch {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        ctx.get_state::<AffixMatch>()
            .ok_or_else(|| ExtractError::NotProvided("affix match".into()))
    }
}

/// Passes messages starting with `affix` and binds an [`AffixMatch`].
pub fn startswith(affix: Affix, extract: bool) -> impl ContextFilter {
    affix_filter(affix, extract, Affix::strip_prefix)
}

/// Passes messages ending with `affix` and binds an [`AffixMatch`].
pub fn endswith(affix: Affix, extract: bool) -> impl ContextFilter {
    affix_filter(affix, extract, Affix::strip_suffix)
}

fn affix_filter(
    affix: Affix,
    extract: bool,
    strip: fn(&Affix, &Message) -> Option<(String, Message)>,
) -> impl ContextFilter {
    move |ctx: &ClaspContext| {
        let Some(message) = ctx.event().message() else {
            return false;
        };
        let Some((matched, stripped)) = strip(&affix, message) else {
            return false;
        };
        let rest = if extract { stripped } else { message.clone() };
        ctx.set_state(AffixMatch { matched, rest });
        true
    }
}
