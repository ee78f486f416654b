//! Structured parse results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::token::Token;
use super::value::ArgValue;

/// Kind of text a dispatch produced for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    Help,
    Shortcut,
    Completion,
    Error,
}

/// One way to continue an incomplete command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// What the prompt shows, e.g. `<count: int>` or `--verbose`.
    pub text: String,
    /// Tokens submitted when the candidate is entered without content.
    pub fill: Option<String>,
    /// Prepended to content typed while the candidate is selected.
    pub prefix: Option<String>,
    pub help: Option<String>,
}

/// Why a parse did not fully match.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The head matched but required arguments are missing.
    #[error("missing required argument(s): {}", .missing.join(", "))]
    Incomplete {
        missing: Vec<String>,
        candidates: Vec<Candidate>,
    },

    /// Help was requested; carries the rendered help.
    #[error("{0}")]
    Help(String),

    /// A shortcut was added or listed; carries the notice.
    #[error("{0}")]
    Shortcut(String),

    /// The input did not fit the grammar.
    #[error("{0}")]
    Invalid(String),

    /// The grammar panicked while parsing.
    #[error("command failed while parsing: {0}")]
    Panicked(String),
}

impl ParseError {
    /// Output produced by special triggers, which is always delivered.
    pub fn special_text(&self) -> Option<String> {
        match self {
            ParseError::Help(text) | ParseError::Shortcut(text) => Some(text.clone()),
            _ => None,
        }
    }

    pub fn output_type(&self) -> OutputType {
        match self {
            ParseError::Help(_) => OutputType::Help,
            ParseError::Shortcut(_) => OutputType::Shortcut,
            _ => OutputType::Error,
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        match self {
            ParseError::Incomplete { candidates, .. } => candidates,
            _ => &[],
        }
    }
}

/// A matched option.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionResult {
    /// `true` for flags, the argument for single-argument options, a map of
    /// all arguments otherwise.
    pub value: ArgValue,
    pub args: BTreeMap<String, ArgValue>,
}

/// A matched subcommand.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubcommandResult {
    pub args: BTreeMap<String, ArgValue>,
    pub options: BTreeMap<String, OptionResult>,
    pub subcommands: BTreeMap<String, SubcommandResult>,
}

/// The result of resolving one token sequence against one command.
///
/// Shared through `Arc` once published and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParseOutcome {
    pub matched: bool,
    /// Whether the leading tokens named this command at all.
    pub head_matched: bool,
    /// Values captured by the command head.
    pub header: BTreeMap<String, ArgValue>,
    pub main_args: BTreeMap<String, ArgValue>,
    pub options: BTreeMap<String, OptionResult>,
    pub subcommands: BTreeMap<String, SubcommandResult>,
    pub error: Option<ParseError>,
    /// The tokens that were parsed, head included.
    pub tokens: Vec<Token>,
}

impl ParseOutcome {
    /// An outcome for input that is not addressed to the command.
    pub fn head_mismatch(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            ..Default::default()
        }
    }

    /// A head-matched failure.
    pub fn failed(tokens: Vec<Token>, error: ParseError) -> Self {
        Self {
            head_matched: true,
            error: Some(error),
            tokens,
            ..Default::default()
        }
    }

    /// Returns `true` if the outcome waits for more input.
    pub fn is_incomplete(&self) -> bool {
        matches!(self.error, Some(ParseError::Incomplete { .. }))
    }

    /// Every resolved argument on every level, outer levels first.
    pub fn all_matched_args(&self) -> BTreeMap<String, ArgValue> {
        let mut all = self.main_args.clone();
        collect_args(&self.options, &self.subcommands, &mut all);
        all
    }

    /// Returns `true` if any option or subcommand matched.
    pub fn has_components(&self) -> bool {
        !self.options.is_empty() || !self.subcommands.is_empty()
    }

    /// Resolves a dotted path.
    ///
    /// - `$main.x` / `main_args.x`: a main argument
    /// - `opt`, `opt.value`, `opt.args`, `opt.x`: an option (the `options.`
    ///   prefix is optional)
    /// - `sub`, `sub.args`, `sub.x`, `sub.opt.x`, ...: a subcommand (the
    ///   `subcommands.` prefix is optional)
    /// - `x`: any matched argument
    pub fn query(&self, path: &str) -> Option<ArgValue> {
        let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
        match parts.as_slice() {
            [] => None,
            ["$main" | "main_args"] => Some(ArgValue::Map(self.main_args.clone())),
            ["$main" | "main_args", name] => self.main_args.get(*name).cloned(),
            ["options", rest @ ..] => query_option(&self.options, rest),
            ["subcommands", rest @ ..] => query_subcommand(&self.subcommands, rest),
            [name] if !self.options.contains_key(*name) && !self.subcommands.contains_key(*name) => {
                self.all_matched_args().get(*name).cloned()
            }
            rest => query_option(&self.options, rest)
                .or_else(|| query_subcommand(&self.subcommands, rest)),
        }
    }
}

fn collect_args(
    options: &BTreeMap<String, OptionResult>,
    subcommands: &BTreeMap<String, SubcommandResult>,
    into: &mut BTreeMap<String, ArgValue>,
) {
    for opt in options.values() {
        for (k, v) in &opt.args {
            into.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
    for sub in subcommands.values() {
        for (k, v) in &sub.args {
            into.entry(k.clone()).or_insert_with(|| v.clone());
        }
        collect_args(&sub.options, &sub.subcommands, into);
    }
}

fn query_option(options: &BTreeMap<String, OptionResult>, parts: &[&str]) -> Option<ArgValue> {
    let (name, rest) = parts.split_first()?;
    let opt = options.get(*name)?;
    match rest {
        [] | ["value"] => Some(opt.value.clone()),
        ["args"] => Some(ArgValue::Map(opt.args.clone())),
        ["args", arg] | [arg] => opt.args.get(*arg).cloned(),
        _ => None,
    }
}

fn query_subcommand(
    subcommands: &BTreeMap<String, SubcommandResult>,
    parts: &[&str],
) -> Option<ArgValue> {
    let (name, rest) = parts.split_first()?;
    let sub = subcommands.get(*name)?;
    match rest {
        [] | ["args"] => Some(ArgValue::Map(sub.args.clone())),
        ["args", arg] => sub.args.get(*arg).cloned(),
        ["options", more @ ..] => query_option(&sub.options, more),
        ["subcommands", more @ ..] => query_subcommand(&sub.subcommands, more),
        [arg] if sub.args.contains_key(*arg) => sub.args.get(*arg).cloned(),
        more => query_option(&sub.options, more)
            .or_else(|| query_subcommand(&sub.subcommands, more)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParseOutcome {
        let mut sub = SubcommandResult::default();
        sub.args.insert("target".into(), ArgValue::At("9".into()));
        sub.options.insert(
            "force".into(),
            OptionResult {
                value: true.into(),
                args: BTreeMap::new(),
            },
        );

        ParseOutcome {
            matched: true,
            head_matched: true,
            main_args: BTreeMap::from([("name".to_string(), "abc".into())]),
            options: BTreeMap::from([(
                "count".to_string(),
                OptionResult {
                    value: 3.into(),
                    args: BTreeMap::from([("n".to_string(), 3.into())]),
                },
            )]),
            subcommands: BTreeMap::from([("kick".to_string(), sub)]),
            ..Default::default()
        }
    }

    #[test]
    fn test_query_paths() {
        let outcome = sample();
        assert_eq!(outcome.query("name"), Some("abc".into()));
        assert_eq!(outcome.query("$main.name"), Some("abc".into()));
        assert_eq!(outcome.query("count"), Some(3.into()));
        assert_eq!(outcome.query("options.count.args.n"), Some(3.into()));
        assert_eq!(outcome.query("count.n"), Some(3.into()));
        assert_eq!(outcome.query("kick.target"), Some(ArgValue::At("9".into())));
        assert_eq!(outcome.query("kick.force"), Some(true.into()));
        assert_eq!(outcome.query("subcommands.kick.options.force.value"), Some(true.into()));
        assert_eq!(outcome.query("missing"), None);
        assert_eq!(outcome.query("count.missing"), None);
        assert_eq!(outcome.query(""), None);
    }

    #[test]
    fn test_all_matched_args_flattens_levels() {
        let all = sample().all_matched_args();
        assert_eq!(all.len(), 3);
        assert_eq!(all["n"], 3.into());
        assert_eq!(all["target"], ArgValue::At("9".into()));
    }

    #[test]
    fn test_special_text_only_for_triggers() {
        assert_eq!(
            ParseError::Help("usage".into()).special_text().as_deref(),
            Some("usage")
        );
        assert!(ParseError::Invalid("bad".into()).special_text().is_none());
        let incomplete = ParseError::Incomplete {
            missing: vec!["<b>".into()],
            candidates: vec![],
        };
        assert_eq!(incomplete.to_string(), "missing required argument(s): <b>");
        assert_eq!(incomplete.output_type(), OutputType::Error);
    }
}
