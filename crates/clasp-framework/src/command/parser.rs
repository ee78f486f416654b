//! Parsing tokens against a [`Command`].
//!
//! [`CommandParser`] is the seam the dispatch layer talks to; [`Command`] is
//! its clap-backed implementation. Input is parsed with the strict clap
//! command first. If only required arguments are missing it is parsed again
//! with every positional relaxed, so the partial values and the completion
//! candidates can be reported.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use clap::ArgMatches;
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use tracing::error;

use super::grammar::{Command, CommandId, Level};
use super::outcome::{Candidate, OptionResult, ParseError, ParseOutcome, SubcommandResult};
use super::segment::Placeholders;
use super::token::{Token, render};
use super::value::ArgValue;

/// Resolves token sequences for one command.
///
/// Implementations may panic; the dispatch layer catches it and reports a
/// failed outcome.
pub trait CommandParser: Send + Sync + 'static {
    fn id(&self) -> CommandId;

    fn name(&self) -> &str;

    /// Parses the tokens of one message, head included.
    fn parse(&self, tokens: &[Token]) -> ParseOutcome;

    fn as_any(&self) -> &dyn Any;
}

/// Runs `parser`, turning a panic into a failed, head-matched outcome.
pub fn parse_guarded(parser: &dyn CommandParser, tokens: &[Token]) -> ParseOutcome {
    match catch_unwind(AssertUnwindSafe(|| parser.parse(tokens))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown error".to_string());
            error!(command = %parser.name(), %message, "Command parser panicked");
            ParseOutcome::failed(tokens.to_vec(), ParseError::Panicked(message))
        }
    }
}

impl CommandParser for Command {
    fn id(&self) -> CommandId {
        Command::id(self)
    }

    fn name(&self) -> &str {
        Command::name(self)
    }

    fn parse(&self, tokens: &[Token]) -> ParseOutcome {
        let tokens = self
            .expand_shortcut(tokens)
            .unwrap_or_else(|| tokens.to_vec());
        let Some(header) = tokens.first().and_then(|head| self.match_head(head)) else {
            return ParseOutcome::head_mismatch(tokens);
        };

        if self.shortcut_option
            && tokens.get(1).and_then(Token::as_text) == Some("--shortcut")
        {
            let notice = self.manage_shortcut(&tokens[2..]);
            return ParseOutcome {
                header,
                ..ParseOutcome::failed(tokens, ParseError::Shortcut(notice))
            };
        }

        let (args, table) = Placeholders::encode(&tokens[1..]);
        let matches = match self.strict.clone().try_get_matches_from(&args) {
            Ok(matches) => matches,
            Err(err) if err.kind() == ErrorKind::MissingRequiredArgument => {
                match self.relaxed.clone().try_get_matches_from(&args) {
                    Ok(matches) => matches,
                    Err(_) => return failed(tokens, header, ParseError::Invalid(render_error(&err))),
                }
            }
            Err(err) if err.kind() == ErrorKind::DisplayHelp => {
                return failed(tokens, header, ParseError::Help(render_error(&err)));
            }
            Err(err) => return failed(tokens, header, ParseError::Invalid(render_error(&err))),
        };

        let mut missing = Vec::new();
        let mut unused = Vec::new();
        let resolved = match resolve_level(self.level(), &matches, &table, &mut missing, &mut unused) {
            Ok(resolved) => resolved,
            Err(message) => return failed(tokens, header, ParseError::Invalid(message)),
        };

        let error = (!missing.is_empty()).then(|| ParseError::Incomplete {
            missing: missing.iter().map(|c| c.text.clone()).collect(),
            candidates: missing.into_iter().chain(unused).collect(),
        });
        ParseOutcome {
            matched: error.is_none(),
            head_matched: true,
            header,
            main_args: resolved.args,
            options: resolved.options,
            subcommands: resolved.subcommands,
            error,
            tokens,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Command {
    /// Handles `--shortcut list`, `--shortcut delete KEY` and
    /// `--shortcut KEY REPLACEMENT...`.
    fn manage_shortcut(&self, rest: &[Token]) -> String {
        match rest {
            [] => "Usage: --shortcut list | --shortcut delete KEY | --shortcut KEY COMMAND...".into(),
            [Token::Text(list)] if list == "list" => {
                let shortcuts = self.shortcuts();
                if shortcuts.is_empty() {
                    "No shortcuts registered.".into()
                } else {
                    shortcuts
                        .iter()
                        .map(|(key, replacement)| format!("'{key}' => {replacement}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            [Token::Text(delete), Token::Text(key)] if delete == "delete" => {
                if self.remove_shortcut(key) {
                    format!("Shortcut '{key}' removed.")
                } else {
                    format!("Shortcut '{key}' does not exist.")
                }
            }
            [Token::Text(key), replacement @ ..] if !replacement.is_empty() => {
                let replacement = render(replacement);
                match self.add_shortcut(key, &replacement, true) {
                    Ok(()) => format!("Shortcut '{key}' => {replacement} added."),
                    Err(err) => err.to_string(),
                }
            }
            _ => "Shortcut keys must be plain text.".into(),
        }
    }
}

fn failed(tokens: Vec<Token>, header: BTreeMap<String, ArgValue>, error: ParseError) -> ParseOutcome {
    ParseOutcome {
        header,
        ..ParseOutcome::failed(tokens, error)
    }
}

fn render_error(err: &clap::Error) -> String {
    err.render().to_string().trim_end().to_string()
}

fn values_of(matches: &ArgMatches, id: &str) -> Option<Vec<String>> {
    matches
        .try_get_many::<String>(id)
        .ok()
        .flatten()
        .map(|values| values.cloned().collect())
}

/// Converts one level of clap matches, recursing into the chosen subcommand.
///
/// Missing required arguments are pushed to `missing`; options of the
/// deepest matched level that were not given are pushed to `unused`.
fn resolve_level(
    level: Level<'_>,
    matches: &ArgMatches,
    table: &Placeholders,
    missing: &mut Vec<Candidate>,
    unused: &mut Vec<Candidate>,
) -> Result<SubcommandResult, String> {
    let mut out = SubcommandResult::default();

    for arg in level.args {
        match values_of(matches, &arg.name) {
            Some(raw) => {
                let mut values = raw
                    .iter()
                    .map(|s| arg.kind.convert(table.decode(s)))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| format!("invalid value for <{}>: {e}", arg.name))?;
                let value = if arg.multiple {
                    ArgValue::List(values)
                } else {
                    match values.pop() {
                        Some(value) => value,
                        None => continue,
                    }
                };
                out.args.insert(arg.name.clone(), value);
            }
            None => match &arg.default {
                Some(default) => {
                    out.args.insert(arg.name.clone(), default.clone());
                }
                None if arg.required => missing.push(arg.candidate()),
                None => {}
            },
        }
    }

    let mut level_unused = Vec::new();
    for opt in level.options {
        if opt.args.is_empty() {
            if matches.value_source(&opt.name) == Some(ValueSource::CommandLine) {
                out.options.insert(
                    opt.name.clone(),
                    OptionResult {
                        value: ArgValue::Bool(true),
                        args: BTreeMap::new(),
                    },
                );
            } else {
                level_unused.push(opt.candidate());
            }
            continue;
        }
        let Some(raw) = values_of(matches, &opt.name) else {
            level_unused.push(opt.candidate());
            continue;
        };
        let mut args = BTreeMap::new();
        for (spec, raw) in opt.args.iter().zip(&raw) {
            let value = spec
                .kind
                .convert(table.decode(raw))
                .map_err(|e| format!("invalid value for --{} <{}>: {e}", opt.long, spec.name))?;
            args.insert(spec.name.clone(), value);
        }
        let value = if opt.args.len() == 1 {
            args.values().next().cloned().unwrap_or(ArgValue::Bool(true))
        } else {
            ArgValue::Map(args.clone())
        };
        out.options.insert(opt.name.clone(), OptionResult { value, args });
    }

    match matches
        .subcommand()
        .and_then(|(name, sub_matches)| {
            let sub = level.subcommands.iter().find(|s| s.name == name)?;
            Some((sub, sub_matches))
        }) {
        Some((sub, sub_matches)) => {
            let result = resolve_level(sub.level(), sub_matches, table, missing, unused)?;
            out.subcommands.insert(sub.name.clone(), result);
        }
        None => *unused = level_unused,
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use clasp_core::Segment;

    use super::*;
    use crate::command::grammar::{Arg, ArgKind, CommandBuilder, Opt, Subcommand};
    use crate::command::token::shell_split;

    fn tokens(input: &str) -> Vec<Token> {
        shell_split(input).into_iter().map(Token::Text).collect()
    }

    fn calc() -> Arc<Command> {
        CommandBuilder::new("calc")
            .header("/")
            .arg(Arg::new("a", ArgKind::Int))
            .arg(Arg::new("b", ArgKind::Int))
            .arg(Arg::new("op", ArgKind::Str).default("add"))
            .option(Opt::new("verbose").short('v'))
            .option(Opt::new("round").arg(Arg::new("digits", ArgKind::Int)))
            .description("A calculator")
            .build()
            .unwrap()
    }

    #[test]
    fn test_full_match() {
        let outcome = calc().parse(&tokens("/calc 1 -2 -v --round 3"));
        assert!(outcome.matched, "{:?}", outcome.error);
        assert_eq!(outcome.main_args["a"], ArgValue::Int(1));
        assert_eq!(outcome.main_args["b"], ArgValue::Int(-2));
        assert_eq!(outcome.main_args["op"], ArgValue::from("add"));
        assert_eq!(outcome.options["verbose"].value, ArgValue::Bool(true));
        assert_eq!(outcome.options["round"].value, ArgValue::Int(3));
        assert_eq!(outcome.query("round.digits"), Some(ArgValue::Int(3)));
    }

    #[test]
    fn test_head_mismatch() {
        let outcome = calc().parse(&tokens("/other 1 2"));
        assert!(!outcome.head_matched);
        assert!(outcome.error.is_none());
        assert!(!calc().parse(&[]).head_matched);
    }

    #[test]
    fn test_incomplete_lists_missing_then_options() {
        let outcome = calc().parse(&tokens("/calc 1"));
        assert!(outcome.head_matched);
        assert!(!outcome.matched);
        assert_eq!(outcome.main_args["a"], ArgValue::Int(1));

        let Some(ParseError::Incomplete { missing, candidates }) = &outcome.error else {
            panic!("expected incomplete, got {:?}", outcome.error);
        };
        assert_eq!(missing, &vec!["<b: int>".to_string()]);
        let texts: Vec<_> = candidates.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["<b: int>", "--verbose", "--round <digits: int>"]);
        assert_eq!(candidates[1].fill.as_deref(), Some("--verbose"));
        assert_eq!(candidates[2].fill, None);
    }

    #[test]
    fn test_help_and_invalid() {
        let outcome = calc().parse(&tokens("/calc --help"));
        let Some(ParseError::Help(text)) = &outcome.error else {
            panic!("expected help");
        };
        assert!(text.contains("A calculator"));
        assert!(text.contains("<a>"));

        let outcome = calc().parse(&tokens("/calc x 2"));
        assert!(matches!(outcome.error, Some(ParseError::Invalid(_))));
        assert!(outcome.head_matched);

        let outcome = calc().parse(&tokens("/calc 1 2 add extra"));
        assert!(matches!(outcome.error, Some(ParseError::Invalid(_))));
    }

    #[test]
    fn test_elements_and_multiple() {
        let cmd = CommandBuilder::new("poke")
            .arg(Arg::new("who", ArgKind::At))
            .arg(Arg::new("words", ArgKind::Any).optional().multiple())
            .build()
            .unwrap();
        let input = vec![
            Token::text("poke"),
            Token::Element(Segment::At("42".into())),
            Token::text("hey"),
            Token::Element(Segment::Image("cat.png".into())),
        ];
        let outcome = cmd.parse(&input);
        assert!(outcome.matched, "{:?}", outcome.error);
        assert_eq!(outcome.main_args["who"], ArgValue::At("42".into()));
        assert_eq!(
            outcome.main_args["words"],
            ArgValue::List(vec!["hey".into(), ArgValue::Image("cat.png".into())])
        );
    }

    #[test]
    fn test_subcommands() {
        let cmd = CommandBuilder::new("admin")
            .subcommand(
                Subcommand::new("kick")
                    .alias("k")
                    .arg(Arg::new("target", ArgKind::At))
                    .option(Opt::new("force").short('f')),
            )
            .build()
            .unwrap();

        let outcome = cmd.parse(&tokens("admin k @7 -f"));
        assert!(outcome.matched, "{:?}", outcome.error);
        assert_eq!(outcome.query("kick.target"), Some(ArgValue::At("7".into())));
        assert_eq!(outcome.query("kick.force"), Some(ArgValue::Bool(true)));

        let outcome = cmd.parse(&tokens("admin kick"));
        let Some(ParseError::Incomplete { candidates, .. }) = &outcome.error else {
            panic!("expected incomplete, got {:?}", outcome.error);
        };
        let texts: Vec<_> = candidates.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["<target: at>", "--force"]);
    }

    struct Exploding;

    impl CommandParser for Exploding {
        fn id(&self) -> CommandId {
            CommandId::next()
        }

        fn name(&self) -> &str {
            "boom"
        }

        fn parse(&self, _tokens: &[Token]) -> ParseOutcome {
            panic!("grammar is broken")
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_panics_become_failed_outcomes() {
        let outcome = parse_guarded(&Exploding, &tokens("boom 1"));
        assert!(outcome.head_matched);
        assert!(!outcome.matched);
        assert_eq!(
            outcome.error,
            Some(ParseError::Panicked("grammar is broken".into()))
        );
    }

    #[test]
    fn test_shortcut_option() {
        let cmd = CommandBuilder::new("echo")
            .arg(Arg::new("text", ArgKind::Str))
            .shortcut_option(true)
            .build()
            .unwrap();

        let outcome = cmd.parse(&tokens("echo --shortcut hi 'echo hello'"));
        assert!(matches!(outcome.error, Some(ParseError::Shortcut(_))));
        assert_eq!(cmd.shortcuts().len(), 1);

        let outcome = cmd.parse(&tokens("hi"));
        assert!(outcome.matched, "{:?}", outcome.error);
        assert_eq!(outcome.main_args["text"], ArgValue::from("hello"));
    }
}
