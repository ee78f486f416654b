//! The published command result and the lookups handlers can make on it.
//!
//! Lookups go through a fixed, ordered table of `(applies, resolve)` pairs.
//! The first entry whose predicate accepts a [`Request`] answers it; a
//! request nothing answers is simply not provided.

use std::collections::BTreeMap;
use std::sync::Arc;

use clasp_core::{BoxedBot, BoxedEvent};

use super::adapter::CommandAdapter;
use super::outcome::{OptionResult, OutputType, ParseOutcome, SubcommandResult};
use super::parser::CommandParser;
use super::value::{ArgValue, FromArgValue};

/// What one dispatch of one message to one command produced.
///
/// Shared through `Arc` between every handler gated on the same command and
/// message, and never mutated after publication.
pub struct CommandResult {
    pub outcome: Arc<ParseOutcome>,
    /// Set whenever output text exists.
    pub output_type: Option<OutputType>,
    /// Output text kept for the handler (stay mode only).
    pub output: Option<String>,
    pub source: BoxedEvent,
    pub command: Arc<dyn CommandParser>,
    pub adapter: Arc<dyn CommandAdapter>,
}

impl CommandResult {
    /// A matched argument converted to `T`.
    pub fn matched<T: FromArgValue>(&self, name: &str) -> Option<T> {
        self.outcome
            .all_matched_args()
            .get(name)
            .and_then(T::from_arg_value)
    }

    /// A dotted-path lookup converted to `T`.
    pub fn query<T: FromArgValue>(&self, path: &str) -> Option<T> {
        self.outcome
            .query(path)
            .as_ref()
            .and_then(T::from_arg_value)
    }

    /// Resolves a display name.
    ///
    /// A mention at `path` is looked up through the adapter, falling back to
    /// the raw id; a string at `path` is returned as is. Otherwise the
    /// sender's own name is looked up.
    pub async fn fetch_name(&self, bot: &BoxedBot, path: &str) -> Option<String> {
        match self.outcome.query(path) {
            Some(ArgValue::At(id)) => {
                let name = self.adapter.fetch_name(bot, &id).await;
                Some(name.unwrap_or(id))
            }
            Some(ArgValue::Str(name)) => Some(name),
            _ => {
                let sender = self.source.sender_id()?;
                self.adapter.fetch_name(bot, sender).await
            }
        }
    }
}

impl std::fmt::Debug for CommandResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandResult")
            .field("command", &self.command.name())
            .field("matched", &self.outcome.matched)
            .field("output_type", &self.output_type)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Typed views
// ============================================================================

/// The main arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgsStub {
    pub args: BTreeMap<String, ArgValue>,
    pub available: bool,
}

/// One option, whether or not it was given.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionStub {
    pub name: String,
    pub value: Option<ArgValue>,
    pub args: BTreeMap<String, ArgValue>,
    pub available: bool,
}

impl OptionStub {
    fn new(name: &str, result: Option<&OptionResult>) -> Self {
        Self {
            name: name.to_string(),
            value: result.map(|r| r.value.clone()),
            args: result.map(|r| r.args.clone()).unwrap_or_default(),
            available: result.is_some(),
        }
    }
}

/// One subcommand, whether or not it was given.
#[derive(Debug, Clone, PartialEq)]
pub struct SubcommandStub {
    pub name: String,
    pub args: BTreeMap<String, ArgValue>,
    pub options: BTreeMap<String, OptionStub>,
    pub subcommands: BTreeMap<String, SubcommandStub>,
    pub available: bool,
}

impl SubcommandStub {
    fn new(name: &str, result: Option<&SubcommandResult>) -> Self {
        let Some(result) = result else {
            return Self {
                name: name.to_string(),
                args: BTreeMap::new(),
                options: BTreeMap::new(),
                subcommands: BTreeMap::new(),
                available: false,
            };
        };
        Self {
            name: name.to_string(),
            args: result.args.clone(),
            options: option_stubs(&result.options),
            subcommands: subcommand_stubs(&result.subcommands),
            available: true,
        }
    }
}

fn option_stubs(options: &BTreeMap<String, OptionResult>) -> BTreeMap<String, OptionStub> {
    options
        .iter()
        .map(|(k, v)| (k.clone(), OptionStub::new(k, Some(v))))
        .collect()
}

fn subcommand_stubs(
    subcommands: &BTreeMap<String, SubcommandResult>,
) -> BTreeMap<String, SubcommandStub> {
    subcommands
        .iter()
        .map(|(k, v)| (k.clone(), SubcommandStub::new(k, Some(v))))
        .collect()
}

/// A typed view over the whole outcome, built on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Duplication {
    pub matched: bool,
    pub header: BTreeMap<String, ArgValue>,
    pub args: ArgsStub,
    pub options: BTreeMap<String, OptionStub>,
    pub subcommands: BTreeMap<String, SubcommandStub>,
}

impl Duplication {
    pub fn new(outcome: &ParseOutcome) -> Self {
        Self {
            matched: outcome.matched,
            header: outcome.header.clone(),
            args: ArgsStub {
                args: outcome.main_args.clone(),
                available: !outcome.main_args.is_empty(),
            },
            options: option_stubs(&outcome.options),
            subcommands: subcommand_stubs(&outcome.subcommands),
        }
    }

    pub fn arg<T: FromArgValue>(&self, name: &str) -> Option<T> {
        self.args.args.get(name).and_then(T::from_arg_value)
    }

    /// The option stub; unavailable if the option was not given.
    pub fn option(&self, name: &str) -> OptionStub {
        self.options
            .get(name)
            .cloned()
            .unwrap_or_else(|| OptionStub::new(name, None))
    }

    /// The subcommand stub; unavailable if the subcommand was not given.
    pub fn subcommand(&self, name: &str) -> SubcommandStub {
        self.subcommands
            .get(name)
            .cloned()
            .unwrap_or_else(|| SubcommandStub::new(name, None))
    }
}

/// User-defined typed views built from a [`Duplication`].
pub trait FromDuplication: Sized + Send + 'static {
    fn from_duplication(dup: &Duplication) -> Option<Self>;
}

// ============================================================================
// Resolver table
// ============================================================================

/// A lookup a handler parameter makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    Duplication,
    CommandResult,
    ArgsStub,
    OptionStub(&'a str),
    SubcommandStub(&'a str),
    Outcome,
    Output,
    Command,
    Header,
    /// An argument by name, on any level.
    Match(&'a str),
    /// A dotted path.
    Query(&'a str),
    /// A parameter named like an argument.
    Plain(&'a str),
}

/// The answer to a [`Request`].
pub enum Provided {
    Duplication(Duplication),
    Result(Arc<CommandResult>),
    Args(ArgsStub),
    Option(OptionStub),
    Subcommand(SubcommandStub),
    Outcome(Arc<ParseOutcome>),
    Output(Option<String>),
    Command(Arc<dyn CommandParser>),
    Header(BTreeMap<String, ArgValue>),
    Value(ArgValue),
}

type Applies = fn(&Request<'_>) -> bool;
type Resolve = fn(&Arc<CommandResult>, &Request<'_>) -> Option<Provided>;

/// Evaluated top to bottom; the first applicable entry answers.
pub static RESOLVERS: &[(Applies, Resolve)] = &[
    (is_duplication, resolve_duplication),
    (is_result, resolve_result),
    (is_args, resolve_args),
    (is_stub, resolve_stub),
    (is_outcome, resolve_outcome),
    (is_output, resolve_output),
    (is_command, resolve_command),
    (is_header, resolve_header),
    (is_match, resolve_match),
    (is_query, resolve_query),
    (is_plain, resolve_plain),
];

/// Answers `request` from `result`.
pub fn project(result: &Arc<CommandResult>, request: &Request<'_>) -> Option<Provided> {
    RESOLVERS
        .iter()
        .find(|(applies, _)| applies(request))
        .and_then(|(_, resolve)| resolve(result, request))
}

fn is_duplication(r: &Request<'_>) -> bool {
    matches!(r, Request::Duplication)
}

fn resolve_duplication(res: &Arc<CommandResult>, _: &Request<'_>) -> Option<Provided> {
    Some(Provided::Duplication(Duplication::new(&res.outcome)))
}

fn is_result(r: &Request<'_>) -> bool {
    matches!(r, Request::CommandResult)
}

fn resolve_result(res: &Arc<CommandResult>, _: &Request<'_>) -> Option<Provided> {
    Some(Provided::Result(res.clone()))
}

fn is_args(r: &Request<'_>) -> bool {
    matches!(r, Request::ArgsStub)
}

fn resolve_args(res: &Arc<CommandResult>, _: &Request<'_>) -> Option<Provided> {
    Some(Provided::Args(Duplication::new(&res.outcome).args))
}

fn is_stub(r: &Request<'_>) -> bool {
    matches!(r, Request::OptionStub(_) | Request::SubcommandStub(_))
}

fn resolve_stub(res: &Arc<CommandResult>, r: &Request<'_>) -> Option<Provided> {
    match r {
        Request::OptionStub(name) => Some(Provided::Option(OptionStub::new(
            name,
            res.outcome.options.get(*name),
        ))),
        Request::SubcommandStub(name) => Some(Provided::Subcommand(SubcommandStub::new(
            name,
            res.outcome.subcommands.get(*name),
        ))),
        _ => None,
    }
}

fn is_outcome(r: &Request<'_>) -> bool {
    matches!(r, Request::Outcome)
}

fn resolve_outcome(res: &Arc<CommandResult>, _: &Request<'_>) -> Option<Provided> {
    Some(Provided::Outcome(res.outcome.clone()))
}

fn is_output(r: &Request<'_>) -> bool {
    matches!(r, Request::Output)
}

fn resolve_output(res: &Arc<CommandResult>, _: &Request<'_>) -> Option<Provided> {
    Some(Provided::Output(res.output.clone()))
}

fn is_command(r: &Request<'_>) -> bool {
    matches!(r, Request::Command)
}

fn resolve_command(res: &Arc<CommandResult>, _: &Request<'_>) -> Option<Provided> {
    Some(Provided::Command(res.command.clone()))
}

fn is_header(r: &Request<'_>) -> bool {
    matches!(r, Request::Header)
}

fn resolve_header(res: &Arc<CommandResult>, _: &Request<'_>) -> Option<Provided> {
    Some(Provided::Header(res.outcome.header.clone()))
}

fn is_match(r: &Request<'_>) -> bool {
    matches!(r, Request::Match(_))
}

fn resolve_match(res: &Arc<CommandResult>, r: &Request<'_>) -> Option<Provided> {
    let Request::Match(name) = r else {
        return None;
    };
    res.outcome
        .all_matched_args()
        .remove(*name)
        .map(Provided::Value)
}

fn is_query(r: &Request<'_>) -> bool {
    matches!(r, Request::Query(_))
}

fn resolve_query(res: &Arc<CommandResult>, r: &Request<'_>) -> Option<Provided> {
    let Request::Query(path) = r else {
        return None;
    };
    res.outcome.query(path).map(Provided::Value)
}

fn is_plain(r: &Request<'_>) -> bool {
    matches!(r, Request::Plain(_))
}

fn resolve_plain(res: &Arc<CommandResult>, r: &Request<'_>) -> Option<Provided> {
    let Request::Plain(name) = r else {
        return None;
    };
    res.outcome
        .all_matched_args()
        .remove(*name)
        .map(Provided::Value)
}


#[cfg(test)]
mod tests {
    use super::testing::result_for;
    use super::*;
    use crate::command::outcome::ParseError;

    #[test]
    fn test_table_order_is_fixed() {
        let result = result_for("greet abc -t 2 loud --caps");
        assert!(result.outcome.matched, "{:?}", result.outcome.error);

        assert!(matches!(
            project(&result, &Request::Duplication),
            Some(Provided::Duplication(_))
        ));
        assert!(matches!(
            project(&result, &Request::CommandResult),
            Some(Provided::Result(r)) if Arc::ptr_eq(&r, &result)
        ));
        assert!(matches!(
            project(&result, &Request::Match("name")),
            Some(Provided::Value(ArgValue::Str(s))) if s == "abc"
        ));
        assert!(matches!(
            project(&result, &Request::Query("times.n")),
            Some(Provided::Value(ArgValue::Int(2)))
        ));
        assert!(project(&result, &Request::Query("nope")).is_none());
    }

    #[test]
    fn test_stubs_report_availability() {
        let result = result_for("greet abc loud");
        let Some(Provided::Option(times)) = project(&result, &Request::OptionStub("times")) else {
            panic!("expected an option stub");
        };
        assert!(!times.available);

        let Some(Provided::Subcommand(loud)) = project(&result, &Request::SubcommandStub("loud"))
        else {
            panic!("expected a subcommand stub");
        };
        assert!(loud.available);
        assert!(loud.options.is_empty());

        let dup = Duplication::new(&result.outcome);
        assert_eq!(dup.arg::<String>("name").as_deref(), Some("abc"));
        assert!(!dup.option("times").available);
        assert!(dup.subcommand("loud").available);
    }

    #[test]
    fn test_plain_answers_present_arguments() {
        let result = result_for("greet");
        assert!(!result.outcome.matched);
        assert!(project(&result, &Request::Plain("name")).is_none());

        let full = result_for("greet abc");
        let mut outcome = (*full.outcome).clone();
        outcome.matched = false;
        outcome.error = Some(ParseError::Invalid("trailing input".into()));
        let partial = Arc::new(CommandResult {
            outcome: Arc::new(outcome),
            output_type: None,
            output: None,
            source: full.source.clone(),
            command: full.command.clone(),
            adapter: full.adapter.clone(),
        });
        assert!(matches!(
            project(&partial, &Request::Plain("name")),
            Some(Provided::Value(ArgValue::Str(s))) if s == "abc"
        ));

        let result = result_for("greet abc");
        assert_eq!(result.matched::<String>("name").as_deref(), Some("abc"));
        assert_eq!(result.matched::<i64>("name"), None);
    }

    #[tokio::test]
    async fn test_fetch_name_prefers_the_argument() {
        let bot: BoxedBot = Arc::new(crate::context::testing::RecordingBot::default());
        let result = result_for("greet abc");
        assert_eq!(result.fetch_name(&bot, "name").await.as_deref(), Some("abc"));
        assert_eq!(
            result.fetch_name(&bot, "nope").await.as_deref(),
            Some("name-of-alice")
        );
    }
}
