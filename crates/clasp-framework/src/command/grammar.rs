//! Command grammar definitions.
//!
//! A [`Command`] is built once through [`CommandBuilder`] and then shared as
//! `Arc<Command>`. Parsing is delegated to clap; this module only describes
//! the grammar and turns it into clap commands.
//!
//! ```rust,ignore
//! let add = CommandBuilder::new("add")
//!     .header("/")
//!     .arg(Arg::new("a", ArgKind::Int))
//!     .arg(Arg::new("b", ArgKind::Int))
//!     .option(Opt::new("verbose").short('v'))
//!     .description("Adds two numbers")
//!     .build()?;
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::ArgAction;
use parking_lot::RwLock;
use regex::Regex;
use thiserror::Error;

use clasp_core::Segment;

use super::outcome::Candidate;
use super::token::{Token, shell_split};
use super::value::ArgValue;

static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a built [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(u64);

impl CommandId {
    /// Allocates a fresh id.
    pub fn next() -> Self {
        CommandId(NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors raised while building a grammar.
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("invalid name pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("invalid shortcut key '{key}': {source}")]
    Shortcut { key: String, source: regex::Error },

    #[error("'{0}' is defined more than once")]
    Duplicate(String),

    #[error("'{0}' is reserved")]
    Reserved(String),

    #[error("only the last argument of '{0}' may take multiple values")]
    MultipleNotLast(String),
}

// ============================================================================
// Arguments, options, subcommands
// ============================================================================

/// Value type of an argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKind {
    Str,
    Int,
    Float,
    Bool,
    /// A mention element, or text of the form `@id`.
    At,
    Image,
    /// Any rich element.
    Element,
    /// Text or element, unconverted.
    Any,
    /// One of a fixed set of words.
    Choice(Vec<String>),
}

impl ArgKind {
    pub fn label(&self) -> String {
        match self {
            ArgKind::Str => "str".into(),
            ArgKind::Int => "int".into(),
            ArgKind::Float => "float".into(),
            ArgKind::Bool => "bool".into(),
            ArgKind::At => "at".into(),
            ArgKind::Image => "image".into(),
            ArgKind::Element => "element".into(),
            ArgKind::Any => "any".into(),
            ArgKind::Choice(words) => words.join("|"),
        }
    }

    /// Converts one token into a value of this kind.
    pub fn convert(&self, token: Token) -> Result<ArgValue, String> {
        match (self, token) {
            (ArgKind::Str, Token::Text(s)) => Ok(ArgValue::Str(s)),
            (ArgKind::Int, Token::Text(s)) => s
                .parse()
                .map(ArgValue::Int)
                .map_err(|_| format!("'{s}' is not an integer")),
            (ArgKind::Float, Token::Text(s)) => s
                .parse()
                .map(ArgValue::Float)
                .map_err(|_| format!("'{s}' is not a number")),
            (ArgKind::Bool, Token::Text(s)) => match s.to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(ArgValue::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(ArgValue::Bool(false)),
                _ => Err(format!("'{s}' is not a boolean")),
            },
            (ArgKind::At, Token::Element(Segment::At(id))) => Ok(ArgValue::At(id)),
            (ArgKind::At, Token::Text(s)) if s.len() > 1 && s.starts_with('@') => {
                Ok(ArgValue::At(s[1..].to_string()))
            }
            (ArgKind::Image, Token::Element(Segment::Image(r))) => Ok(ArgValue::Image(r)),
            (ArgKind::Element | ArgKind::Any, Token::Element(seg)) => {
                Ok(ArgValue::from_segment(&seg))
            }
            (ArgKind::Any, Token::Text(s)) => Ok(ArgValue::Str(s)),
            (ArgKind::Choice(words), Token::Text(s)) => {
                if words.contains(&s) {
                    Ok(ArgValue::Str(s))
                } else {
                    Err(format!("'{s}' is not one of {}", words.join("|")))
                }
            }
            (kind, token) => Err(format!("expected {}, got '{token}'", kind.label())),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, ArgKind::Int | ArgKind::Float)
    }
}

/// A positional argument.
#[derive(Debug, Clone)]
pub struct Arg {
    pub name: String,
    pub kind: ArgKind,
    pub required: bool,
    pub default: Option<ArgValue>,
    pub multiple: bool,
    pub help: Option<String>,
}

impl Arg {
    /// A required argument.
    pub fn new(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
            multiple: false,
            help: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Sets a default value; the argument becomes optional.
    pub fn default(mut self, value: impl Into<ArgValue>) -> Self {
        self.default = Some(value.into());
        self.required = false;
        self
    }

    /// Collects all remaining tokens into a list.
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    /// `<name: kind>` for required arguments, `[name: kind]` otherwise.
    pub fn display(&self) -> String {
        let dots = if self.multiple { "..." } else { "" };
        if self.required {
            format!("<{}: {}{dots}>", self.name, self.kind.label())
        } else {
            format!("[{}: {}{dots}]", self.name, self.kind.label())
        }
    }

    pub(crate) fn candidate(&self) -> Candidate {
        let fill = match (&self.default, &self.kind) {
            (Some(value), _) => Some(value.to_string()),
            (None, ArgKind::Choice(words)) => words.first().cloned(),
            _ => None,
        };
        Candidate {
            text: self.display(),
            fill,
            prefix: None,
            help: self.help.clone(),
        }
    }

    fn to_clap(&self, index: usize, strict: bool) -> clap::Arg {
        let mut arg = clap::Arg::new(self.name.clone())
            .index(index)
            .value_name(self.name.clone())
            .value_parser(clap::value_parser!(String))
            .required(strict && self.required)
            .allow_negative_numbers(self.kind.is_numeric());
        arg = if self.multiple {
            arg.num_args(1..)
                .action(ArgAction::Append)
                .trailing_var_arg(true)
                .allow_hyphen_values(true)
        } else {
            arg.action(ArgAction::Set)
        };
        if let Some(help) = &self.help {
            arg = arg.help(help.clone());
        }
        arg
    }
}

/// An option such as `--count 3` or `-v`.
#[derive(Debug, Clone)]
pub struct Opt {
    pub name: String,
    pub long: String,
    pub short: Option<char>,
    pub aliases: Vec<String>,
    pub args: Vec<Arg>,
    pub help: Option<String>,
}

impl Opt {
    /// An option whose long form is `--name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            long: name.clone(),
            name,
            short: None,
            aliases: Vec::new(),
            args: Vec::new(),
            help: None,
        }
    }

    pub fn long(mut self, long: impl Into<String>) -> Self {
        self.long = long.into();
        self
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Adds a value the option takes. All of them are required once the
    /// option is given.
    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    pub(crate) fn candidate(&self) -> Candidate {
        let flag = format!("--{}", self.long);
        let text = std::iter::once(flag.clone())
            .chain(self.args.iter().map(Arg::display))
            .collect::<Vec<_>>()
            .join(" ");
        Candidate {
            text,
            fill: self.args.is_empty().then(|| flag.clone()),
            prefix: Some(flag),
            help: self.help.clone(),
        }
    }

    fn to_clap(&self) -> clap::Arg {
        let mut arg = clap::Arg::new(self.name.clone())
            .long(self.long.clone())
            .aliases(self.aliases.clone());
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        if self.args.is_empty() {
            arg = arg.action(ArgAction::SetTrue);
        } else {
            arg = arg
                .action(ArgAction::Set)
                .num_args(self.args.len())
                .value_names(self.args.iter().map(|a| a.name.clone()))
                .value_parser(clap::value_parser!(String))
                .allow_negative_numbers(self.args.iter().any(|a| a.kind.is_numeric()));
        }
        if let Some(help) = &self.help {
            arg = arg.help(help.clone());
        }
        arg
    }
}

/// A nested command level.
#[derive(Debug, Clone)]
pub struct Subcommand {
    pub name: String,
    pub aliases: Vec<String>,
    pub args: Vec<Arg>,
    pub options: Vec<Opt>,
    pub subcommands: Vec<Subcommand>,
    pub help: Option<String>,
}

impl Subcommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            args: Vec::new(),
            options: Vec::new(),
            subcommands: Vec::new(),
            help: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn option(mut self, option: Opt) -> Self {
        self.options.push(option);
        self
    }

    pub fn subcommand(mut self, subcommand: Subcommand) -> Self {
        self.subcommands.push(subcommand);
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    pub(crate) fn level(&self) -> Level<'_> {
        Level {
            args: &self.args,
            options: &self.options,
            subcommands: &self.subcommands,
        }
    }
}

/// One level of the grammar tree.
#[derive(Clone, Copy)]
pub(crate) struct Level<'a> {
    pub args: &'a [Arg],
    pub options: &'a [Opt],
    pub subcommands: &'a [Subcommand],
}

impl Level<'_> {
    fn validate(&self, owner: &str) -> Result<(), GrammarError> {
        let mut ids = HashSet::new();
        let mut flags = HashSet::from(["--help".to_string(), "-h".to_string()]);

        for (i, arg) in self.args.iter().enumerate() {
            if arg.name == "help" {
                return Err(GrammarError::Reserved(arg.name.clone()));
            }
            if !ids.insert(arg.name.clone()) {
                return Err(GrammarError::Duplicate(arg.name.clone()));
            }
            if arg.multiple && i + 1 != self.args.len() {
                return Err(GrammarError::MultipleNotLast(owner.to_string()));
            }
        }
        for opt in self.options {
            if opt.name == "help" {
                return Err(GrammarError::Reserved(opt.name.clone()));
            }
            if !ids.insert(opt.name.clone()) {
                return Err(GrammarError::Duplicate(opt.name.clone()));
            }
            let spellings = std::iter::once(&opt.long)
                .chain(&opt.aliases)
                .map(|l| format!("--{l}"))
                .chain(opt.short.map(|s| format!("-{s}")));
            for spelling in spellings {
                if !flags.insert(spelling.clone()) {
                    return Err(if spelling == "--help" || spelling == "-h" {
                        GrammarError::Reserved(spelling)
                    } else {
                        GrammarError::Duplicate(spelling)
                    });
                }
            }
        }

        let mut names = HashSet::new();
        for sub in self.subcommands {
            for name in std::iter::once(&sub.name).chain(&sub.aliases) {
                if !names.insert(name.clone()) {
                    return Err(GrammarError::Duplicate(name.clone()));
                }
            }
            sub.level().validate(&sub.name)?;
        }
        Ok(())
    }

    fn to_clap(&self, name: &str, about: Option<&str>, strict: bool) -> clap::Command {
        let mut cmd = clap::Command::new(name.to_string())
            .disable_version_flag(true)
            .args_override_self(true);
        if let Some(about) = about {
            cmd = cmd.about(about.to_string());
        }
        for (i, arg) in self.args.iter().enumerate() {
            cmd = cmd.arg(arg.to_clap(i + 1, strict));
        }
        for opt in self.options {
            cmd = cmd.arg(opt.to_clap());
        }
        for sub in self.subcommands {
            cmd = cmd.subcommand(
                sub.level()
                    .to_clap(&sub.name, sub.help.as_deref(), strict)
                    .aliases(sub.aliases.clone()),
            );
        }
        cmd
    }
}

// ============================================================================
// Command
// ============================================================================

/// Descriptive metadata shown in help output.
#[derive(Debug, Clone, Default)]
pub struct CommandMeta {
    pub description: Option<String>,
    pub usage: Option<String>,
    pub example: Option<String>,
}

#[derive(Debug)]
struct Shortcut {
    key: String,
    pattern: Regex,
    replacement: String,
    fuzzy: bool,
}

/// An immutable command grammar.
///
/// Only the shortcut table can change after [`CommandBuilder::build`].
pub struct Command {
    id: CommandId,
    name: String,
    aliases: Vec<String>,
    headers: Vec<String>,
    pattern: Option<Regex>,
    pub(crate) args: Vec<Arg>,
    pub(crate) options: Vec<Opt>,
    pub(crate) subcommands: Vec<Subcommand>,
    meta: CommandMeta,
    shortcuts: RwLock<Vec<Shortcut>>,
    pub(crate) shortcut_option: bool,
    /// Positional arguments as declared; used for help and usage.
    pub(crate) strict: clap::Command,
    /// Every positional optional; used to collect partial input.
    pub(crate) relaxed: clap::Command,
}

impl Command {
    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    pub(crate) fn level(&self) -> Level<'_> {
        Level {
            args: &self.args,
            options: &self.options,
            subcommands: &self.subcommands,
        }
    }

    /// Rendered help for the top level.
    pub fn help(&self) -> String {
        self.strict.clone().render_help().to_string()
    }

    /// Matches the head token. Returns the captured header values.
    pub fn match_head(&self, token: &Token) -> Option<BTreeMap<String, ArgValue>> {
        let Token::Text(text) = token else {
            return None;
        };
        let bare = [String::new()];
        let prefixes = if self.headers.is_empty() {
            &bare[..]
        } else {
            &self.headers[..]
        };

        for prefix in prefixes {
            let Some(rest) = text.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if rest == self.name || self.aliases.iter().any(|a| a == rest) {
                return Some(BTreeMap::new());
            }
            if let Some(caps) = self.pattern.as_ref().and_then(|p| p.captures(rest)) {
                let header = self
                    .pattern
                    .iter()
                    .flat_map(|p| p.capture_names())
                    .flatten()
                    .filter_map(|name| {
                        let raw = caps.name(name)?.as_str();
                        let value = raw
                            .parse::<i64>()
                            .map(ArgValue::Int)
                            .unwrap_or_else(|_| ArgValue::Str(raw.to_string()));
                        Some((name.to_string(), value))
                    })
                    .collect();
                return Some(header);
            }
        }
        None
    }

    /// Rewrites tokens whose head is a registered shortcut.
    pub fn expand_shortcut(&self, tokens: &[Token]) -> Option<Vec<Token>> {
        let (Token::Text(first), rest) = tokens.split_first()? else {
            return None;
        };
        let shortcuts = self.shortcuts.read();
        let shortcut = shortcuts
            .iter()
            .find(|s| (s.fuzzy || rest.is_empty()) && s.pattern.is_match(first))?;
        let caps = shortcut.pattern.captures(first)?;

        let mut expanded = String::new();
        caps.expand(&shortcut.replacement, &mut expanded);
        let mut out: Vec<Token> = shell_split(&expanded).into_iter().map(Token::Text).collect();
        out.extend(rest.iter().cloned());
        Some(out)
    }

    /// Registers a shortcut.
    ///
    /// `key` is a regular expression matched against the whole first token;
    /// `replacement` may refer to its groups as `$1` or `$name`. With `fuzzy`
    /// the tokens after the key are appended to the expansion; without it the
    /// shortcut only applies when the key is the whole message.
    pub fn add_shortcut(
        &self,
        key: &str,
        replacement: &str,
        fuzzy: bool,
    ) -> Result<(), GrammarError> {
        let pattern =
            Regex::new(&format!("^(?:{key})$")).map_err(|source| GrammarError::Shortcut {
                key: key.to_string(),
                source,
            })?;
        let mut shortcuts = self.shortcuts.write();
        shortcuts.retain(|s| s.key != key);
        shortcuts.push(Shortcut {
            key: key.to_string(),
            pattern,
            replacement: replacement.to_string(),
            fuzzy,
        });
        Ok(())
    }

    /// Removes a shortcut. Returns `false` if it did not exist.
    pub fn remove_shortcut(&self, key: &str) -> bool {
        let mut shortcuts = self.shortcuts.write();
        let before = shortcuts.len();
        shortcuts.retain(|s| s.key != key);
        shortcuts.len() != before
    }

    /// Registered shortcuts as `(key, replacement)` pairs.
    pub fn shortcuts(&self) -> Vec<(String, String)> {
        self.shortcuts
            .read()
            .iter()
            .map(|s| (s.key.clone(), s.replacement.clone()))
            .collect()
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// CommandBuilder
// ============================================================================

/// Builds an immutable [`Command`].
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    name: String,
    aliases: Vec<String>,
    headers: Vec<String>,
    args: Vec<Arg>,
    options: Vec<Opt>,
    subcommands: Vec<Subcommand>,
    meta: CommandMeta,
    shortcuts: Vec<(String, String, bool)>,
    shortcut_option: bool,
}

impl CommandBuilder {
    /// Starts a command.
    ///
    /// `{name}` placeholders in the name capture parts of the head token,
    /// e.g. `roll{count}d{sides}` matches `roll2d6`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            headers: Vec::new(),
            args: Vec::new(),
            options: Vec::new(),
            subcommands: Vec::new(),
            meta: CommandMeta::default(),
            shortcuts: Vec::new(),
            shortcut_option: false,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Adds an accepted prefix such as `/` or `!`.
    ///
    /// Without headers the bare name is the head.
    pub fn header(mut self, prefix: impl Into<String>) -> Self {
        self.headers.push(prefix.into());
        self
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn option(mut self, option: Opt) -> Self {
        self.options.push(option);
        self
    }

    pub fn subcommand(mut self, subcommand: Subcommand) -> Self {
        self.subcommands.push(subcommand);
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.meta.description = Some(text.into());
        self
    }

    pub fn usage(mut self, text: impl Into<String>) -> Self {
        self.meta.usage = Some(text.into());
        self
    }

    pub fn example(mut self, text: impl Into<String>) -> Self {
        self.meta.example = Some(text.into());
        self
    }

    /// Registers a fuzzy shortcut at build time. See [`Command::add_shortcut`].
    pub fn shortcut(mut self, key: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.shortcuts.push((key.into(), replacement.into(), true));
        self
    }

    /// Enables the built-in `--shortcut` option for managing shortcuts from
    /// chat.
    pub fn shortcut_option(mut self, enabled: bool) -> Self {
        self.shortcut_option = enabled;
        self
    }

    pub fn build(self) -> Result<Arc<Command>, GrammarError> {
        let level = Level {
            args: &self.args,
            options: &self.options,
            subcommands: &self.subcommands,
        };
        level.validate(&self.name)?;

        let pattern = name_pattern(&self.name)?;
        let about = self.meta.description.as_deref();
        let mut strict = level
            .to_clap(&self.name, about, true)
            .no_binary_name(true);
        if let Some(usage) = &self.meta.usage {
            strict = strict.override_usage(usage.clone());
        }
        if let Some(example) = &self.meta.example {
            strict = strict.after_help(format!("Example:\n  {example}"));
        }
        let relaxed = level
            .to_clap(&self.name, about, false)
            .no_binary_name(true);

        let command = Command {
            id: CommandId::next(),
            name: self.name,
            aliases: self.aliases,
            headers: self.headers,
            pattern,
            args: self.args,
            options: self.options,
            subcommands: self.subcommands,
            meta: self.meta,
            shortcuts: RwLock::new(Vec::new()),
            shortcut_option: self.shortcut_option,
            strict,
            relaxed,
        };
        for (key, replacement, fuzzy) in &self.shortcuts {
            command.add_shortcut(key, replacement, *fuzzy)?;
        }
        Ok(Arc::new(command))
    }
}

/// Compiles `{name}` placeholders of a command name into a regex.
fn name_pattern(name: &str) -> Result<Option<Regex>, GrammarError> {
    if !name.contains('{') {
        return Ok(None);
    }
    let mut source = String::from("^");
    let mut rest = name;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        source.push_str(&regex::escape(&rest[..start]));
        let capture = &rest[start + 1..start + len];
        source.push_str(&format!("(?P<{capture}>.+?)"));
        rest = &rest[start + len + 1..];
    }
    source.push_str(&regex::escape(rest));
    source.push('$');

    Regex::new(&source)
        .map(Some)
        .map_err(|source| GrammarError::Pattern {
            pattern: name.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_with_headers_and_aliases() {
        let cmd = CommandBuilder::new("echo")
            .alias("say")
            .header("/")
            .header("!")
            .build()
            .unwrap();
        assert!(cmd.match_head(&Token::text("/echo")).is_some());
        assert!(cmd.match_head(&Token::text("!say")).is_some());
        assert!(cmd.match_head(&Token::text("echo")).is_none());
        assert!(cmd.match_head(&Token::Element(Segment::At("1".into()))).is_none());
    }

    #[test]
    fn test_head_pattern_captures() {
        let cmd = CommandBuilder::new("roll{count}d{sides}").build().unwrap();
        let header = cmd.match_head(&Token::text("roll2d6")).unwrap();
        assert_eq!(header["count"], ArgValue::Int(2));
        assert_eq!(header["sides"], ArgValue::Int(6));
        assert!(cmd.match_head(&Token::text("roll")).is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = CommandBuilder::new("a").build().unwrap();
        let b = CommandBuilder::new("a").build().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn test_validation() {
        let dup = CommandBuilder::new("x")
            .arg(Arg::new("a", ArgKind::Str))
            .option(Opt::new("a"))
            .build();
        assert!(matches!(dup, Err(GrammarError::Duplicate(_))));

        let help = CommandBuilder::new("x").option(Opt::new("hard").short('h')).build();
        assert!(matches!(help, Err(GrammarError::Reserved(_))));

        let multiple = CommandBuilder::new("x")
            .arg(Arg::new("a", ArgKind::Str).multiple())
            .arg(Arg::new("b", ArgKind::Str))
            .build();
        assert!(matches!(multiple, Err(GrammarError::MultipleNotLast(_))));
    }

    #[test]
    fn test_shortcut_expansion() {
        let cmd = CommandBuilder::new("echo")
            .header("/")
            .shortcut("hi", "/echo hello")
            .build()
            .unwrap();
        cmd.add_shortcut(r"tell(\w+)", "/echo to $1", false).unwrap();

        let expanded = cmd
            .expand_shortcut(&[Token::text("hi"), Token::text("there")])
            .unwrap();
        assert_eq!(
            expanded,
            vec![Token::text("/echo"), Token::text("hello"), Token::text("there")]
        );

        let expanded = cmd.expand_shortcut(&[Token::text("tellbob")]).unwrap();
        assert_eq!(
            expanded,
            vec![Token::text("/echo"), Token::text("to"), Token::text("bob")]
        );
        assert!(cmd.expand_shortcut(&[Token::text("tellbob"), Token::text("x")]).is_none());

        assert!(cmd.remove_shortcut("hi"));
        assert!(cmd.expand_shortcut(&[Token::text("hi")]).is_none());
    }

    #[test]
    fn test_kind_conversion() {
        assert_eq!(ArgKind::Int.convert(Token::text("-3")), Ok(ArgValue::Int(-3)));
        assert!(ArgKind::Int.convert(Token::text("x")).is_err());
        assert_eq!(ArgKind::At.convert(Token::text("@42")), Ok(ArgValue::At("42".into())));
        assert!(ArgKind::Str.convert(Token::Element(Segment::At("1".into()))).is_err());
        let choice = ArgKind::Choice(vec!["on".into(), "off".into()]);
        assert!(choice.convert(Token::text("maybe")).is_err());
    }
}
