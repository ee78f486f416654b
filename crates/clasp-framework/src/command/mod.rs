//! Command resolution for chat messages.
//!
//! A [`Command`] is an immutable grammar built with [`CommandBuilder`]:
//! a head (name, aliases, prefixes or a `{capture}` pattern), positional
//! [`Arg`]s, [`Opt`]ions and nested [`Subcommand`]s. Parsing is done by
//! clap; rich message elements such as mentions and images are swapped for
//! placeholders before clap sees the input and restored afterwards.
//!
//! A [`CommandLayer`] binds a command to a tower service. It parses each
//! message once per command (see [`ResultCache`]), drives interactive
//! completion for incomplete input, delivers help and error text according
//! to its [`SendMode`] and publishes an `Arc<CommandResult>` that handlers
//! read through the extractors in [`extractor`].
//!
//! ```rust,ignore
//! use clasp_framework::command::{Arg, ArgKind, CommandBuilder, CommandSchema};
//! use clasp_framework::command::extractor::Arg as Value;
//!
//! param!(Name = "name");
//!
//! let greet = CommandBuilder::new("greet")
//!     .header("/")
//!     .arg(Arg::new("name", ArgKind::Str))
//!     .build()?;
//!
//! let plugin = Plugin::new("greeter")
//!     .schema(CommandSchema(greet.clone()))
//!     .service(
//!         commands
//!             .on_parsed(greet)
//!             .handler(|name: Value<String, Name>| async move { format!("Hello, {}!", *name) }),
//!     );
//! ```

pub mod adapter;
pub mod behaviour;
pub mod cache;
pub mod completion;
pub mod extractor;
pub mod grammar;
pub mod layer;
pub mod manager;
pub mod outcome;
pub mod output;
pub mod parser;
pub mod projection;
pub mod segment;
pub mod token;
pub mod tools;
pub mod value;

pub use adapter::{CommandAdapter, Converter, DefaultAdapter};
pub use behaviour::{CommandBehaviour, CommandSchema};
pub use cache::{ResultCache, SuccessPolicy};
pub use completion::{CompletionConfig, Control, RawInput};
pub use extractor::{
    CommandRef, Dup, Header, Match, OptionOf, Outcome, Output, Param, Query, SubcommandOf,
};
pub use grammar::{
    Arg, ArgKind, Command, CommandBuilder, CommandId, CommandMeta, GrammarError, Opt, Subcommand,
};
pub use layer::{CommandLayer, CommandService, SendMode};
pub use manager::{CommandConfig, CommandManager, RegistryError};
pub use outcome::{Candidate, OptionResult, OutputType, ParseError, ParseOutcome, SubcommandResult};
pub use output::OutputMessage;
pub use parser::{CommandParser, parse_guarded};
pub use projection::{ArgsStub, CommandResult, Duplication, FromDuplication, OptionStub, SubcommandStub};
pub use segment::{AtSegment, ImageSegment};
pub use token::{QuoteSide, Token};
pub use tools::{
    Affix, AffixMatch, ContextFilter, assign, check_account, endswith, fetch_name, match_path,
    match_value, startswith,
};
pub use value::{ArgValue, FromArgValue};
