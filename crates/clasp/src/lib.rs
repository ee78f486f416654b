//! # Clasp
//!
//! Structured commands for chat bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌────────────┐   ┌──────────────────────────────────────────────┐
//! │ Adapter │──▶│ Dispatcher │──▶│ Plugin: on_message → CommandLayer → handler  │
//! └─────────┘   └────────────┘   │ Plugin: ...                                  │
//!                    ▲           └──────────────────────────────────────────────┘
//!                    │ completion replies             │
//!                    └── interrupt waiters ◀──────────┘
//! ```
//!
//! - **Runtime** ([`runtime`]): configuration, logging and ownership of the
//!   shared dispatcher, command registry and result cache
//! - **Commands** ([`framework::command`]): grammar, parse deduplication,
//!   interactive completion and typed extraction of parsed values
//! - **Handlers**: async functions whose parameters are extracted from the
//!   context
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clasp::prelude::*;
//!
//! param!(Name = "name");
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = ClaspRuntime::builder().build()?;
//!
//!     let greet = CommandBuilder::new("greet")
//!         .header("/")
//!         .arg(ArgSpec::new("name", ArgKind::Str))
//!         .build()?;
//!
//!     runtime.load_plugin(
//!         Plugin::new("greeter")
//!             .schema(CommandSchema(greet.clone()))
//!             .service(
//!                 on_message()
//!                     .layer(runtime.on_parsed(greet))
//!                     .handler(|name: Arg<String, Name>| async move { format!("Hello, {}!", *name) }),
//!             ),
//!     );
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub use clasp_core as core;
pub use clasp_framework as framework;
pub use clasp_runtime as runtime;

pub use clasp_framework::param;

/// Commonly used types for building bots.
///
/// ```rust,ignore
/// use clasp::prelude::*;
/// ```
pub mod prelude {
    pub use clasp_runtime::ClaspRuntime;

    pub use clasp_framework::param;
    pub use clasp_framework::plugin::Plugin;

    pub use clasp_framework::handler::{HandlerService, Layer, ServiceBuilderExt};
    pub use clasp_framework::routing::{on, on_event_type, on_message};

    pub use clasp_framework::extractor::{Bot, Event, FromContext, PluginConfig};

    // Grammar
    pub use clasp_framework::command::{
        Arg as ArgSpec, ArgKind, CommandBuilder, CommandSchema, Opt, Subcommand,
    };

    // Dispatch options
    pub use clasp_framework::command::{
        CompletionConfig, QuoteSide, SendMode, SuccessPolicy,
    };

    // Handler parameters
    pub use clasp_framework::command::extractor::Arg;
    pub use clasp_framework::command::{
        CommandResult, Dup, Duplication, FromDuplication, Header, Match, OptionOf, Outcome,
        Output, OutputMessage, Query, SubcommandOf,
    };

    // Filters
    pub use clasp_framework::command::{
        Affix, AffixMatch, assign, check_account, endswith, fetch_name, match_path, match_value,
        startswith,
    };

    pub use clasp_core::{Bot as __Bot, BoxedBot, Event as __Event, Message, Segment};
}
