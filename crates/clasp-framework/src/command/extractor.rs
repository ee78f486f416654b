//! Handler parameters backed by the published [`CommandResult`].
//!
//! Every extractor here reads the `Arc<CommandResult>` the command layer
//! stored in the context and answers through [`project`]. Names and paths
//! are supplied as types declared with [`param!`](crate::param):
//!
//! ```rust,ignore
//! param!(Name = "name");
//! param!(Times = "times.n", default = 1);
//!
//! async fn greet(name: Match<String, Name>, times: Query<i64, Times>) -> String {
//!     let name = name.result.unwrap_or_default();
//!     name.repeat(times.result.unwrap_or(1) as usize)
//! }
//! ```

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use super::outcome::{OutputType, ParseOutcome};
use super::parser::CommandParser;
use super::projection::{
    ArgsStub, CommandResult, Duplication, FromDuplication, OptionStub, Provided, Request,
    SubcommandStub, project,
};
use super::value::{ArgValue, FromArgValue};
use crate::context::ClaspContext;
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::FromContext;

/// A name or path known at compile time.
pub trait Param: Send + 'static {
    const NAME: &'static str;

    /// Used by [`Query`] and [`Arg`] when nothing matched.
    fn default_value() -> Option<ArgValue> {
        None
    }
}

/// Declares a [`Param`] type.
///
/// ```rust,ignore
/// param!(Target = "target");
/// param!(pub Count = "count.value", default = 1);
/// ```
#[macro_export]
macro_rules! param {
    ($vis:vis $name:ident = $key:literal) => {
        #[derive(Debug, Clone, Copy)]
        $vis struct $name;

        impl $crate::command::Param for $name {
            const NAME: &'static str = $key;
        }
    };
    ($vis:vis $name:ident = $key:literal, default = $default:expr) => {
        #[derive(Debug, Clone, Copy)]
        $vis struct $name;

        impl $crate::command::Param for $name {
            const NAME: &'static str = $key;

            fn default_value() -> Option<$crate::command::ArgValue> {
                Some($crate::command::ArgValue::from($default))
            }
        }
    };
}

fn published(ctx: &ClaspContext) -> ExtractResult<Arc<CommandResult>> {
    ctx.get_state::<Arc<CommandResult>>()
        .ok_or(ExtractError::NoCommandResult)
}

fn value_of<T: FromArgValue>(provided: Option<Provided>) -> Option<T> {
    match provided {
        Some(Provided::Value(value)) => T::from_arg_value(&value),
        _ => None,
    }
}

fn default_of<T: FromArgValue, P: Param>() -> Option<T> {
    P::default_value().as_ref().and_then(T::from_arg_value)
}

impl FromContext for Arc<CommandResult> {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        published(ctx)
    }
}

/// An argument by name, searched on every level.
///
/// `available` is `true` iff the argument matched and converts to `T`.
pub struct Match<T, K> {
    pub result: Option<T>,
    pub available: bool,
    _key: PhantomData<fn() -> K>,
}

impl<T: FromArgValue, K: Param> FromContext for Match<T, K> {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        let result = published(ctx)?;
        let value = value_of::<T>(project(&result, &Request::Match(K::NAME)));
        Ok(Match {
            available: value.is_some(),
            result: value,
            _key: PhantomData,
        })
    }
}

/// A dotted-path lookup.
///
/// Falls back to the param's default, in which case `available` is `false`.
pub struct Query<T, P> {
    pub result: Option<T>,
    pub available: bool,
    _path: PhantomData<fn() -> P>,
}

impl<T: FromArgValue, P: Param> FromContext for Query<T, P> {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        let result = published(ctx)?;
        match value_of::<T>(project(&result, &Request::Query(P::NAME))) {
            Some(value) => Ok(Query {
                result: Some(value),
                available: true,
                _path: PhantomData,
            }),
            None => Ok(Query {
                result: default_of::<T, P>(),
                available: false,
                _path: PhantomData,
            }),
        }
    }
}

/// A required argument, looked up by name.
///
/// Partial parses answer too. Extraction fails, and the handler is skipped,
/// when the argument is absent or not a `T`, unless the param has a default.
pub struct Arg<T, K>(pub T, PhantomData<fn() -> K>);

impl<T, K> Arg<T, K> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T, K> Deref for Arg<T, K> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: FromArgValue, K: Param> FromContext for Arg<T, K> {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        let result = published(ctx)?;
        value_of::<T>(project(&result, &Request::Plain(K::NAME)))
            .or_else(default_of::<T, K>)
            .map(|value| Arg(value, PhantomData))
            .ok_or_else(|| ExtractError::NotProvided(K::NAME.to_string()))
    }
}

/// Values captured by the command head.
#[derive(Debug, Clone)]
pub struct Header {
    pub captures: BTreeMap<String, ArgValue>,
    pub available: bool,
}

impl FromContext for Header {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        let result = published(ctx)?;
        let captures = match project(&result, &Request::Header) {
            Some(Provided::Header(captures)) => captures,
            _ => BTreeMap::new(),
        };
        Ok(Header {
            available: !captures.is_empty(),
            captures,
        })
    }
}

/// The raw parse outcome.
#[derive(Debug, Clone)]
pub struct Outcome(pub Arc<ParseOutcome>);

impl Deref for Outcome {
    type Target = ParseOutcome;

    fn deref(&self) -> &ParseOutcome {
        &self.0
    }
}

impl FromContext for Outcome {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        match project(&published(ctx)?, &Request::Outcome) {
            Some(Provided::Outcome(outcome)) => Ok(Outcome(outcome)),
            _ => Err(ExtractError::NotProvided("outcome".into())),
        }
    }
}

/// Output text kept in stay mode, with its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub text: Option<String>,
    pub kind: Option<OutputType>,
}

impl FromContext for Output {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        let result = published(ctx)?;
        let text = match project(&result, &Request::Output) {
            Some(Provided::Output(text)) => text,
            _ => None,
        };
        Ok(Output {
            text,
            kind: result.output_type,
        })
    }
}

/// The command that produced the result.
#[derive(Clone)]
pub struct CommandRef(pub Arc<dyn CommandParser>);

impl Deref for CommandRef {
    type Target = dyn CommandParser;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl FromContext for CommandRef {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        match project(&published(ctx)?, &Request::Command) {
            Some(Provided::Command(command)) => Ok(CommandRef(command)),
            _ => Err(ExtractError::NotProvided("command".into())),
        }
    }
}

impl FromContext for Duplication {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        match project(&published(ctx)?, &Request::Duplication) {
            Some(Provided::Duplication(dup)) => Ok(dup),
            _ => Err(ExtractError::NotProvided("duplication".into())),
        }
    }
}

impl FromContext for ArgsStub {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        match project(&published(ctx)?, &Request::ArgsStub) {
            Some(Provided::Args(args)) => Ok(args),
            _ => Err(ExtractError::NotProvided("args".into())),
        }
    }
}

/// The stub of the option named by `K`.
pub struct OptionOf<K>(pub OptionStub, PhantomData<fn() -> K>);

impl<K> Deref for OptionOf<K> {
    type Target = OptionStub;

    fn deref(&self) -> &OptionStub {
        &self.0
    }
}

impl<K: Param> FromContext for OptionOf<K> {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        match project(&published(ctx)?, &Request::OptionStub(K::NAME)) {
            Some(Provided::Option(stub)) => Ok(OptionOf(stub, PhantomData)),
            _ => Err(ExtractError::NotProvided(K::NAME.to_string())),
        }
    }
}

/// The stub of the subcommand named by `K`.
pub struct SubcommandOf<K>(pub SubcommandStub, PhantomData<fn() -> K>);

impl<K> Deref for SubcommandOf<K> {
    type Target = SubcommandStub;

    fn deref(&self) -> &SubcommandStub {
        &self.0
    }
}

impl<K: Param> FromContext for SubcommandOf<K> {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        match project(&published(ctx)?, &Request::SubcommandStub(K::NAME)) {
            Some(Provided::Subcommand(stub)) => Ok(SubcommandOf(stub, PhantomData)),
            _ => Err(ExtractError::NotProvided(K::NAME.to_string())),
        }
    }
}

/// A user-defined view built through [`FromDuplication`].
pub struct Dup<T>(pub T);

impl<T> Deref for Dup<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: FromDuplication> FromContext for Dup<T> {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        let dup = Duplication::from_context(ctx)?;
        T::from_duplication(&dup)
            .map(Dup)
            .ok_or_else(|| ExtractError::NotProvided(std::any::type_name::<T>().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::command::projection::testing::result_for;
    use crate::context::testing::{TestMessage, context};

    crate::param!(Name = "name");
    crate::param!(Missing = "loud.volume", default = 5);
    crate::param!(Times = "times");
    crate::param!(Loud = "loud");

    fn ctx_with(input: &str) -> Arc<ClaspContext> {
        let ctx = context(TestMessage::new("1", input), Default::default());
        ctx.set_state(result_for(input));
        ctx
    }

    #[test]
    fn test_match_reports_availability() {
        let ctx = ctx_with("greet abc");
        let name = Match::<String, Name>::from_context(&ctx).unwrap();
        assert_eq!(name.result.as_deref(), Some("abc"));
        assert!(name.available);

        let wrong = Match::<i64, Name>::from_context(&ctx).unwrap();
        assert!(!wrong.available);
        assert_eq!(wrong.result, None);
    }

    #[test]
    fn test_query_falls_back_to_default() {
        let ctx = ctx_with("greet abc");
        let volume = Query::<i64, Missing>::from_context(&ctx).unwrap();
        assert!(!volume.available);
        assert_eq!(volume.result, Some(5));
    }

    #[test]
    fn test_arg_requires_a_value() {
        let ctx = ctx_with("greet abc");
        assert_eq!(&*Arg::<String, Name>::from_context(&ctx).unwrap(), "abc");
        assert!(matches!(
            Arg::<i64, Times>::from_context(&ctx),
            Err(ExtractError::NotProvided(_))
        ));
    }

    #[test]
    fn test_stubs_and_views() {
        let ctx = ctx_with("greet abc -t 3 loud");
        let times = OptionOf::<Times>::from_context(&ctx).unwrap();
        assert!(times.available);
        assert_eq!(times.value, Some(3.into()));
        assert!(SubcommandOf::<Loud>::from_context(&ctx).unwrap().available);
        assert!(ArgsStub::from_context(&ctx).unwrap().available);
        assert!(!Header::from_context(&ctx).unwrap().available);
        assert_eq!(CommandRef::from_context(&ctx).unwrap().name(), "greet");
        assert_eq!(Output::from_context(&ctx).unwrap().text, None);

        struct Greeting(String);
        impl FromDuplication for Greeting {
            fn from_duplication(dup: &Duplication) -> Option<Self> {
                dup.arg::<String>("name").map(Greeting)
            }
        }
        assert_eq!(Dup::<Greeting>::from_context(&ctx).unwrap().0.0, "abc");
    }

    #[test]
    fn test_missing_result_is_an_error() {
        let ctx = context(TestMessage::new("1", "greet abc"), Default::default());
        assert!(matches!(
            Outcome::from_context(&ctx),
            Err(ExtractError::NoCommandResult)
        ));
        assert!(Option::<Outcome>::from_context(&ctx).unwrap().is_none());
    }
}
