use crate::context::ClaspContext;
use crate::error::ExtractResult;
use clasp_core::{BoxedBot, BoxedEvent};

/// A trait for types that can be extracted from a [`ClaspContext`].
///
/// Types implementing this trait can be used directly as handler function
/// parameters. When extraction fails the handler is skipped.
pub trait FromContext: Sized {
    /// Attempts to extract this type from the given context.
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self>;
}

/// Extracts the event as a clone of the type-erased [`BoxedEvent`].
impl FromContext for BoxedEvent {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        Ok(ctx.event().clone())
    }
}

/// Optional parameters never fail; they yield `None` instead.
impl<T: FromContext> FromContext for Option<T> {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        Ok(T::from_context(ctx).ok())
    }
}

/// Injects the bot so handlers can talk back to the platform:
///
/// ```rust,ignore
/// async fn my_handler(bot: BoxedBot, event: BoxedEvent) {
///     bot.send(&*event, &"Hello!".into()).await.ok();
/// }
/// ```
impl FromContext for BoxedBot {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        Ok(ctx.bot_arc())
    }
}
