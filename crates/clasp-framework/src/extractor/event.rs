use crate::context::ClaspContext;
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::FromContext;
use clasp_core::Event as EventTrait;

/// Context wrapper that provides access to a concrete event type.
///
/// Use `Deref` to access fields directly on the wrapped type.
///
/// ```rust,ignore
/// async fn handler(event: Event<ConsoleMessage>) {
///     println!("From: {} Message: {}", event.user, event.text);
/// }
/// ```
pub struct Event<T: EventTrait>(pub T);

impl<T: EventTrait> std::ops::Deref for Event<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: EventTrait> AsRef<dyn EventTrait> for Event<T> {
    fn as_ref(&self) -> &dyn EventTrait {
        &self.0
    }
}

impl<T: EventTrait + std::fmt::Debug> std::fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event").field("data", &self.0).finish()
    }
}

impl<T: EventTrait + Clone> FromContext for Event<T> {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        ctx.event()
            .downcast_ref::<T>()
            .cloned()
            .map(Event)
            .ok_or_else(|| ExtractError::EventTypeMismatch {
                expected: std::any::type_name::<T>(),
                got: ctx.event().event_name(),
            })
    }
}
