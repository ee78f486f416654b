//! Pre-configured service builders for filtering events.
//!
//! Each function returns a [`ServiceBuilder`] with a [`Rule`](crate::handler::Rule)
//! stacked. Mismatches are rejected with
//! [`EventSkipped`](crate::error::EventSkipped), which the dispatcher
//! silently ignores.
//!
//! ```rust,ignore
//! let svc = on_message()
//!     .layer(commands.on_parsed(echo))
//!     .handler(echo_handler);
//! ```

use std::any::TypeId;

use tower::ServiceBuilder;
use tower::filter::FilterLayer;
use tower_layer::{Identity, Stack};

use clasp_core::{Event, EventType};

use crate::context::ClaspContext;
use crate::handler::{Rule, ServiceBuilderExt};

/// The `ServiceBuilder` returned by [`on_message`], [`on_event_type`] and
/// [`on`].
pub type FilterServiceBuilder = ServiceBuilder<Stack<FilterLayer<Rule>, Identity>>;

/// Passes only events of the given [`EventType`].
pub fn on_event_type(event_type: EventType) -> FilterServiceBuilder {
    ServiceBuilder::new()
        .rule_sync(move |ctx: &ClaspContext| ctx.event().event_type() == event_type)
}

/// Passes only **message** events.
pub fn on_message() -> FilterServiceBuilder {
    on_event_type(EventType::Message)
}

/// Passes only events of the concrete type `E`.
///
/// ```rust,ignore
/// let listener = on::<OutputMessage>().handler(log_output);
/// ```
pub fn on<E: Event>() -> FilterServiceBuilder {
    let type_id = TypeId::of::<E>();
    ServiceBuilder::new()
        .rule_sync(move |ctx: &ClaspContext| ctx.event().as_any().type_id() == type_id)
}

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;
    use crate::context::testing::{TestMessage, context};
    use crate::error::EventSkipped;

    #[tokio::test]
    async fn test_on_message_passes_messages() {
        let ctx = context(TestMessage::new("1", "hi"), Default::default());
        on_message().handler(|| async {}).oneshot(ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_on_type_rejects_other_types() {
        let ctx = context(TestMessage::new("1", "hi"), Default::default());
        on::<TestMessage>()
            .handler(|| async {})
            .oneshot(ctx.clone())
            .await
            .unwrap();

        let err = on_event_type(EventType::Notice)
            .handler(|| async {})
            .oneshot(ctx)
            .await
            .unwrap_err();
        assert!(err.is::<EventSkipped>());
    }
}
