use std::sync::Arc;

use crate::context::ClaspContext;
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::FromContext;
use clasp_core::Bot as BotTrait;

/// Context wrapper that provides access to a concrete bot type.
///
/// Use this when a handler needs protocol-specific APIs that are not part
/// of the [`Bot`](clasp_core::Bot) trait.
#[derive(Clone)]
pub struct Bot<T: BotTrait>(pub Arc<T>);

impl<T: BotTrait> std::ops::Deref for Bot<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: BotTrait + std::fmt::Debug> std::fmt::Debug for Bot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot").field("bot", &self.0).finish()
    }
}

impl<T: BotTrait> FromContext for Bot<T> {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        Arc::downcast::<T>(ctx.bot_arc().as_any())
            .map(Bot)
            .map_err(|_| ExtractError::BotTypeMismatch {
                expected: std::any::type_name::<T>(),
            })
    }
}
