use serde::de::DeserializeOwned;

use crate::context::ClaspContext;
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::FromContext;

/// The current plugin's config section, deserialized into `T`.
///
/// ```rust,ignore
/// #[derive(Deserialize)]
/// struct EchoConfig { prefix: String }
///
/// async fn echo(cfg: PluginConfig<EchoConfig>) -> String {
///     cfg.prefix.clone()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PluginConfig<T>(pub T);

impl<T> std::ops::Deref for PluginConfig<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: DeserializeOwned> FromContext for PluginConfig<T> {
    fn from_context(ctx: &ClaspContext) -> ExtractResult<Self> {
        let config = ctx.plugin_config();
        T::deserialize(&*config).map(PluginConfig).map_err(|e| {
            ExtractError::custom(format!(
                "invalid config for plugin '{}': {e}",
                ctx.plugin_name()
            ))
        })
    }
}
