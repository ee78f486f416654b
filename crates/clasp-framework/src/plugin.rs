//! Plugins: named bundles of services and command schemas.

use std::any::Any;
use std::borrow::Cow;
use std::sync::Arc;

use serde_json::Value;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Service, ServiceExt};
use tracing::{debug, error};

use crate::context::ClaspContext;
use crate::error::EventSkipped;

type BoxedHandlerService = BoxCloneSyncService<Arc<ClaspContext>, (), BoxError>;

/// A schema object attached to a plugin, handed to every
/// [`Behaviour`](crate::manager::Behaviour) on load and unload.
pub type Schema = Arc<dyn Any + Send + Sync>;

/// A plugin instance bundling services, schemas and its config section.
///
/// ```rust,ignore
/// let plugin = Plugin::new("echo")
///     .schema(CommandSchema(echo_cmd.clone()))
///     .service(on_message().layer(manager.on_parsed(echo_cmd)).handler(echo));
/// ```
///
/// `Plugin` is `Send + Sync`; use interior mutability for state that changes
/// across events.
pub struct Plugin {
    name: Cow<'static, str>,
    services: Vec<BoxedHandlerService>,
    schemas: Vec<Schema>,
    config: Arc<Value>,
}

impl Plugin {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            services: Vec::new(),
            schemas: Vec::new(),
            config: Arc::new(Value::Null),
        }
    }

    /// Appends a service. Services run in the order they were added.
    pub fn service<S>(mut self, service: S) -> Self
    where
        S: Service<Arc<ClaspContext>, Response = (), Error = BoxError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        self.services.push(BoxCloneSyncService::new(service));
        self
    }

    /// Attaches a schema for the loaded behaviours to allocate.
    pub fn schema<T: Any + Send + Sync>(mut self, schema: T) -> Self {
        self.schemas.push(Arc::new(schema));
        self
    }

    /// Sets the plugin's config section.
    pub fn config(mut self, config: Value) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    pub(crate) fn config_value(&self) -> Arc<Value> {
        self.config.clone()
    }

    pub(crate) fn set_config(&mut self, config: Value) {
        self.config = Arc::new(config);
    }

    /// Runs the service chain for one event.
    ///
    /// Returns `true` if any service accepted the event.
    pub(crate) async fn dispatch_event(&self, ctx: Arc<ClaspContext>) -> bool {
        let mut accepted = false;
        for svc in self.services.iter().cloned() {
            if !ctx.is_propagating() {
                debug!(plugin = %self.name, "Propagation stopped, halting service chain");
                break;
            }
            match svc.oneshot(ctx.clone()).await {
                Ok(()) => accepted = true,
                Err(e) if e.is::<EventSkipped>() => {}
                Err(e) => {
                    error!(
                        plugin = %self.name,
                        error  = %e,
                        "Service returned an error"
                    );
                }
            }
        }
        accepted
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("services", &self.services.len())
            .field("schemas", &self.schemas.len())
            .finish()
    }
}
