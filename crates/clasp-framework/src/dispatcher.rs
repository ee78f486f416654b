//! Event dispatcher for the Clasp framework.
//!
//! The [`Dispatcher`] receives events and distributes them:
//!
//! 1. Pending [interrupt waiters](crate::interrupt) are offered the event
//!    first. A waiter that accepts it consumes it.
//! 2. Otherwise every plugin runs **sequentially** in registration order,
//!    sharing one [`BaseContext`]. Any service may stop propagation to
//!    skip the rest.
//!
//! `Dispatcher` is a cheap handle; clones share plugins and waiters.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use tracing::{Instrument, Level, debug, span};

use crate::context::{BaseContext, ClaspContext, PluginContext};
use crate::interrupt::Interrupts;
use crate::plugin::Plugin;
use clasp_core::{BoxedBot, BoxedEvent};

#[derive(Default)]
struct DispatcherInner {
    plugins: RwLock<Vec<Arc<Plugin>>>,
    interrupts: Interrupts,
}

/// The central event dispatcher.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin. Plugins are run in the order they are added.
    pub fn add(&self, plugin: Arc<Plugin>) {
        self.inner.plugins.write().push(plugin);
    }

    /// Removes the plugin named `name`, returning it.
    pub fn remove(&self, name: &str) -> Option<Arc<Plugin>> {
        let mut plugins = self.inner.plugins.write();
        let pos = plugins.iter().position(|p| p.name() == name)?;
        Some(plugins.remove(pos))
    }

    /// Returns the number of registered plugins.
    pub fn plugin_count(&self) -> usize {
        self.inner.plugins.read().len()
    }

    /// Returns the names of the registered plugins, in dispatch order.
    pub fn plugin_names(&self) -> Vec<String> {
        self.inner
            .plugins
            .read()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Returns the interrupt waiters of this dispatcher.
    pub fn interrupts(&self) -> &Interrupts {
        &self.inner.interrupts
    }

    /// Dispatches an event.
    ///
    /// Returns `true` if a waiter consumed the event or any service
    /// accepted it.
    pub fn dispatch(&self, event: BoxedEvent, bot: BoxedBot) -> BoxFuture<'static, bool> {
        let span = span!(Level::DEBUG, "dispatch", event_name = %event.event_name());
        let this = self.clone();
        async move {
            if this.inner.interrupts.offer(&event) {
                debug!("Event consumed by an interrupt waiter");
                return true;
            }

            let plugins: Vec<Arc<Plugin>> = this.inner.plugins.read().clone();
            let base = Arc::new(BaseContext::new(event, bot, this.clone()));
            let mut accepted = false;

            for plugin in plugins {
                if !base.is_propagating() {
                    break;
                }
                let ctx = Arc::new(ClaspContext::new(
                    base.clone(),
                    PluginContext::new(plugin.name(), plugin.config_value()),
                ));
                let plugin_span = span!(Level::DEBUG, "plugin", plugin = %plugin.name());
                accepted |= plugin.dispatch_event(ctx).instrument(plugin_span).await;
            }

            accepted
        }
        .instrument(span)
        .boxed()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("plugin_count", &self.plugin_count())
            .field("interrupts", &self.inner.interrupts)
            .finish()
    }
}
