//! Plugin lifecycle management.
//!
//! [`PluginManager`] loads plugins into a [`Dispatcher`] and lets registered
//! [`Behaviour`]s react to the schemas each plugin carries. A behaviour
//! *allocates* the schemas it understands on load and *releases* them on
//! unload; the command subsystem uses this to keep its registry and result
//! cache in sync with the loaded plugins.
//!
//! ```rust,ignore
//! let manager = PluginManager::new(dispatcher.clone(), plugin_configs);
//! manager.add_behaviour(Arc::new(CommandBehaviour::new(commands.clone())));
//! manager.load(echo_plugin());
//! // ...later...
//! manager.unload("echo");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::plugin::{Plugin, Schema};

/// Reacts to plugin schemas entering and leaving the system.
pub trait Behaviour: Send + Sync + 'static {
    /// Called for every schema of a plugin being loaded.
    ///
    /// Returns `true` if the behaviour recognised and took the schema.
    fn allocate(&self, schema: &Schema) -> bool;

    /// Called for every schema of a plugin being unloaded.
    fn release(&self, schema: &Schema) -> bool;
}

/// Owns plugin registration and drives behaviours.
pub struct PluginManager {
    dispatcher: Dispatcher,
    behaviours: RwLock<Vec<Arc<dyn Behaviour>>>,
    /// Per-plugin config sections, keyed by plugin name.
    plugin_configs: HashMap<String, Value>,
}

impl PluginManager {
    pub fn new(dispatcher: Dispatcher, plugin_configs: HashMap<String, Value>) -> Self {
        Self {
            dispatcher,
            behaviours: RwLock::new(Vec::new()),
            plugin_configs,
        }
    }

    pub fn add_behaviour(&self, behaviour: Arc<dyn Behaviour>) {
        self.behaviours.write().push(behaviour);
    }

    /// Loads a plugin: allocates its schemas and adds it to the dispatcher.
    ///
    /// Loading a plugin whose name is already taken replaces the old one;
    /// the old plugin's schemas are released first.
    pub fn load(&self, mut plugin: Plugin) {
        if let Some(old) = self.dispatcher.remove(plugin.name()) {
            self.release_schemas(&old);
            warn!(plugin = %plugin.name(), "Plugin reloaded, previous instance replaced");
        }

        let config = self
            .plugin_configs
            .get(plugin.name())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::default()));
        plugin.set_config(config);

        let behaviours = self.behaviours.read().clone();
        for schema in plugin.schemas() {
            let taken = behaviours.iter().filter(|b| b.allocate(schema)).count();
            if taken == 0 {
                debug!(plugin = %plugin.name(), "Schema not claimed by any behaviour");
            }
        }

        info!(plugin = %plugin.name(), "Plugin loaded");
        self.dispatcher.add(Arc::new(plugin));
    }

    /// Unloads the named plugin. Returns `false` if it was not loaded.
    pub fn unload(&self, name: &str) -> bool {
        match self.dispatcher.remove(name) {
            Some(plugin) => {
                self.release_schemas(&plugin);
                info!(plugin = %name, "Plugin unloaded");
                true
            }
            None => false,
        }
    }

    /// Unloads every plugin.
    pub fn unload_all(&self) {
        while let Some(name) = self.first_plugin_name() {
            self.unload(&name);
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn first_plugin_name(&self) -> Option<String> {
        self.dispatcher.plugin_names().into_iter().next()
    }

    fn release_schemas(&self, plugin: &Plugin) {
        let behaviours = self.behaviours.read().clone();
        for schema in plugin.schemas() {
            for behaviour in &behaviours {
                behaviour.release(schema);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Named(&'static str);

    #[derive(Default)]
    struct Counting {
        allocated: AtomicUsize,
        released: AtomicUsize,
    }

    impl Behaviour for Counting {
        fn allocate(&self, schema: &Schema) -> bool {
            let ours = schema.downcast_ref::<Named>().is_some();
            if ours {
                self.allocated.fetch_add(1, Ordering::SeqCst);
            }
            ours
        }

        fn release(&self, schema: &Schema) -> bool {
            let ours = schema.downcast_ref::<Named>().is_some();
            if ours {
                self.released.fetch_add(1, Ordering::SeqCst);
            }
            ours
        }
    }

    #[test]
    fn test_load_unload_drive_behaviours() {
        let manager = PluginManager::new(Dispatcher::new(), HashMap::new());
        let behaviour = Arc::new(Counting::default());
        manager.add_behaviour(behaviour.clone());

        manager.load(Plugin::new("a").schema(Named("x")).schema(42u8));
        assert_eq!(behaviour.allocated.load(Ordering::SeqCst), 1);
        assert_eq!(manager.dispatcher().plugin_count(), 1);

        assert!(manager.unload("a"));
        assert!(!manager.unload("a"));
        assert_eq!(behaviour.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reload_releases_previous_instance() {
        let manager = PluginManager::new(Dispatcher::new(), HashMap::new());
        let behaviour = Arc::new(Counting::default());
        manager.add_behaviour(behaviour.clone());

        manager.load(Plugin::new("a").schema(Named("x")));
        manager.load(Plugin::new("a").schema(Named("x")));
        assert_eq!(behaviour.allocated.load(Ordering::SeqCst), 2);
        assert_eq!(behaviour.released.load(Ordering::SeqCst), 1);
        assert_eq!(manager.dispatcher().plugin_count(), 1);

        manager.unload_all();
        assert_eq!(manager.dispatcher().plugin_count(), 0);
    }
}
