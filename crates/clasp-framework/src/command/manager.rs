//! The command registry.
//!
//! [`CommandManager`] owns the shared [`ResultCache`] and the set of
//! registered commands, and hands out [`CommandLayer`]s preconfigured from
//! [`CommandConfig`]. Registration and unregistration both drop the
//! command's cached results.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::adapter::{CommandAdapter, DefaultAdapter};
use super::cache::{DEFAULT_CAPACITY, ResultCache, SuccessPolicy};
use super::completion::CompletionConfig;
use super::grammar::{Command, CommandId, GrammarError};
use super::layer::{CommandLayer, SendMode};
use super::parser::CommandParser;

/// Defaults applied to every layer created by [`CommandManager::on_parsed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Results kept per command.
    pub cache_capacity: usize,
    pub send_mode: SendMode,
    pub skip_for_unmatch: bool,
    pub success_policy: SuccessPolicy,
    pub need_tome: bool,
    pub remove_tome: bool,
    /// Completion is off unless this section is present.
    pub completion: Option<CompletionConfig>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            send_mode: SendMode::default(),
            skip_for_unmatch: true,
            success_policy: SuccessPolicy::default(),
            need_tome: false,
            remove_tome: false,
            completion: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no command named '{0}' is registered")]
    Unknown(String),

    #[error("command '{0}' does not support shortcuts")]
    Unsupported(String),

    #[error(transparent)]
    Grammar(#[from] GrammarError),
}

pub struct CommandManager {
    config: CommandConfig,
    cache: Arc<ResultCache>,
    adapter: RwLock<Arc<dyn CommandAdapter>>,
    commands: RwLock<BTreeMap<CommandId, Arc<dyn CommandParser>>>,
}

impl CommandManager {
    pub fn new(config: CommandConfig) -> Self {
        Self {
            cache: Arc::new(ResultCache::new(config.cache_capacity)),
            config,
            adapter: RwLock::new(Arc::new(DefaultAdapter::new())),
            commands: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Replaces the adapter given to layers created from now on.
    pub fn set_adapter(&self, adapter: Arc<dyn CommandAdapter>) {
        *self.adapter.write() = adapter;
    }

    /// Creates a layer for `parser` with the configured defaults.
    ///
    /// Every setting can still be overridden on the returned layer.
    pub fn on_parsed(&self, parser: Arc<dyn CommandParser>) -> CommandLayer {
        let config = &self.config;
        let mut layer = CommandLayer::new(parser, self.cache.clone())
            .adapter(self.adapter.read().clone())
            .send_mode(config.send_mode)
            .skip_for_unmatch(config.skip_for_unmatch)
            .success_policy(config.success_policy)
            .need_tome(config.need_tome)
            .remove_tome(config.remove_tome);
        if let Some(completion) = &config.completion {
            layer = layer.completion(completion.clone());
        }
        layer
    }

    /// Registers a command. Returns `false` if it replaced an existing
    /// registration of the same command.
    pub fn register(&self, parser: Arc<dyn CommandParser>) -> bool {
        let id = parser.id();
        self.cache.remove_command(id);
        let replaced = self.commands.write().insert(id, parser.clone()).is_some();
        if replaced {
            debug!(command = %parser.name(), %id, "Command re-registered");
        } else {
            info!(command = %parser.name(), %id, "Command registered");
        }
        !replaced
    }

    /// Unregisters a command and drops its cached results.
    pub fn unregister(&self, id: CommandId) -> Option<Arc<dyn CommandParser>> {
        self.cache.remove_command(id);
        let removed = self.commands.write().remove(&id);
        if let Some(parser) = &removed {
            info!(command = %parser.name(), %id, "Command unregistered");
        }
        removed
    }

    pub fn get(&self, id: CommandId) -> Option<Arc<dyn CommandParser>> {
        self.commands.read().get(&id).cloned()
    }

    /// Finds a registered command by name.
    pub fn find(&self, name: &str) -> Option<Arc<dyn CommandParser>> {
        self.commands
            .read()
            .values()
            .find(|parser| parser.name() == name)
            .cloned()
    }

    pub fn commands(&self) -> Vec<Arc<dyn CommandParser>> {
        self.commands.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }

    /// Adds a shortcut to a registered command.
    pub fn shortcut(
        &self,
        name: &str,
        key: &str,
        replacement: &str,
        fuzzy: bool,
    ) -> Result<(), RegistryError> {
        let parser = self
            .find(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;
        let command = parser
            .as_any()
            .downcast_ref::<Command>()
            .ok_or_else(|| RegistryError::Unsupported(name.to_string()))?;
        command.add_shortcut(key, replacement, fuzzy)?;
        self.cache.remove_command(command.id());
        Ok(())
    }

    /// Drops every cached result.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new(CommandConfig::default())
    }
}

impl std::fmt::Debug for CommandManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandManager")
            .field("config", &self.config)
            .field("commands", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::cache::Lookup;
    use crate::command::grammar::CommandBuilder;

    fn ping() -> Arc<Command> {
        CommandBuilder::new("ping").build().unwrap()
    }

    #[test]
    fn test_config_defaults_from_empty_section() {
        let config: CommandConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CommandConfig::default());
        assert_eq!(config.cache_capacity, 10);
        assert!(config.skip_for_unmatch);

        let config: CommandConfig =
            serde_json::from_str(r#"{"send_mode": "post", "success_policy": "all"}"#).unwrap();
        assert_eq!(config.send_mode, SendMode::Post);
        assert_eq!(config.success_policy, SuccessPolicy::All);
    }

    #[test]
    fn test_register_and_unregister_clear_cache() {
        let manager = CommandManager::default();
        let cmd = ping();
        assert!(manager.register(cmd.clone()));

        match manager.cache().get_or_create(cmd.id(), "m1") {
            Lookup::Fresh(resolver) => resolver.resolve(None),
            Lookup::Existing(_) => panic!("entry should be fresh"),
        }
        assert_eq!(manager.cache().len(cmd.id()), 1);

        assert!(!manager.register(cmd.clone()));
        assert_eq!(manager.cache().len(cmd.id()), 0);
        assert_eq!(manager.len(), 1);

        assert!(manager.unregister(cmd.id()).is_some());
        assert!(manager.unregister(cmd.id()).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_and_shortcut() {
        let manager = CommandManager::default();
        let cmd = ping();
        manager.register(cmd.clone());

        assert!(manager.find("ping").is_some());
        manager.shortcut("ping", "pong", "ping", false).unwrap();
        assert_eq!(cmd.shortcuts(), vec![("pong".to_string(), "ping".to_string())]);

        assert!(matches!(
            manager.shortcut("nope", "x", "y", false),
            Err(RegistryError::Unknown(_))
        ));
        assert!(matches!(
            manager.shortcut("ping", "(", "y", false),
            Err(RegistryError::Grammar(_))
        ));
    }
}
