//! Plugin integration: commands follow the lifecycle of the plugin that
//! declares them.

use std::sync::Arc;

use crate::manager::Behaviour;
use crate::plugin::Schema;

use super::manager::CommandManager;
use super::parser::CommandParser;

/// Declares that a plugin owns a command.
///
/// ```rust,ignore
/// Plugin::new("echo").schema(CommandSchema(echo.clone()))
/// ```
#[derive(Clone)]
pub struct CommandSchema(pub Arc<dyn CommandParser>);

/// Registers commands when their plugin loads and unregisters them, cached
/// results included, when it unloads.
pub struct CommandBehaviour {
    manager: Arc<CommandManager>,
}

impl CommandBehaviour {
    pub fn new(manager: Arc<CommandManager>) -> Self {
        Self { manager }
    }
}

impl Behaviour for CommandBehaviour {
    fn allocate(&self, schema: &Schema) -> bool {
        match schema.downcast_ref::<CommandSchema>() {
            Some(CommandSchema(parser)) => {
                self.manager.register(parser.clone());
                true
            }
            None => false,
        }
    }

    fn release(&self, schema: &Schema) -> bool {
        match schema.downcast_ref::<CommandSchema>() {
            Some(CommandSchema(parser)) => self.manager.unregister(parser.id()).is_some(),
            None => false,
        }
    }
}
