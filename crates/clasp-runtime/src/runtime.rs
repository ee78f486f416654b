//! Runtime orchestration.
//!
//! [`ClaspRuntime`] owns the pieces a bot process shares: the
//! [`Dispatcher`], the [`CommandManager`] with its result cache and the
//! [`PluginManager`] wired to it through a [`CommandBehaviour`]. Adapters
//! feed it events with [`ClaspRuntime::dispatch`], which runs every event
//! in its own task so completion sessions can receive follow-up messages.
//!
//! ```rust,ignore
//! let runtime = ClaspRuntime::builder().config_file("clasp.toml").build()?;
//! runtime.load_plugin(greeter(&runtime));
//! runtime.start()?;
//! // adapter: runtime.dispatch(event, bot);
//! runtime.run().await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use clasp_core::{BoxedBot, BoxedEvent};
use clasp_framework::command::{
    CommandAdapter, CommandBehaviour, CommandLayer, CommandManager, CommandParser,
};
use clasp_framework::{Dispatcher, Plugin, PluginManager};

use crate::config::{ClaspConfig, ConfigLoader, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

pub struct ClaspRuntime {
    config: ClaspConfig,
    dispatcher: Dispatcher,
    commands: Arc<CommandManager>,
    plugins: PluginManager,
    shutdown: CancellationToken,
    running: AtomicBool,
}

impl ClaspRuntime {
    /// Loads configuration from the current directory, falling back to
    /// defaults when it cannot be loaded.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: failed to load configuration ({e}), using defaults");
                ClaspConfig::default()
            });
        Self::from_config(config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Initializes logging and builds the runtime. The configuration is
    /// used as given; [`RuntimeBuilder::build`] validates it first.
    pub fn from_config(config: ClaspConfig) -> Self {
        logging::init_from_config(&config.logging);

        let dispatcher = Dispatcher::new();
        let commands = Arc::new(CommandManager::new(config.command.clone()));
        let plugins = PluginManager::new(dispatcher.clone(), config.plugins.clone());
        plugins.add_behaviour(Arc::new(CommandBehaviour::new(commands.clone())));

        info!(
            level = %config.logging.level,
            send_mode = ?config.command.send_mode,
            completion = config.command.completion.is_some(),
            "Runtime initialized"
        );

        Self {
            config,
            dispatcher,
            commands,
            plugins,
            shutdown: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ClaspConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn commands(&self) -> &Arc<CommandManager> {
        &self.commands
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    /// A command layer with the configured defaults.
    pub fn on_parsed(&self, parser: Arc<dyn CommandParser>) -> CommandLayer {
        self.commands.on_parsed(parser)
    }

    /// Sets the adapter used by command layers created from now on.
    pub fn set_command_adapter(&self, adapter: Arc<dyn CommandAdapter>) {
        self.commands.set_adapter(adapter);
    }

    pub fn load_plugin(&self, plugin: Plugin) {
        self.plugins.load(plugin);
    }

    pub fn unload_plugin(&self, name: &str) -> bool {
        self.plugins.unload(name)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start(&self) -> RuntimeResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyRunning);
        }
        info!(
            plugins = self.dispatcher.plugin_count(),
            commands = self.commands.len(),
            "Runtime started"
        );
        Ok(())
    }

    /// Stops accepting events, wakes [`run`](Self::run) and drops every
    /// cached command result.
    pub fn stop(&self) -> RuntimeResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(RuntimeError::NotRunning);
        }
        self.shutdown.cancel();
        self.commands.clear();
        info!("Runtime stopped");
        Ok(())
    }

    /// A token cancelled when the runtime stops.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Dispatches `event` in a new task.
    ///
    /// Returns `None` when the runtime is not running. The task resolves to
    /// whether any service accepted the event.
    pub fn dispatch(&self, event: BoxedEvent, bot: BoxedBot) -> Option<JoinHandle<bool>> {
        if !self.is_running() {
            debug!(event_name = %event.event_name(), "Runtime not running, event dropped");
            return None;
        }
        Some(tokio::spawn(self.dispatcher.dispatch(event, bot)))
    }

    /// Starts the runtime if needed and waits for Ctrl+C or [`stop`](Self::stop).
    pub async fn run(&self) -> RuntimeResult<()> {
        if !self.is_running() {
            self.start()?;
        }
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Shutdown signal received");
                if let Err(e) = self.stop() {
                    warn!(error = %e, "Runtime was already stopped");
                }
            }
            _ = self.shutdown.cancelled() => {}
        }
        Ok(())
    }
}

impl Default for ClaspRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder loading and validating configuration before creating a
/// [`ClaspRuntime`].
pub struct RuntimeBuilder {
    loader: ConfigLoader,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new().with_current_dir(),
        }
    }

    pub fn config_file(mut self, path: impl AsRef<std::path::Path>) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Programmatic values, overridden by files and the environment.
    pub fn config(mut self, config: ClaspConfig) -> Self {
        self.loader = self.loader.merge(config);
        self
    }

    pub fn build(self) -> RuntimeResult<ClaspRuntime> {
        let config = self.loader.load()?;
        validate_config(&config)?;
        Ok(ClaspRuntime::from_config(config))
    }
}
