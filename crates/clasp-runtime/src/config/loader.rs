//! Layered configuration loading with figment.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. Programmatic values given to [`ConfigLoader::merge`]
//! 3. The profile file (`clasp.{profile}.toml`), then the main file
//!    (`clasp.toml`), from the first search path that has one
//! 4. `CLASP_*` environment variables
//!
//! Environment keys use `__` as the section separator:
//!
//! - `CLASP_LOGGING__LEVEL=debug` sets `logging.level`
//! - `CLASP_COMMAND__SEND_MODE=post` sets `command.send_mode`
//! - `CLASP_PLUGINS__GREETER__GREETING=hi` sets `plugins.greeter.greeting`
//!
//! TOML files need the `toml-config` feature and YAML files (`clasp.yaml`,
//! `clasp.yml`) the `yaml-config` feature.

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::ClaspConfig;

const ENV_PREFIX: &str = "CLASP_";
const FILE_STEM: &str = "clasp";

/// Selects the profile-specific config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads `CLASP_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(format!("{ENV_PREFIX}PROFILE"))
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }

    fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for a [`ClaspConfig`].
///
/// ```rust,ignore
/// let config = ConfigLoader::new()
///     .profile("production")
///     .file("deploy/clasp.toml")
///     .load()?;
/// ```
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory searched for config files.
    ///
    /// Without explicit paths the current directory and the user config
    /// directory (`~/.config/clasp` on Linux) are searched.
    pub fn search_path(mut self, path: impl AsRef<Path>) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges programmatic values below files and environment.
    pub fn merge(mut self, config: ClaspConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    pub fn load(self) -> ConfigResult<ClaspConfig> {
        let profile = self.profile.clone();
        let config: ClaspConfig = self.figment()?.extract()?;
        debug!(
            %profile,
            level = %config.logging.level,
            plugins = config.plugins.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(ClaspConfig::default()))
            .merge(self.overrides.clone());

        figment = match &self.config_file {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration file");
                merge_file(figment, path)?
            }
            Some(path) => return Err(ConfigError::FileNotFound(path.clone())),
            None => self.search(figment),
        };

        if self.load_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }
        Ok(figment)
    }

    fn search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join(FILE_STEM)))
            .collect()
    }

    /// Merges the profile and main file of the first directory holding a
    /// main file.
    fn search(&self, mut figment: Figment) -> Figment {
        for dir in self.search_paths() {
            let mut found = false;
            for ext in enabled_extensions() {
                let profile_path = dir.join(format!("{FILE_STEM}.{}.{ext}", self.profile));
                let main_path = dir.join(format!("{FILE_STEM}.{ext}"));
                if !main_path.exists() {
                    continue;
                }
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile configuration");
                    figment = merge_known(figment, &profile_path, ext);
                }
                info!(path = %main_path.display(), "Loading configuration file");
                figment = merge_known(figment, &main_path, ext);
                found = true;
            }
            if found {
                return figment;
            }
        }
        warn!("No configuration file found, using defaults");
        figment
    }
}

fn enabled_extensions() -> &'static [&'static str] {
    &[
        #[cfg(feature = "toml-config")]
        "toml",
        #[cfg(feature = "yaml-config")]
        "yaml",
        #[cfg(feature = "yaml-config")]
        "yml",
    ]
}

fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if enabled_extensions().contains(&ext) {
        Ok(merge_known(figment, path, ext))
    } else {
        Err(ConfigError::UnsupportedFormat(ext.to_string()))
    }
}

#[allow(unused_variables)]
fn merge_known(figment: Figment, path: &Path, ext: &str) -> Figment {
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => figment.merge(Toml::file(path)),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => figment.merge(Yaml::file(path)),
        _ => figment,
    }
}

/// Loads from the default locations.
pub fn load_config() -> ConfigResult<ClaspConfig> {
    ConfigLoader::new().load()
}

/// Loads one file plus environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<ClaspConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use clasp_framework::command::{SendMode, SuccessPolicy};

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_defaults_without_sources() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.logging.level, LogLevel::Info);
            assert_eq!(config.command.cache_capacity, 10);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        Jail::expect_with(|jail| {
            jail.set_env("CLASP_LOGGING__LEVEL", "debug");
            jail.set_env("CLASP_COMMAND__SEND_MODE", "post");
            jail.set_env("CLASP_PLUGINS__GREETER__GREETING", "hi");

            let config = ConfigLoader::new().search_path(jail.directory()).load().unwrap();
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.command.send_mode, SendMode::Post);
            assert_eq!(config.plugins["greeter"]["greeting"], "hi");
            Ok(())
        });
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("CLASP_PROFILE", "prod");
            assert_eq!(Profile::from_env(), Profile::Production);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ConfigLoader::new().file("/nonexistent/clasp.toml").load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_is_overridden_by_main_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "clasp.production.toml",
                "[command]\nsuccess_policy = \"all\"\ncache_capacity = 3",
            )?;
            jail.create_file("clasp.toml", "[command]\ncache_capacity = 5")?;

            let config = ConfigLoader::new()
                .profile("production")
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.command.cache_capacity, 5);
            assert_eq!(config.command.success_policy, SuccessPolicy::All);
            Ok(())
        });
    }
}
