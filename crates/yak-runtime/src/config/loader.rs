//! Configuration loader using figment.
//!
//! # Sources (lowest to highest priority)
//!
//! 1. Built-in defaults
//! 2. Profile file `yak.{profile}.{ext}`, profile from `YAK_PROFILE` or
//!    [`ConfigLoader::profile`] (default `development`)
//! 3. Main file `yak.{ext}`, or the file given to [`ConfigLoader::file`]
//! 4. `YAK_*` environment variables, `__` separating sections
//!    (`YAK_MESSAGES__STRATEGY=merge` sets `messages.strategy`)
//! 5. Values passed to [`ConfigLoader::merge`]
//!
//! `toml` files need the `toml-config` feature (default), `yaml`/`yml` files
//! the `yaml-config` feature.

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::YakConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "YAK_";
const PROFILE_VAR: &str = "YAK_PROFILE";
const DEFAULT_PROFILE: &str = "development";

/// Extensions tried for `yak.*` files, in order.
const EXTENSIONS: &[&str] = &[
    #[cfg(feature = "toml-config")]
    "toml",
    #[cfg(feature = "yaml-config")]
    "yaml",
    #[cfg(feature = "yaml-config")]
    "yml",
];

/// Lowercases a profile name and expands `dev` / `prod`.
fn profile_name(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "dev" => DEFAULT_PROFILE.to_owned(),
        "prod" => "production".to_owned(),
        other => other.to_owned(),
    }
}

/// Layered configuration loading.
#[derive(Debug)]
pub struct ConfigLoader {
    profile: String,
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
    overrides: Vec<YakConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        let profile = std::env::var(PROFILE_VAR)
            .map(|p| profile_name(&p))
            .unwrap_or_else(|_| DEFAULT_PROFILE.to_owned());
        Self {
            profile,
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
            overrides: Vec::new(),
        }
    }

    /// Overrides the profile taken from `YAK_PROFILE`.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = profile_name(profile.as_ref());
        self
    }

    /// Adds a directory to search for `yak.*` files.
    ///
    /// Without any, the current directory and the user config directory
    /// (`<config_dir>/yak`) are searched.
    pub fn search_path(mut self, path: impl AsRef<Path>) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Ignores `YAK_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Layers `config` over every other source.
    pub fn merge(mut self, config: YakConfig) -> Self {
        self.overrides.push(config);
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<YakConfig> {
        let config: YakConfig = self.figment()?.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract configuration: {e}"))
        })?;
        validate_config(&config)?;

        debug!(
            profile = %self.profile,
            logging_level = %config.logging.level,
            strategy = %config.messages.strategy,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(YakConfig::default()));

        match &self.config_file {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration file");
                figment = merge_file(figment, path)?;
            }
            Some(path) => return Err(ConfigError::FileNotFound(path.clone())),
            None => figment = self.merge_found_files(figment)?,
        }

        if self.load_env {
            trace!("Loading environment variables with YAK_ prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }

        for config in &self.overrides {
            figment = figment.merge(Serialized::defaults(config));
        }
        Ok(figment)
    }

    /// Merges the first `yak.{ext}` found, preceded by its profile sibling.
    fn merge_found_files(&self, mut figment: Figment) -> ConfigResult<Figment> {
        for dir in self.resolved_search_paths() {
            for ext in EXTENSIONS {
                let base = dir.join(format!("yak.{ext}"));
                if !base.exists() {
                    continue;
                }
                let profiled = dir.join(format!("yak.{}.{ext}", self.profile));
                if profiled.exists() {
                    debug!(path = %profiled.display(), "Loading profile configuration");
                    figment = merge_file(figment, &profiled)?;
                }
                info!(path = %base.display(), "Loading configuration file");
                return merge_file(figment, &base);
            }
        }
        warn!("No configuration file found, using defaults");
        Ok(figment)
    }

    fn resolved_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("yak")))
            .collect()
    }
}

/// Merges one file, picking the provider from its extension.
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::ParseError(format!(
            "Unsupported or disabled configuration file format: .{ext}"
        ))),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<YakConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from a specific file, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<YakConfig> {
    ConfigLoader::new().file(path).load()
}
