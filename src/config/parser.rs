//! Tool configuration loading.
//!
//! Configuration comes from, in increasing precedence: built-in defaults,
//! the first `schemaplan.yaml` found walking up from the working directory
//! (or the user config directory), and `SCHEMAPLAN_*` environment
//! variables, optionally loaded from a `.env` file.

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::ToolConfig;

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["schemaplan.yaml", "schemaplan.yml", ".schemaplan.yaml"];

/// Configuration parser.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ToolConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ToolConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(ToolConfig::default());
        }

        let config: ToolConfig = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("YAML parse error: {e}"),
            location: source.map(|p| p.display().to_string()),
        })?;

        Ok(config)
    }

    /// Resolves and loads the configuration.
    ///
    /// An explicit path must exist. Otherwise the nearest configuration file
    /// is used, then the user configuration file, then the defaults.
    /// Environment overrides are applied last and the result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read, parsed or
    /// validated.
    pub fn load(&self, explicit: Option<&Path>) -> Result<ToolConfig> {
        let start = self
            .base_path
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = if let Some(path) = explicit {
            self.load_file(path)?
        } else if let Ok(path) = find_config_file(&start) {
            self.load_file(path)?
        } else if let Some(path) = user_config_file().filter(|p| p.exists()) {
            self.load_file(path)?
        } else {
            debug!("No configuration file found, using defaults");
            ToolConfig::default()
        };

        Self::apply_overrides(&mut config, |name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `SCHEMAPLAN_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if an override has an invalid value.
    pub fn apply_overrides<F>(config: &mut ToolConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("SCHEMAPLAN_STATE_DIR") {
            debug!("Overriding state.dir from environment");
            config.state.dir = PathBuf::from(dir);
        }

        if let Some(holder) = lookup("SCHEMAPLAN_LOCK_HOLDER") {
            debug!("Overriding state.lock_holder from environment");
            config.state.lock_holder = Some(holder);
        }

        if let Some(lock) = lookup("SCHEMAPLAN_LOCK") {
            debug!("Overriding state.lock from environment");
            config.state.lock = parse_bool(&lock)
                .ok_or_else(|| ConfigError::validation(format!("invalid boolean {lock:?}"), "SCHEMAPLAN_LOCK"))?;
        }

        if let Some(out) = lookup("SCHEMAPLAN_PLAN_OUT") {
            debug!("Overriding plan.out from environment");
            config.plan.out = PathBuf::from(out);
        }

        if let Some(version) = lookup("SCHEMAPLAN_SCHEMA_VERSION") {
            debug!("Overriding plan.schema_version from environment");
            config.plan.schema_version = version.parse().map_err(|_| {
                ConfigError::validation(
                    format!("invalid schema version {version:?}"),
                    "SCHEMAPLAN_SCHEMA_VERSION",
                )
            })?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Path of the per-user configuration file.
#[must_use]
pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("schemaplan").join("config.yaml"))
}

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }
    .into())
}
