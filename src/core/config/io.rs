use crate::core::config::data::{
    path_display, Config, ConfigOverrides, ResolvedConfig, DEFAULT_BASE_URL,
};
use crate::core::history::DEFAULT_HISTORY_DIR;
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Errors that can occur when loading or resolving configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read a file named by the configuration.
    Read {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        /// Path to the configuration file with invalid TOML.
        path: PathBuf,
        /// The TOML deserialization error.
        source: toml::de::Error,
    },

    /// No model was given on the command line or in the configuration.
    MissingModel,

    /// The platform configuration directory could not be determined.
    NoConfigDir,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read {}: {}", path_display(path), source)
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse config at {}: {}",
                    path_display(path),
                    source
                )
            }
            ConfigError::MissingModel => f.write_str(
                "No model configured. Pass --model or set `model` in the config file.",
            ),
            ConfigError::NoConfigDir => f.write_str("Failed to determine config directory"),
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::MissingModel | ConfigError::NoConfigDir => None,
        }
    }
}

impl Config {
    /// Loads from `config_path`; a missing file yields the defaults.
    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            debug!(path = %path_display(config_path), "no config file, using defaults");
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    /// Loads from `path` when given, otherwise from the platform config dir.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load_from_path(&Self::get_config_path()?),
        }
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let proj_dirs =
            ProjectDirs::from("org", "parley", "parley").ok_or(ConfigError::NoConfigDir)?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    pub fn resolve(&self, overrides: &ConfigOverrides) -> Result<ResolvedConfig, ConfigError> {
        self.resolve_with_env(overrides, |key| std::env::var(key).ok())
    }

    /// Precedence: command line, then config file, then environment, then
    /// built-in defaults.
    pub fn resolve_with_env(
        &self,
        overrides: &ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ResolvedConfig, ConfigError> {
        let model = overrides
            .model
            .clone()
            .or_else(|| self.model.clone())
            .filter(|model| !model.trim().is_empty())
            .ok_or(ConfigError::MissingModel)?;

        let base_url = self
            .base_url
            .clone()
            .or_else(|| env("OPENAI_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let api_key = self
            .api_key
            .clone()
            .or_else(|| env("OPENAI_API_KEY"))
            .unwrap_or_default();

        let system_prompt = match (&self.system_prompt, &self.system_prompt_file) {
            (Some(prompt), _) => Some(prompt.clone()),
            (None, Some(file)) => {
                Some(fs::read_to_string(file).map_err(|source| ConfigError::Read {
                    path: file.clone(),
                    source,
                })?)
            }
            (None, None) => None,
        };

        let history_dir = overrides
            .history_dir
            .clone()
            .or_else(|| self.history_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_DIR));

        Ok(ResolvedConfig {
            base_url,
            api_key,
            model,
            system_prompt,
            history_dir,
            live_print: !overrides.no_live_print && self.live_print.unwrap_or(true),
            options: self.options.clone(),
        })
    }
}
