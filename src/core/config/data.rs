use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::transport::RequestOptions;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the OpenAI-compatible API, e.g. `https://api.deepseek.com/v1`
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Inline system prompt; wins over `system_prompt_file`
    pub system_prompt: Option<String>,
    pub system_prompt_file: Option<PathBuf>,
    /// Where saves and exports without an explicit path go
    pub history_dir: Option<PathBuf>,
    /// Echo streamed output to the terminal (default: on)
    pub live_print: Option<bool>,
    /// Extra request parameters sent with every exchange, e.g.
    /// `options = { temperature = 0.6, enable_thinking = true }`
    #[serde(default, skip_serializing_if = "RequestOptions::is_empty")]
    pub options: RequestOptions,
}

/// Settings after merging CLI flags, the config file and the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub base_url: String,
    /// May be empty; client creation rejects that.
    pub api_key: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub history_dir: PathBuf,
    pub live_print: bool,
    pub options: RequestOptions,
}

/// Values given on the command line, which take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub history_dir: Option<PathBuf>,
    pub no_live_print: bool,
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
