//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg`, an optional YAML
//! config file, and the resolved [`ChatConfig`].  Values are taken from, in
//! decreasing priority: command-line flags, the config file, the environment,
//! built-in defaults.

use std::path::{Path, PathBuf};

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::client::DEFAULT_API_URL;
use crate::types::ModelSelection;
use crate::{Error, Result};

/// Environment variable naming the API base URL.
pub const API_URL_ENV: &str = "AGENTCHAT_API_URL";

/// Environment variable naming the token file.
pub const TOKEN_FILE_ENV: &str = "AGENTCHAT_TOKEN_FILE";

/// Command-line arguments for the agentchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the agent backend.
    #[arrrg(optional, "Backend base URL (default: http://localhost:3001/api/)", "URL")]
    pub api_url: Option<String>,

    /// Provider and model, as `provider/model`.
    #[arrrg(optional, "Model as provider/model (default: deepseek/deepseek-chat)", "MODEL")]
    pub model: Option<String>,

    /// Let the agent search the web.
    #[arrrg(flag, "Enable web search")]
    pub web_search: bool,

    /// File holding the bearer token.
    #[arrrg(optional, "Token file (default: per-origin file in the config directory)", "PATH")]
    pub token_file: Option<String>,

    /// YAML config file.
    #[arrrg(optional, "YAML config file", "PATH")]
    pub config: Option<String>,

    /// Append every stream request and item to this file as JSON lines.
    #[arrrg(optional, "Write a JSON-lines event log", "PATH")]
    pub event_log: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Contents of a YAML config file.  Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct ConfigFile {
    /// Backend base URL.
    pub api_url: Option<String>,
    /// Provider and model.
    pub model: Option<String>,
    /// Enable web search.
    pub web_search: Option<bool>,
    /// Token file.
    pub token_file: Option<PathBuf>,
    /// Event log file.
    pub event_log: Option<PathBuf>,
    /// Use ANSI colors.
    pub color: Option<bool>,
}

impl ConfigFile {
    /// Parses a config file from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Reads and parses the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::io(format!("cannot read config file {}: {err}", path.display()), err)
        })?;
        Self::from_yaml(&text)
    }
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Backend base URL.
    pub api_url: String,

    /// Provider and model sent with every prompt.
    pub model: ModelSelection,

    /// Whether the agent may search the web.
    pub web_search: bool,

    /// Explicit token file; `None` picks a per-origin file.
    pub token_file: Option<PathBuf>,

    /// JSON-lines event log.
    pub event_log: Option<PathBuf>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - API URL: http://localhost:3001/api/
    /// - Model: deepseek/deepseek-chat
    /// - Web search: disabled
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model: ModelSelection::default(),
            web_search: false,
            token_file: None,
            event_log: None,
            use_color: true,
        }
    }

    /// Sets the API base URL.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Sets the model selection.
    pub fn with_model(mut self, model: ModelSelection) -> Self {
        self.model = model;
        self
    }

    /// Enables or disables web search.
    pub fn with_web_search(mut self, web_search: bool) -> Self {
        self.web_search = web_search;
        self
    }

    /// Sets the token file.
    pub fn with_token_file(mut self, path: Option<PathBuf>) -> Self {
        self.token_file = path;
        self
    }

    /// Sets the event log file.
    pub fn with_event_log(mut self, path: Option<PathBuf>) -> Self {
        self.event_log = path;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Resolves arguments against the process environment and config file.
    pub fn resolve(args: ChatArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        Self::resolve_with(args, file, |key| std::env::var(key).ok())
    }

    /// Resolves arguments against an explicit environment and config file.
    pub fn resolve_with(
        args: ChatArgs,
        file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::new();

        if let Some(api_url) = env(API_URL_ENV) {
            config.api_url = api_url;
        }
        if let Some(token_file) = env(TOKEN_FILE_ENV) {
            config.token_file = Some(PathBuf::from(token_file));
        }

        if let Some(api_url) = file.api_url {
            config.api_url = api_url;
        }
        if let Some(model) = file.model {
            config.model = model.parse()?;
        }
        if let Some(web_search) = file.web_search {
            config.web_search = web_search;
        }
        if let Some(token_file) = file.token_file {
            config.token_file = Some(token_file);
        }
        if let Some(event_log) = file.event_log {
            config.event_log = Some(event_log);
        }
        if let Some(color) = file.color {
            config.use_color = color;
        }

        if let Some(api_url) = args.api_url {
            config.api_url = api_url;
        }
        if let Some(model) = args.model {
            config.model = model.parse()?;
        }
        if args.web_search {
            config.web_search = true;
        }
        if let Some(token_file) = args.token_file {
            config.token_file = Some(PathBuf::from(token_file));
        }
        if let Some(event_log) = args.event_log {
            config.event_log = Some(PathBuf::from(event_log));
        }
        if args.no_color {
            config.use_color = false;
        }
        Ok(config)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}
