//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved configuration the
//! binary runs with.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::error::{Error, Result};
use crate::model::KnownModel;

/// Endpoint of the DuckDuckGo chat API.
pub const DEFAULT_BASE_URL: &str = "https://duckduckgo.com/duckchat/v1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Command-line arguments for the duckchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model alias to chat with.
    #[arrrg(optional, "Model to use; see --list-models (default: gpt-4o-mini)", "MODEL")]
    pub model: Option<String>,

    /// List the model aliases and exit.
    #[arrrg(flag, "List the models that can be used with --model and exit")]
    pub list_models: bool,

    /// Append the contents of a file to the one-shot prompt.
    #[arrrg(optional, "Append contents of file to prompt", "FILE")]
    pub file: Option<String>,

    /// Run a single prompt and exit.
    #[arrrg(optional, "Execute the prompt and exit", "PROMPT")]
    pub one_shot: Option<String>,

    /// Enable debug logging.
    #[arrrg(flag, "Print debug output")]
    pub debug: bool,

    /// Override the chat endpoint.
    #[arrrg(optional, "Chat API base URL", "URL")]
    pub base_url: Option<String>,

    /// Request timeout in seconds; 0 disables it.
    #[arrrg(optional, "Request timeout in seconds, 0 for none (default: 60)", "SECS")]
    pub timeout: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat run.
///
/// This struct holds the resolved configuration values after processing command-line
/// arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The chat endpoint, without a trailing slash.
    pub base_url: String,

    /// The model to chat with.
    pub model: KnownModel,

    /// Request timeout, if any.
    pub timeout: Option<Duration>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether debug logging is enabled.
    pub debug: bool,

    /// Prompt to run once instead of starting the REPL.
    pub one_shot: Option<String>,

    /// File whose contents are appended to the one-shot prompt.
    pub file: Option<String>,

    /// Only list the models.
    pub list_models: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Endpoint: https://duckduckgo.com/duckchat/v1
    /// - Model: gpt-4o-mini
    /// - Timeout: 60 seconds
    /// - Color: enabled
    /// - Debug: disabled
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: KnownModel::default(),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            use_color: true,
            debug: false,
            one_shot: None,
            file: None,
            list_models: false,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: KnownModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the chat endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `base_url` is not an absolute http(s) URL.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let parsed = url::Url::parse(base_url)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::url(
                format!("unsupported scheme in base URL: {}", parsed.scheme()),
                None,
            ));
        }
        self.base_url = base_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Enables debug logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the one-shot prompt.
    pub fn with_one_shot(mut self, prompt: Option<String>) -> Self {
        self.one_shot = prompt;
        self
    }

    /// Sets the file appended to the one-shot prompt.
    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    /// Reads the one-shot prompt, appending the file contents if a file is configured.
    ///
    /// Returns `Ok(None)` when no one-shot prompt is configured.
    pub fn one_shot_prompt(&self) -> Result<Option<String>> {
        let Some(prompt) = &self.one_shot else {
            return Ok(None);
        };
        match &self.file {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|err| Error::io(format!("failed to read {path}"), err))?;
                Ok(Some(format!("{prompt} {contents}")))
            }
            None => Ok(Some(prompt.clone())),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let mut config = ChatConfig::new();
        if let Some(alias) = args.model {
            config.model = alias.parse()?;
        }
        if let Some(base_url) = args.base_url {
            config = config.with_base_url(&base_url)?;
        }
        if let Some(secs) = args.timeout {
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(ChatConfig {
            use_color: !args.no_color,
            debug: args.debug,
            one_shot: args.one_shot,
            file: args.file,
            list_models: args.list_models,
            ..config
        })
    }
}
