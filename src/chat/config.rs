//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg`, an optional YAML configuration file,
//! and the resolved [`ChatConfig`] the `talkie` binary runs with.  Command-line values take
//! precedence over the file, which takes precedence over the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};

use crate::accumulator::Branding;
use crate::error::Result;
use crate::gemini::{DEFAULT_API_KEY_ENV, DEFAULT_MODEL};
use crate::types::AI_AVATAR;

/// Default directory for persisted chats.
const DEFAULT_DATA_DIR: &str = "data";

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Command-line arguments for the talkie tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: gemini-1.5-flash)", "MODEL")]
    pub model: Option<String>,

    /// Directory holding the stored chats.
    #[arrrg(optional, "Directory for stored chats (default: data)", "DIR")]
    pub data_dir: Option<String>,

    /// YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "FILE")]
    pub config: Option<String>,

    /// Session to resume at startup.
    #[arrrg(optional, "Resume the stored session with this id", "ID")]
    pub session: Option<String>,

    /// File receiving one JSON line per exchange event.
    #[arrrg(optional, "Append exchange events to this file as JSON lines", "FILE")]
    pub log_file: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// A literal replacement applied to finished replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    /// Text to replace.
    pub from: String,
    /// Replacement text.
    pub to: String,
}

/// The YAML configuration file.  Every field is optional.
///
/// ```yaml
/// model: gemini-1.5-pro
/// data_dir: /var/lib/talkie
/// timeout_secs: 30
/// branding:
///   - from: Gemini
///     to: Talkie
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Directory for stored chats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Whether to style output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<bool>,
    /// Replacements applied to finished replies, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branding: Option<Vec<Replacement>>,
    /// Avatar shown next to assistant messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Exchange log file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl ConfigFile {
    /// Reads a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parses a configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Resolved configuration for a chat run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: String,

    /// Directory holding past_chats.json and the per-session files.
    pub data_dir: PathBuf,

    /// Environment variable the API key is read from.
    pub api_key_env: String,

    /// Override for the API base URL.
    pub base_url: Option<String>,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Replacements applied to finished replies.
    pub branding: Vec<(String, String)>,

    /// Avatar shown next to assistant messages.
    pub avatar: String,

    /// Session to resume at startup.
    pub session: Option<String>,

    /// Exchange log file.
    pub log_file: Option<PathBuf>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: gemini-1.5-flash
    /// - Data directory: data
    /// - API key variable: GOOGLE_API_KEY
    /// - Timeout: 60 seconds
    /// - Color: enabled
    /// - Branding: Gemini -> Talkie, Google -> Team Brackets
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            use_color: true,
            branding: Branding::default().replacements().to_vec(),
            avatar: AI_AVATAR.to_string(),
            session: None,
            log_file: None,
        }
    }

    /// Resolves the configuration for a run: defaults, then the configuration file named by
    /// `--config`, then the remaining command-line arguments.
    pub fn resolve(args: ChatArgs) -> Result<Self> {
        let mut config = Self::new();
        if let Some(path) = args.config.as_deref() {
            config = config.merge_file(ConfigFile::from_file(path)?);
        }
        Ok(config.merge_args(args))
    }

    /// Applies the values set in a configuration file.
    pub fn merge_file(mut self, file: ConfigFile) -> Self {
        if let Some(model) = file.model {
            self.model = model;
        }
        if let Some(data_dir) = file.data_dir {
            self.data_dir = PathBuf::from(data_dir);
        }
        if let Some(api_key_env) = file.api_key_env {
            self.api_key_env = api_key_env;
        }
        if file.base_url.is_some() {
            self.base_url = file.base_url;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(color) = file.color {
            self.use_color = color;
        }
        if let Some(branding) = file.branding {
            self.branding = branding.into_iter().map(|r| (r.from, r.to)).collect();
        }
        if let Some(avatar) = file.avatar {
            self.avatar = avatar;
        }
        if let Some(log_file) = file.log_file {
            self.log_file = Some(PathBuf::from(log_file));
        }
        self
    }

    /// Applies the values given on the command line.
    pub fn merge_args(mut self, args: ChatArgs) -> Self {
        if let Some(model) = args.model {
            self.model = model;
        }
        if let Some(data_dir) = args.data_dir {
            self.data_dir = PathBuf::from(data_dir);
        }
        if args.session.is_some() {
            self.session = args.session;
        }
        if let Some(log_file) = args.log_file {
            self.log_file = Some(PathBuf::from(log_file));
        }
        if args.no_color {
            self.use_color = false;
        }
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the data directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The branding applied to finished replies.
    pub fn branding(&self) -> Branding {
        Branding::new(self.branding.clone())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}
