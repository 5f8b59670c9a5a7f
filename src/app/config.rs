//! TOML configuration file parsing and loading
//!
//! Handles default config file discovery, parsing into [`AppConfig`] and
//! resolving the final settings from file values and command line overrides.
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "ext"
//! file = "/var/log/eventqueue.log"
//! color = false
//!
//! [storage]
//! state_dir = "/var/lib/eventqueue"
//!
//! [queues.search_index]
//! idle_wait_ms = 250
//! requeue_on_failure = true
//! ```

use crate::app::cli::Args;
use crate::core::error_handling::ContextualError;
use crate::core::logging::{LogFormat, LoggingOptions};
use crate::queue::api::{QueueConfig, QueueSettings};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const CONFIG_DIR_NAME: &str = "EventQueue";
const CONFIG_FILE_NAME: &str = "eventqueue.toml";
const STATE_DIR_NAME: &str = "eventqueue";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ConfigError::Parse { .. } | ConfigError::Invalid { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid { message } => Some(message),
            ConfigError::Parse { source, .. } => Some(source.message()),
            ConfigError::Io { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<PathBuf>,
    pub color: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueuesSection {
    pub page_import: QueueSettings,
    pub search_index: QueueSettings,
    pub content_change: QueueSettings,
}

/// Contents of the host configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub logging: LoggingSection,
    pub storage: StorageSection,
    pub queues: QueuesSection,
}

/// Validated per-queue engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfigs {
    pub page_import: QueueConfig,
    pub search_index: QueueConfig,
    pub content_change: QueueConfig,
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the given file, or the default file when it exists
    ///
    /// An explicitly named file must exist; a missing default file yields the
    /// built-in defaults.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_file {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Validate every queue section
    pub fn queue_configs(&self) -> Result<QueueConfigs, ConfigError> {
        let convert = |section: &str, settings: &QueueSettings| {
            settings
                .clone()
                .into_config()
                .map_err(|message| ConfigError::Invalid {
                    message: format!("[queues.{}] {}", section, message),
                })
        };
        Ok(QueueConfigs {
            page_import: convert("page_import", &self.queues.page_import)?,
            search_index: convert("search_index", &self.queues.search_index)?,
            content_change: convert("content_change", &self.queues.content_change)?,
        })
    }

    /// Logging options from the file, overridden by the command line
    ///
    /// `detected_color` is the colour default when neither source decides.
    pub fn logging_options(
        &self,
        args: &Args,
        detected_color: bool,
    ) -> Result<LoggingOptions, ConfigError> {
        let level = args
            .log_level
            .clone()
            .or_else(|| self.logging.level.clone())
            .unwrap_or_else(|| "info".to_string());

        let format = match args.log_format.as_deref().or(self.logging.format.as_deref()) {
            Some(raw) => LogFormat::from_str(raw).map_err(|_| ConfigError::Invalid {
                message: format!("Unknown log format '{}' (expected text, ext or json)", raw),
            })?,
            None => LogFormat::default(),
        };

        let file = match args.log_file_override() {
            Some(choice) => choice,
            None => self.logging.file.clone(),
        };

        let color = args
            .color_override()
            .or(self.logging.color)
            .unwrap_or(detected_color);

        Ok(LoggingOptions {
            level,
            format,
            file,
            color,
        })
    }

    /// Backlog directory: command line, then file, then the platform data dir
    pub fn state_dir(&self, args: &Args) -> Result<PathBuf, ConfigError> {
        args.state_dir
            .clone()
            .or_else(|| self.storage.state_dir.clone())
            .or_else(|| dirs::data_local_dir().map(|d| d.join(STATE_DIR_NAME)))
            .ok_or_else(|| ConfigError::Invalid {
                message: "No state directory configured and no platform data directory found"
                    .to_string(),
            })
    }
}
