//! Producer commands read by the host, one per line

use crate::adapters::content_change::ChangeKind;
use crate::core::validation::validate_identifier;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Import { site_id: String, page_path: String },
    Index { content_id: String },
    Remove { content_id: String },
    Change {
        site_id: String,
        kind: ChangeKind,
        content_id: String,
    },
    Stats,
    LogLevel { level: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}'")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("{0}")]
    InvalidArgument(String),
}

const IMPORT_USAGE: &str = "import <site> <path>";
const INDEX_USAGE: &str = "index <content-id>";
const REMOVE_USAGE: &str = "remove <content-id>";
const CHANGE_USAGE: &str = "change <site> <kind> <content-id>";
const LOG_USAGE: &str = "log <trace|debug|info|warn|error|off>";
const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

impl Command {
    /// Parse one input line; blank lines and `#` comments yield `None`
    pub fn parse_line(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        let command = match words.as_slice() {
            ["import", site, path] => Command::Import {
                site_id: identifier("site", site)?,
                page_path: identifier("page path", path)?,
            },
            ["import", ..] => return Err(CommandError::Usage(IMPORT_USAGE)),
            ["index", id] => Command::Index {
                content_id: identifier("content id", id)?,
            },
            ["index", ..] => return Err(CommandError::Usage(INDEX_USAGE)),
            ["remove", id] => Command::Remove {
                content_id: identifier("content id", id)?,
            },
            ["remove", ..] => return Err(CommandError::Usage(REMOVE_USAGE)),
            ["change", site, kind, id] => Command::Change {
                site_id: identifier("site", site)?,
                kind: ChangeKind::from_str(kind).map_err(|_| {
                    CommandError::InvalidArgument(format!(
                        "Unknown change kind '{}' (expected created, updated, deleted or published)",
                        kind
                    ))
                })?,
                content_id: identifier("content id", id)?,
            },
            ["change", ..] => return Err(CommandError::Usage(CHANGE_USAGE)),
            ["stats"] => Command::Stats,
            ["log", level] if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) => {
                Command::LogLevel {
                    level: level.to_ascii_lowercase(),
                }
            }
            ["log", ..] => return Err(CommandError::Usage(LOG_USAGE)),
            [other, ..] => return Err(CommandError::Unknown(other.to_string())),
            [] => return Ok(None),
        };
        Ok(Some(command))
    }
}

fn identifier(field: &str, value: &str) -> Result<String, CommandError> {
    validate_identifier(field, value).map_err(CommandError::InvalidArgument)
}
