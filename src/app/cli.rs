//! Command line arguments for the host binary
//!
//! Flags override the matching values from the configuration file; anything
//! left unset falls back to the file and then to built-in defaults.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "eventqueue")]
#[command(about = "Background event queues fed from stdin commands")]
#[command(version)]
#[command(
    after_help = "Commands (one per line on stdin):\n  import <site> <path>\n  index <content-id>\n  remove <content-id>\n  change <site> <kind> <content-id>\n  stats"
)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Force coloured output
    #[arg(short = 'g', long = "color", conflicts_with = "no_color")]
    pub color: bool,

    /// Disable coloured output
    #[arg(long = "no-color", conflicts_with = "color")]
    pub no_color: bool,

    /// Directory holding persisted queue backlogs
    #[arg(short = 's', long = "state-dir", value_name = "DIR")]
    pub state_dir: Option<PathBuf>,
}

impl Args {
    /// Explicit colour choice: Some(true) for --color, Some(false) for
    /// --no-color, None when neither was given
    pub fn color_override(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Log file from the command line; `Some(None)` means explicitly disabled
    pub fn log_file_override(&self) -> Option<Option<PathBuf>> {
        self.log_file.as_ref().map(|path| {
            let raw = path.to_string_lossy();
            if raw.eq_ignore_ascii_case("none") || raw == "-" {
                None
            } else {
                Some(path.clone())
            }
        })
    }
}
