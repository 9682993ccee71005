//! CLI definition and parsing.
//!
//! Paths given to `move` and `delete` are relative to the configured disk root.
//! `--debug` is a shorthand for `--log-level debug`.

use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

use crate::config::types::{Config, LogLevel};

/// Move and delete files through a persisted circuit breaker.
/// CLI flags override config values (which are loaded from XML).
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Move and delete files through a shared circuit breaker"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Override the directory the local disk is rooted at.
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    pub disk_root: Option<PathBuf>,

    /// Attempts per file before giving up.
    #[arg(long, global = true, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Enable debug logging (shorthand for --log-level debug).
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Set log level: quiet, normal, info, debug.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Print the config file location used by resilient_move and exit.
    #[arg(long)]
    pub print_config: bool,

    /// Emit logs (and `stats`) as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Move one or more files into a directory as a single batch.
    /// If any file fails, the files already moved are put back.
    Move {
        #[arg(required = true, value_name = "SOURCE", value_hint = ValueHint::AnyPath)]
        sources: Vec<PathBuf>,
        /// Destination directory.
        #[arg(long = "to", short = 't', value_name = "DIR", value_hint = ValueHint::DirPath)]
        to: PathBuf,
    },
    /// Delete a file or a directory (recursively).
    Delete {
        #[arg(value_name = "PATH", value_hint = ValueHint::AnyPath)]
        path: PathBuf,
        /// Treat an already missing path as deleted.
        #[arg(long)]
        missing_ok: bool,
    },
    /// Show the breaker's current state.
    Stats,
    /// Force the breaker closed and clear its counters.
    Reset,
}

impl Args {
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(root) = &self.disk_root {
            cfg.disk_root = root.clone();
        }
        if let Some(n) = self.max_attempts {
            cfg.max_attempts = n;
        }
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
