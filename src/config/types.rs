//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::paths;
use super::{BREAKER_NAME_DEFAULT, DISK_ROOT_DEFAULT, SENDMAIL_DEFAULT};
use crate::breaker::BreakerConfig;
use crate::fs_ops::Backoff;

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Runtime configuration for the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory the "local" disk is rooted at; all CLI paths are relative to it
    pub disk_root: PathBuf,
    /// JSON document shared by every worker using the same breaker
    pub store_path: PathBuf,
    pub breaker_name: String,
    pub failure_threshold: u32,
    #[serde(rename = "recovery_timeout_seconds", serialize_with = "secs")]
    pub recovery_timeout: Duration,
    pub half_open_max_attempts: u32,
    #[serde(rename = "state_ttl_seconds", serialize_with = "secs")]
    pub state_ttl: Duration,
    pub notify_on_open: bool,
    pub notify_recipient: Option<String>,
    pub sendmail_path: PathBuf,
    /// Fixed sleep between attempts
    #[serde(rename = "backoff_ms", serialize_with = "millis")]
    pub backoff: Duration,
    pub max_attempts: u32,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
}

fn secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

fn millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

impl Default for Config {
    fn default() -> Self {
        let breaker = BreakerConfig::default();
        Self {
            disk_root: PathBuf::from(DISK_ROOT_DEFAULT),
            store_path: paths::default_store_path()
                .unwrap_or_else(|_| PathBuf::from("breaker_state.json")),
            breaker_name: BREAKER_NAME_DEFAULT.to_string(),
            failure_threshold: breaker.failure_threshold,
            recovery_timeout: breaker.recovery_timeout,
            half_open_max_attempts: breaker.half_open_max_attempts,
            state_ttl: breaker.state_ttl,
            notify_on_open: breaker.notify_on_open,
            notify_recipient: breaker.notify_recipient,
            sendmail_path: PathBuf::from(SENDMAIL_DEFAULT),
            backoff: Backoff::default().delay(),
            max_attempts: 3,
            log_level: LogLevel::Normal,
            log_file: paths::default_log_path().ok(),
        }
    }
}

impl Config {
    /// Breaker settings carried by this config.
    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: self.recovery_timeout,
            half_open_max_attempts: self.half_open_max_attempts,
            state_ttl: self.state_ttl,
            notify_on_open: self.notify_on_open,
            notify_recipient: self.notify_recipient.clone(),
        }
    }
}
