//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Creates a template if the default config is missing.
//!
//! Unknown elements are rejected so typos surface instead of silently
//! falling back to defaults. Numeric and boolean values may carry surrounding
//! whitespace; anything else that fails to parse is an error.

use anyhow::{Context, Result, anyhow, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::{Deserialize, Deserializer};
use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::paths::{CONFIG_ENV, default_config_path, default_log_path, path_has_symlink_ancestor};
use super::types::{Config, LogLevel};
use crate::platform::{set_dir_mode_0700, write_atomic_0600};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config", deny_unknown_fields)]
struct XmlConfig {
    disk_root: Option<String>,
    store_path: Option<String>,
    breaker_name: Option<String>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    failure_threshold: Option<u32>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    recovery_timeout_seconds: Option<u64>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    half_open_max_attempts: Option<u32>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    state_ttl_seconds: Option<u64>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    notify_on_open: Option<bool>,
    notify_recipient: Option<String>,
    sendmail_path: Option<String>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    backoff_ms: Option<u64>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    max_attempts: Option<u32>,
    log_level: Option<String>,
    log_file: Option<String>,
}

/// Outcome of `load_or_init`.
#[derive(Debug)]
pub enum LoadResult {
    Loaded(Config, PathBuf),
    /// No config existed at the default location; a template was written there.
    CreatedTemplate(PathBuf),
}

/// Optional scalar with surrounding whitespace trimmed; empty means absent.
fn de_trimmed_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// Map XmlConfig -> Config, starting from defaults.
fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(s) = non_empty(parsed.disk_root) {
        cfg.disk_root = PathBuf::from(s);
    }
    if let Some(s) = non_empty(parsed.store_path) {
        cfg.store_path = PathBuf::from(s);
    }
    if let Some(s) = non_empty(parsed.breaker_name) {
        cfg.breaker_name = s;
    }
    if let Some(n) = parsed.failure_threshold {
        cfg.failure_threshold = n;
    }
    if let Some(secs) = parsed.recovery_timeout_seconds {
        cfg.recovery_timeout = Duration::from_secs(secs);
    }
    if let Some(n) = parsed.half_open_max_attempts {
        cfg.half_open_max_attempts = n;
    }
    if let Some(secs) = parsed.state_ttl_seconds {
        cfg.state_ttl = Duration::from_secs(secs);
    }
    if let Some(b) = parsed.notify_on_open {
        cfg.notify_on_open = b;
    }
    cfg.notify_recipient = non_empty(parsed.notify_recipient);
    if let Some(s) = non_empty(parsed.sendmail_path) {
        cfg.sendmail_path = PathBuf::from(s);
    }
    if let Some(ms) = parsed.backoff_ms {
        cfg.backoff = Duration::from_millis(ms);
    }
    if let Some(n) = parsed.max_attempts {
        cfg.max_attempts = n;
    }
    if let Some(s) = non_empty(parsed.log_level) {
        cfg.log_level = s.parse::<LogLevel>().map_err(|e| anyhow!(e))?;
    }
    if let Some(s) = non_empty(parsed.log_file) {
        cfg.log_file = Some(PathBuf::from(s));
    }
    Ok(cfg)
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    xml_to_config(parsed).with_context(|| format!("invalid value in '{}'", path.display()))
}

/// Load the config from `RESILIENT_MOVE_CONFIG` or the platform default.
///
/// A missing default config gets a template and `CreatedTemplate`; a missing
/// file named by the env var is an error (nothing is created on the user's behalf).
pub fn load_or_init() -> Result<LoadResult> {
    let path = default_config_path()?;
    if path.exists() {
        let cfg = load_config_from_xml_path(&path)?;
        return Ok(LoadResult::Loaded(cfg, path));
    }
    if env::var_os(CONFIG_ENV).is_some() {
        bail!(
            "{CONFIG_ENV} points to '{}', which does not exist",
            path.display()
        );
    }
    create_template_config(&path)?;
    Ok(LoadResult::CreatedTemplate(path))
}

/// Create a template config file and its parent directory (0700 on Unix).
/// Refuses to write beneath a symlinked ancestor or over an existing file.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        bail!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        );
    }
    if path.exists() {
        bail!("Config file already exists: {}", path.display());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create config dir '{}'", parent.display()))?;
        let _ = set_dir_mode_0700(parent);
    }

    let defaults = Config::default();
    let suggested_log = default_log_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "/path/to/resilient_move.log".into());

    let content = format!(
        r#"<!--
  resilient_move configuration (XML)

    disk_root                 -> directory the "local" disk is rooted at
    store_path                -> JSON file holding shared circuit breaker state
    breaker_name              -> workers using the same name share one breaker
    failure_threshold         -> failures (while closed) that open the breaker
    recovery_timeout_seconds  -> how long an open breaker blocks before probing
    half_open_max_attempts    -> failed probes tolerated before re-opening
    state_ttl_seconds         -> expiry of persisted breaker state
    notify_on_open            -> true/false: mail notify_recipient when the breaker opens
    notify_recipient          -> e.g. ops@example.com (optional)
    sendmail_path             -> sendmail-compatible binary used for notifications
    backoff_ms                -> fixed sleep between attempts
    max_attempts              -> attempts per move/delete
    log_level                 -> quiet | normal | info | debug
    log_file                  -> path to log file (optional; stderr still used)

  CLI flags override XML values.
-->
<config>
  <disk_root>{}</disk_root>
  <store_path>{}</store_path>
  <breaker_name>{}</breaker_name>
  <failure_threshold>{}</failure_threshold>
  <recovery_timeout_seconds>{}</recovery_timeout_seconds>
  <half_open_max_attempts>{}</half_open_max_attempts>
  <state_ttl_seconds>{}</state_ttl_seconds>
  <notify_on_open>false</notify_on_open>
  <notify_recipient></notify_recipient>
  <sendmail_path>{}</sendmail_path>
  <backoff_ms>{}</backoff_ms>
  <max_attempts>{}</max_attempts>
  <log_level>normal</log_level>
  <log_file>{}</log_file>
</config>
"#,
        defaults.disk_root.display(),
        defaults.store_path.display(),
        defaults.breaker_name,
        defaults.failure_threshold,
        defaults.recovery_timeout.as_secs(),
        defaults.half_open_max_attempts,
        defaults.state_ttl.as_secs(),
        defaults.sendmail_path.display(),
        defaults.backoff.as_millis(),
        defaults.max_attempts,
        suggested_log,
    );

    write_atomic_0600(path, content.as_bytes())?;
    info!("Created template config at {}", path.display());
    Ok(())
}
