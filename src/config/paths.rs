//! Default path helpers and symlink checks.
//!
//! When `RESILIENT_MOVE_CONFIG` names a config file, the log file and the
//! breaker state document are colocated next to it, so one directory holds
//! everything a deployment needs. Otherwise the platform config/data dirs
//! (via `dirs`) are used.

use anyhow::{Context, Result, anyhow};
use dirs::{config_dir, data_dir};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "RESILIENT_MOVE_CONFIG";

const APP_DIR: &str = "resilient_move";
const CONFIG_FILE: &str = "config.xml";
const LOG_FILE: &str = "resilient_move.log";
const STORE_FILE: &str = "breaker_state.json";

/// Config path from `RESILIENT_MOVE_CONFIG`, if set.
/// A directory value means `<dir>/config.xml`; a relative value is made absolute.
fn env_config_path() -> Result<Option<PathBuf>> {
    let Some(raw) = env::var_os(CONFIG_ENV) else {
        return Ok(None);
    };
    let mut p = PathBuf::from(raw);
    if p.as_os_str().is_empty() {
        return Ok(None);
    }
    if p.is_relative() {
        p = env::current_dir()
            .context("resolve relative RESILIENT_MOVE_CONFIG")?
            .join(p);
    }
    if p.is_dir() {
        p.push(CONFIG_FILE);
    }
    Ok(Some(p))
}

fn home_fallback(parts: &[&str]) -> Result<PathBuf> {
    let home = env::var_os("HOME").ok_or_else(|| anyhow!("cannot determine a home directory"))?;
    Ok(parts.iter().fold(PathBuf::from(home), |acc, p| acc.join(p)))
}

/// OS-appropriate config path, honoring `RESILIENT_MOVE_CONFIG`.
pub fn default_config_path() -> Result<PathBuf> {
    if let Some(p) = env_config_path()? {
        return Ok(p);
    }
    match config_dir() {
        Some(base) => Ok(base.join(APP_DIR).join(CONFIG_FILE)),
        None => home_fallback(&[".config", APP_DIR, CONFIG_FILE]),
    }
}

/// Default file inside the data dir, or next to an env-named config.
fn data_file(name: &str) -> Result<PathBuf> {
    if let Some(cfg) = env_config_path()? {
        let parent = cfg
            .parent()
            .ok_or_else(|| anyhow!("config path '{}' has no parent", cfg.display()))?;
        return Ok(parent.join(name));
    }
    match data_dir() {
        Some(base) => Ok(base.join(APP_DIR).join(name)),
        None => home_fallback(&[".local", "share", APP_DIR, name]),
    }
}

pub fn default_log_path() -> Result<PathBuf> {
    data_file(LOG_FILE)
}

/// Where the file-backed breaker store keeps its JSON document.
pub fn default_store_path() -> Result<PathBuf> {
    data_file(STORE_FILE)
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.exists() && fs::symlink_metadata(anc)?.file_type().is_symlink() {
            return Ok(true);
        }
        p = anc.parent();
    }
    Ok(false)
}
