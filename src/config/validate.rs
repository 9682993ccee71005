//! Config validation: counts must be positive, the disk root must be a directory.

use anyhow::{Result, bail};
use tracing::{info, warn};

use super::types::Config;
use crate::notify::is_valid_recipient;

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.breaker_name.trim().is_empty() {
            bail!("breaker_name must not be empty");
        }
        if self.breaker_name.chars().any(char::is_control) {
            bail!("breaker_name must not contain control characters");
        }
        for (name, value) in [
            ("failure_threshold", self.failure_threshold),
            ("half_open_max_attempts", self.half_open_max_attempts),
            ("max_attempts", self.max_attempts),
        ] {
            if value == 0 {
                bail!("{name} must be at least 1");
            }
        }

        let root = &self.disk_root;
        if !root.exists() {
            bail!("disk_root does not exist: {}", root.display());
        }
        if !root.is_dir() {
            bail!("disk_root is not a directory: {}", root.display());
        }

        if self.notify_on_open {
            match self.notify_recipient.as_deref() {
                Some(r) if is_valid_recipient(r) => {}
                Some(r) => warn!(recipient = %r, "notify_on_open is set but the recipient is not a valid address; no mail will be sent"),
                None => warn!("notify_on_open is set without notify_recipient; no mail will be sent"),
            }
        }

        info!(
            disk_root = %root.display(),
            store = %self.store_path.display(),
            breaker = %self.breaker_name,
            "Config validated"
        );
        Ok(())
    }
}
