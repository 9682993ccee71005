//! Breaker state, configuration and stats snapshot.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Three-state gate. Persisted as its `as_str()` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation; every attempt passes.
    #[default]
    Closed,
    /// Blocking until the recovery timeout elapses.
    Open,
    /// Probing; a bounded number of trial attempts pass.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "closed" => Ok(CircuitState::Closed),
            "open" => Ok(CircuitState::Open),
            "half_open" => Ok(CircuitState::HalfOpen),
            other => Err(format!("unknown circuit state: '{other}'")),
        }
    }
}

/// Tuning knobs supplied at construction. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures (while closed) that trip the breaker.
    pub failure_threshold: u32,
    /// How long an open breaker blocks before probing.
    pub recovery_timeout: Duration,
    /// Failed probes tolerated while half-open before re-opening.
    pub half_open_max_attempts: u32,
    /// Expiry applied to every persisted key.
    pub state_ttl: Duration,
    pub notify_on_open: bool,
    pub notify_recipient: Option<String>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_attempts: 3,
            state_ttl: Duration::from_secs(60 * 60),
            notify_on_open: false,
            notify_recipient: None,
        }
    }
}

/// Point-in-time view of a breaker, for health output and alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u64,
    pub failure_threshold: u32,
    pub opened_at: Option<DateTime<Utc>>,
    #[serde(rename = "recovery_timeout_secs", serialize_with = "as_secs")]
    pub recovery_timeout: Duration,
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}
