//! Persisted circuit breaker.
//!
//! State lives in an injected `KeyValueStore` under
//! `circuit_breaker:{name}:{state|failures|opened_at|half_open_attempts}`, so
//! every worker holding a breaker with the same name sees the same gate.
//!
//! Transitions:
//! - Closed -> Open: `record_failure` once the failure count reaches the threshold.
//! - Open -> HalfOpen: inside `can_attempt`, once the recovery timeout has elapsed.
//!   There is no background timer.
//! - HalfOpen -> Closed: `record_success`.
//! - HalfOpen -> Open: `record_failure` once half-open attempts reach their bound.
//!
//! Store errors never escape: `can_attempt` fails open, the recorders log and
//! carry on. Concurrent workers may race on increments; the worst outcome is a
//! transition one failure early or late.

mod clock;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use state::{BreakerConfig, BreakerStats, CircuitState};

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::errors::StoreUnavailable;
use crate::notify::{self, Notifier};
use crate::store::KeyValueStore;

const FIELD_STATE: &str = "state";
const FIELD_FAILURES: &str = "failures";
const FIELD_OPENED_AT: &str = "opened_at";
const FIELD_HALF_OPEN_ATTEMPTS: &str = "half_open_attempts";

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("notifier", &self.notifier.is_some())
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        config: BreakerConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            store,
            clock: Arc::new(SystemClock),
            notifier: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Pure helper shared by the retry loops.
    pub fn max_attempts_reached(attempts: u32, max: u32) -> bool {
        attempts >= max
    }

    /// May the protected operation be attempted now?
    ///
    /// An open breaker whose recovery timeout has elapsed moves to half-open here.
    /// When the store is unreachable this returns `true` (fail open).
    pub fn can_attempt(&self) -> bool {
        match self.evaluate() {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(breaker = %self.name, error = %e, "Breaker store unreachable; allowing attempt");
                true
            }
        }
    }

    pub fn record_success(&self) {
        if let Err(e) = self.try_record_success() {
            warn!(breaker = %self.name, error = %e, "Failed to record breaker success");
        }
    }

    pub fn record_failure(&self) {
        if let Err(e) = self.try_record_failure() {
            warn!(breaker = %self.name, error = %e, "Failed to record breaker failure");
        }
    }

    /// Force the breaker closed and clear every counter.
    pub fn reset(&self) {
        match self.close() {
            Ok(()) => info!(breaker = %self.name, "Circuit breaker reset"),
            Err(e) => warn!(breaker = %self.name, error = %e, "Failed to reset circuit breaker"),
        }
    }

    /// Current state without side effects (an elapsed open breaker still reports open).
    pub fn state(&self) -> Result<CircuitState, StoreUnavailable> {
        self.load_state()
    }

    pub fn stats(&self) -> Result<BreakerStats, StoreUnavailable> {
        Ok(BreakerStats {
            name: self.name.clone(),
            state: self.load_state()?,
            failure_count: self.read_counter(FIELD_FAILURES)?,
            failure_threshold: self.config.failure_threshold,
            opened_at: self.opened_at()?,
            recovery_timeout: self.config.recovery_timeout,
        })
    }

    fn evaluate(&self) -> Result<bool, StoreUnavailable> {
        match self.load_state()? {
            CircuitState::Closed => Ok(true),
            CircuitState::Open => {
                if self.recovery_elapsed()? {
                    self.enter_half_open()?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            CircuitState::HalfOpen => Ok(self.read_counter(FIELD_HALF_OPEN_ATTEMPTS)?
                < u64::from(self.config.half_open_max_attempts)),
        }
    }

    fn try_record_success(&self) -> Result<(), StoreUnavailable> {
        match self.load_state()? {
            CircuitState::HalfOpen => {
                self.close()?;
                info!(breaker = %self.name, "Circuit breaker closed after successful probe");
            }
            // Success never closes an open breaker on its own; only the count is cleared.
            CircuitState::Closed | CircuitState::Open => {
                self.store.forget(&self.key(FIELD_FAILURES))?;
            }
        }
        Ok(())
    }

    fn try_record_failure(&self) -> Result<(), StoreUnavailable> {
        let state = self.load_state()?;
        let failures = counter(
            self.store
                .increment(&self.key(FIELD_FAILURES), self.config.state_ttl)?,
        );
        match state {
            CircuitState::Closed => {
                debug!(breaker = %self.name, failures, threshold = self.config.failure_threshold, "failure recorded");
                if failures >= u64::from(self.config.failure_threshold) {
                    self.trip(failures)?;
                }
            }
            CircuitState::HalfOpen => {
                let attempts = counter(self.store.increment(
                    &self.key(FIELD_HALF_OPEN_ATTEMPTS),
                    self.config.state_ttl,
                )?);
                debug!(breaker = %self.name, attempts, max = self.config.half_open_max_attempts, "half-open probe failed");
                if attempts >= u64::from(self.config.half_open_max_attempts) {
                    self.trip(failures)?;
                }
            }
            CircuitState::Open => {}
        }
        Ok(())
    }

    /// Closed/HalfOpen -> Open.
    fn trip(&self, failures: u64) -> Result<(), StoreUnavailable> {
        let now = self.clock.now();
        let ttl = self.config.state_ttl;
        self.store
            .set(&self.key(FIELD_STATE), CircuitState::Open.as_str(), ttl)?;
        self.store.set(
            &self.key(FIELD_OPENED_AT),
            &now.timestamp_millis().to_string(),
            ttl,
        )?;
        self.store.forget(&self.key(FIELD_HALF_OPEN_ATTEMPTS))?;
        warn!(
            breaker = %self.name,
            failures,
            threshold = self.config.failure_threshold,
            recovery_secs = self.config.recovery_timeout.as_secs(),
            "Circuit breaker opened"
        );
        self.notify_opened(BreakerStats {
            name: self.name.clone(),
            state: CircuitState::Open,
            failure_count: failures,
            failure_threshold: self.config.failure_threshold,
            opened_at: Some(now),
            recovery_timeout: self.config.recovery_timeout,
        });
        Ok(())
    }

    fn enter_half_open(&self) -> Result<(), StoreUnavailable> {
        let ttl = self.config.state_ttl;
        self.store
            .set(&self.key(FIELD_STATE), CircuitState::HalfOpen.as_str(), ttl)?;
        self.store
            .set(&self.key(FIELD_HALF_OPEN_ATTEMPTS), "0", ttl)?;
        info!(breaker = %self.name, "Circuit breaker half-open; probing");
        Ok(())
    }

    fn close(&self) -> Result<(), StoreUnavailable> {
        self.store.set(
            &self.key(FIELD_STATE),
            CircuitState::Closed.as_str(),
            self.config.state_ttl,
        )?;
        self.store.forget(&self.key(FIELD_FAILURES))?;
        self.store.forget(&self.key(FIELD_OPENED_AT))?;
        self.store.forget(&self.key(FIELD_HALF_OPEN_ATTEMPTS))?;
        Ok(())
    }

    fn recovery_elapsed(&self) -> Result<bool, StoreUnavailable> {
        // A missing timestamp means the entry expired underneath us; let a probe through.
        let Some(opened_at) = self.opened_at()? else {
            return Ok(true);
        };
        let elapsed = self.clock.now().signed_duration_since(opened_at);
        // Negative elapsed (opened by a worker whose clock runs ahead) counts as
        // not yet elapsed, so the skew lengthens this worker's recovery window.
        Ok(elapsed
            .to_std()
            .map(|e| e >= self.config.recovery_timeout)
            .unwrap_or(false))
    }

    fn notify_opened(&self, stats: BreakerStats) {
        if !self.config.notify_on_open {
            return;
        }
        let Some(recipient) = self
            .config
            .notify_recipient
            .as_deref()
            .filter(|r| notify::is_valid_recipient(r))
        else {
            debug!(breaker = %self.name, "notify_on_open set without a valid recipient; skipping");
            return;
        };
        let Some(notifier) = &self.notifier else {
            debug!(breaker = %self.name, "no notifier configured; skipping");
            return;
        };
        let (subject, body) = notify::compose_open_alert(&stats);
        if let Err(e) = notifier.send(recipient.trim(), &subject, &body) {
            error!(breaker = %self.name, recipient, error = %e, "Failed to send breaker notification");
        }
    }

    fn key(&self, field: &str) -> String {
        format!("circuit_breaker:{}:{}", self.name, field)
    }

    fn load_state(&self) -> Result<CircuitState, StoreUnavailable> {
        let raw = self.store.get(&self.key(FIELD_STATE))?;
        Ok(match raw {
            None => CircuitState::Closed,
            Some(s) => s.parse().unwrap_or_else(|e: String| {
                warn!(breaker = %self.name, error = %e, "Unreadable breaker state; treating as closed");
                CircuitState::Closed
            }),
        })
    }

    fn read_counter(&self, field: &str) -> Result<u64, StoreUnavailable> {
        let key = self.key(field);
        match self.store.get(&key)? {
            None => Ok(0),
            Some(raw) => Ok(counter(crate::store::parse_counter(&key, &raw)?)),
        }
    }

    fn opened_at(&self) -> Result<Option<DateTime<Utc>>, StoreUnavailable> {
        let key = self.key(FIELD_OPENED_AT);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };
        let millis = crate::store::parse_counter(&key, &raw)?;
        Ok(Utc.timestamp_millis_opt(millis).single())
    }
}

fn counter(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}
