//! Fixed backoff between attempts and the shared stop rule.

use std::thread;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::errors::ResilientFsError;

pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            delay: DEFAULT_BACKOFF,
        }
    }
}

impl Backoff {
    pub fn fixed(delay: Duration) -> Self {
        Backoff { delay }
    }

    /// No sleeping at all; used by tests.
    pub fn none() -> Self {
        Backoff {
            delay: Duration::ZERO,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn wait(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}

pub(crate) fn validate_max_attempts(max_attempts: u32) -> Result<(), ResilientFsError> {
    if max_attempts == 0 {
        return Err(ResilientFsError::Validation(
            "max_attempts must be at least 1".into(),
        ));
    }
    Ok(())
}

/// True once the attempt budget is spent or the breaker refuses another try.
pub(crate) fn should_stop(attempt: u32, max_attempts: u32, breaker: &CircuitBreaker) -> bool {
    CircuitBreaker::max_attempts_reached(attempt, max_attempts) || !breaker.can_attempt()
}
