//! Best-effort notifications sent when a breaker opens.
//!
//! Senders are fire-and-forget from the breaker's point of view: an `Err`
//! returned by `send` is logged by the caller and otherwise ignored.

use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::breaker::BreakerStats;

pub trait Notifier: Send + Sync {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}

/// Writes the alert to the log instead of mailing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        info!(recipient, subject, body, "breaker notification");
        Ok(())
    }
}

/// Pipes an RFC 822 message into `sendmail -t`. The child is reaped on a
/// detached thread so the breaker never waits on the MTA.
#[derive(Debug, Clone)]
pub struct SendmailNotifier {
    program: PathBuf,
    from: Option<String>,
}

impl SendmailNotifier {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            from: None,
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

impl Default for SendmailNotifier {
    fn default() -> Self {
        Self::new("/usr/sbin/sendmail")
    }
}

impl Notifier for SendmailNotifier {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        if !is_valid_recipient(recipient) {
            return Err(anyhow!("refusing to mail invalid recipient '{recipient}'"));
        }
        let mut child = Command::new(&self.program)
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn {}", self.program.display()))?;

        let mut message = String::new();
        if let Some(from) = &self.from {
            message.push_str(&format!("From: {from}\n"));
        }
        message.push_str(&format!("To: {recipient}\nSubject: {subject}\n\n{body}\n"));

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("sendmail stdin unavailable"))?;
        stdin
            .write_all(message.as_bytes())
            .context("write message to sendmail")?;
        drop(stdin);

        let program = self.program.clone();
        std::thread::spawn(move || match child.wait() {
            Ok(status) if !status.success() => {
                debug!(program = %program.display(), %status, "sendmail exited with failure")
            }
            Ok(_) => {}
            Err(e) => debug!(program = %program.display(), error = %e, "sendmail wait failed"),
        });
        Ok(())
    }
}

/// Cheap syntactic check: `local@domain.tld`, no whitespace, single `@`.
pub fn is_valid_recipient(addr: &str) -> bool {
    let addr = addr.trim();
    if addr.is_empty() || addr.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = addr.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

/// Subject and body announcing that a breaker opened.
pub fn compose_open_alert(stats: &BreakerStats) -> (String, String) {
    // Header line: control characters would start new headers.
    let name: String = stats.name.chars().filter(|c| !c.is_control()).collect();
    let subject = format!("[resilient_move] circuit breaker '{name}' opened");
    let opened = stats
        .opened_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown".into());
    let body = format!(
        "Circuit breaker '{name}' is now {state}.\n\
         \n\
         Failures: {failures} (threshold {threshold})\n\
         Opened at: {opened}\n\
         Recovery timeout: {timeout}s\n\
         \n\
         File operations guarded by this breaker are refused until the recovery\n\
         timeout elapses and a probe attempt succeeds.\n",
        name = stats.name,
        state = stats.state,
        failures = stats.failure_count,
        threshold = stats.failure_threshold,
        timeout = stats.recovery_timeout.as_secs(),
    );
    (subject, body)
}
