/// Polling utilities for waiting on conditions with timeout
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// One observation of the condition being polled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress<T> {
    /// Condition met
    Ready(T),
    /// Not there yet, with a short reason for the timeout message
    Pending(String),
}

/// Configuration for polling operations
#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub timeout: Duration,
    pub interval: Duration,
    pub description: String,
}

impl PollingConfig {
    pub fn new(timeout: Duration, interval: Duration, description: impl Into<String>) -> Self {
        Self {
            timeout,
            interval,
            description: description.into(),
        }
    }

    /// Poll until condition is met or timeout
    ///
    /// The condition function should return:
    /// - Ok(Progress::Ready(T)) when condition is met (returns T)
    /// - Ok(Progress::Pending(reason)) when condition is not yet met
    /// - Err(e) when polling cannot succeed (stops and returns error)
    ///
    /// The condition is always evaluated at least once.
    pub async fn poll<F, Fut, T>(&self, condition: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Progress<T>>>,
    {
        debug!("{}...", self.description);

        let deadline = deadline_after(self.timeout);
        let mut last_reason = String::from("no response");

        loop {
            let reason = match tokio::time::timeout_at(deadline, condition()).await {
                Ok(progress) => match progress? {
                    Progress::Ready(value) => {
                        debug!("{}: done", self.description);
                        return Ok(value);
                    }
                    Progress::Pending(reason) => reason,
                },
                Err(_) => last_reason,
            };

            if Instant::now() >= deadline || deadline_after(self.interval) > deadline {
                anyhow::bail!("timeout waiting for {}: {}", self.description, reason);
            }

            debug!("{}: {}", self.description, reason);
            last_reason = reason;
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// `timeout` from now, saturating instead of overflowing the clock
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}
