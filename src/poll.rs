// ABOUTME: Fixed-interval "wait until terminal state" primitive.
// ABOUTME: Every stage that depends on an asynchronous backend operation polls through here.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// How long and how often to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between consecutive status checks.
    pub interval: Duration,
    /// Total number of status checks, including the first.
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Poll at most `max_attempts` times.
    pub fn attempts(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Poll for at most `max_elapsed`, expressed as a whole number of intervals.
    pub fn within(max_elapsed: Duration, interval: Duration) -> Self {
        let attempts = if interval.is_zero() {
            1
        } else {
            (max_elapsed.as_millis() / interval.as_millis().max(1)).min(u32::MAX as u128) as u32
        };
        Self::attempts(interval, attempts)
    }

    /// Upper bound on the time spent sleeping.
    pub fn max_elapsed(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// What a single status check saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Reached the desired state.
    Done,
    /// Not there yet; carries the observed status for logs.
    Pending(String),
    /// Backend reported an explicit failure state. Never retried.
    Failed(String),
}

impl Observation {
    /// Classify a status string against success and failure sets, ignoring case.
    pub fn from_status(status: &str, success: &[&str], failure: &[&str]) -> Self {
        if success.iter().any(|s| s.eq_ignore_ascii_case(status)) {
            Observation::Done
        } else if failure.iter().any(|s| s.eq_ignore_ascii_case(status)) {
            Observation::Failed(status.to_string())
        } else {
            Observation::Pending(status.to_string())
        }
    }
}

/// Why polling stopped without reaching the desired state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("{what} entered failure state '{status}'")]
    TerminalFailure { what: String, status: String },

    #[error("{what} did not reach the expected state after {attempts} checks ({}s); last seen: {}",
        .elapsed.as_secs(), .last_seen.as_deref().unwrap_or("nothing"))]
    TimeoutExceeded {
        what: String,
        attempts: u32,
        elapsed: Duration,
        last_seen: Option<String>,
    },
}

/// Fetch a status repeatedly until `classify` reports a terminal outcome.
///
/// The first check happens immediately, so a resource that is already in the
/// desired state costs no sleep. A failed fetch counts as "unknown this round":
/// it uses up one attempt and one interval, but never ends the poll early.
pub async fn poll_until<T, E, F, Fut, C>(
    policy: PollPolicy,
    what: &str,
    mut fetch: F,
    classify: C,
) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    C: Fn(&T) -> Observation,
{
    let started = Instant::now();
    let mut last_seen = None;

    for attempt in 1..=policy.max_attempts {
        match fetch().await {
            Ok(value) => match classify(&value) {
                Observation::Done => {
                    tracing::debug!(what, attempt, "poll reached desired state");
                    return Ok(value);
                }
                Observation::Failed(status) => {
                    return Err(PollError::TerminalFailure {
                        what: what.to_string(),
                        status,
                    });
                }
                Observation::Pending(status) => {
                    tracing::debug!(
                        what,
                        attempt,
                        max_attempts = policy.max_attempts,
                        %status,
                        "still waiting"
                    );
                    last_seen = Some(status);
                }
            },
            Err(e) => {
                tracing::warn!(
                    "status check for {} failed (attempt {}/{}): {}",
                    what,
                    attempt,
                    policy.max_attempts,
                    e
                );
                last_seen = Some(format!("error: {e}"));
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(PollError::TimeoutExceeded {
        what: what.to_string(),
        attempts: policy.max_attempts,
        elapsed: started.elapsed(),
        last_seen,
    })
}
