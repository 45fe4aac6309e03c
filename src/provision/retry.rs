// ABOUTME: Bounded resubmission of a single control-plane request.
// ABOUTME: Only transient errors are retried, with a fixed delay between attempts.

use std::future::Future;
use std::time::Duration;

use crate::cloud::CloudError;

/// The last error after all attempts were used, or the first non-transient one.
#[derive(Debug)]
pub struct Exhausted {
    pub attempts: u32,
    pub source: CloudError,
}

/// Run `op` up to `max_attempts` times while it fails transiently.
///
/// Never wraps a polling loop: callers retry one submission, then poll.
pub async fn submit_with_retry<T, F, Fut>(
    what: &str,
    max_attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, Exhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CloudError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                tracing::warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    what,
                    attempt,
                    max_attempts,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(source) => {
                return Err(Exhausted {
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}
