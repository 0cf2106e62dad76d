use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy for external collaborators (downloads, caption fetches, LLM
/// calls). The alignment core is pure and never retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts before giving up
    pub max_attempts: u32,
    /// Fixed sleep between attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Run `op` until it succeeds or `max_attempts` is exhausted, sleeping
    /// `backoff` between attempts. The last error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "{} failed (attempt {}/{}): {}",
                        op_name, attempt, attempts, e
                    );
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} failed", op_name)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(30),
        }
    }
}
