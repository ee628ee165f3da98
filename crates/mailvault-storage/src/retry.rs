//! Bounded retry with exponential backoff over an HTTP request factory.
//!
//! A failed attempt consumes its request body, so the executor never reuses a
//! request: callers hand in a *factory* that builds a fresh request per
//! attempt (re-opening any streaming source), plus a classification callback
//! encoding that operation's own success-code and idempotency table. Backoff
//! sleeps and in-flight requests both race the caller's cancellation token.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Retry behavior for a storage client.
///
/// Immutable after construction and shared read-only across concurrent
/// operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first (minimum 1).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay: Duration,
    /// Upper bound on any single backoff delay, before jitter.
    pub max_delay: Duration,
    /// Random jitter factor: each delay is scaled by `[1, 1 + jitter]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    /// Sets the maximum attempt count.
    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base backoff delay.
    #[must_use]
    pub const fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the backoff delay cap.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the jitter factor.
    #[must_use]
    pub const fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Classification outcome for one obtained response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Terminal for this operation: hand the response back, success or not.
    Done,
    /// Transient: discard the response and try again after backoff.
    Retry,
}

/// Returns `true` for statuses indicating a transient server-side or
/// rate-limiting condition.
///
/// Client errors other than throttling are terminal; retrying them cannot
/// change the outcome.
#[must_use]
pub fn is_retriable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Executes a request with bounded retries.
///
/// `factory` is invoked fresh on every attempt; if it fails, its error is
/// returned immediately; a malformed request will not become well-formed by
/// retrying. Transport errors are retriable unless `cancel` has fired, in
/// which case [`Error::Cancelled`] is returned without further attempts. A
/// response classified [`Verdict::Done`] is returned as-is; the caller maps
/// its status. After the final attempt the last observed response or error is
/// returned.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] on cancellation, the factory's error on
/// request construction failure, or [`Error::Http`] when the final attempt's
/// transport failed.
pub async fn execute<F, Fut, C>(
    http: &reqwest::Client,
    cancel: &CancellationToken,
    policy: &RetryPolicy,
    operation: &'static str,
    factory: F,
    mut classify: C,
) -> Result<reqwest::Response>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Request>>,
    C: FnMut(u32, &reqwest::Response) -> Verdict,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    // Every iteration of the final attempt returns, so the loop needs no
    // fallback exit.
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let request = factory().await?;
        debug!(operation, attempt, url = %request.url(), "sending request");

        let outcome = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = http.execute(request) => outcome,
        };

        let last = attempt + 1 == attempts;
        match outcome {
            Ok(response) => match classify(attempt, &response) {
                Verdict::Done => return Ok(response),
                Verdict::Retry if last => {
                    warn!(
                        operation,
                        status = %response.status(),
                        attempts,
                        "retries exhausted"
                    );
                    return Ok(response);
                }
                Verdict::Retry => {
                    warn!(
                        operation,
                        status = %response.status(),
                        attempt,
                        "transient response, backing off"
                    );
                    drop(response);
                }
            },
            Err(err) => {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                if last {
                    warn!(operation, error = %err, attempts, "transport failed, retries exhausted");
                    return Err(err.into());
                }
                warn!(operation, error = %err, attempt, "transport failed, backing off");
            }
        }

        let delay = backoff_delay(policy, attempt);
        tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

/// Computes the jittered delay before retrying after `attempt`.
///
/// The exponential component doubles per attempt and is capped at
/// `max_delay`; jitter then scales it by a uniform factor in
/// `[1, 1 + jitter]`.
fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponential = policy
        .base_delay
        .saturating_mul(1_u32 << attempt.min(16))
        .min(policy.max_delay);
    if policy.jitter <= 0.0 {
        return exponential;
    }
    let factor = rand::thread_rng().gen_range(1.0..=1.0 + policy.jitter);
    exponential.mul_f64(factor)
}
