//! Single-outcome handoff between a background worker and its initiator.
//!
//! A worker publishes exactly one terminal outcome onto a one-slot channel;
//! the initiator blocks on a selective wait over {outcome received,
//! cancellation signalled}. This replaces ad hoc shared mutable flags for
//! flows like the account setup handshake, where a background task serves a
//! browser redirect while the caller waits for the resulting credential or a
//! Ctrl-C.

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Errors a waiting initiator can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HandoffError {
    /// The caller's cancellation token fired before an outcome arrived.
    #[error("wait cancelled before an outcome arrived")]
    Cancelled,

    /// The worker dropped its sender without publishing an outcome.
    #[error("worker abandoned the handoff without an outcome")]
    Abandoned,
}

/// Publishing side of the handoff, held by the background worker.
#[derive(Debug)]
pub struct OutcomeSender<T>(oneshot::Sender<T>);

impl<T> OutcomeSender<T> {
    /// Publishes the single terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns the outcome back if the initiator has already gone away
    /// (typically after cancellation), so the worker can log or discard it.
    pub fn publish(self, outcome: T) -> Result<(), T> {
        self.0.send(outcome)
    }
}

/// Waiting side of the handoff, held by the initiator.
#[derive(Debug)]
pub struct OutcomeReceiver<T>(oneshot::Receiver<T>);

impl<T> OutcomeReceiver<T> {
    /// Waits for the outcome or for cancellation, whichever comes first.
    ///
    /// # Errors
    ///
    /// Returns [`HandoffError::Cancelled`] when the token fires first and
    /// [`HandoffError::Abandoned`] when the sender is dropped unpublished.
    pub async fn wait(self, cancel: &CancellationToken) -> Result<T, HandoffError> {
        tokio::select! {
            () = cancel.cancelled() => Err(HandoffError::Cancelled),
            outcome = self.0 => outcome.map_err(|_| HandoffError::Abandoned),
        }
    }
}

/// Creates a connected one-slot handoff pair.
#[must_use]
pub fn channel<T>() -> (OutcomeSender<T>, OutcomeReceiver<T>) {
    let (tx, rx) = oneshot::channel();
    (OutcomeSender(tx), OutcomeReceiver(rx))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn published_outcome_is_received() {
        let (tx, rx) = channel();
        let cancel = CancellationToken::new();

        tokio::spawn(async move {
            tx.publish(42_u32).unwrap();
        });

        assert_eq!(rx.wait(&cancel).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn cancellation_wins_over_a_slow_worker() {
        let (tx, rx) = channel::<u32>();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let start = std::time::Instant::now();
        let result = rx.wait(&cancel).await;

        assert_eq!(result, Err(HandoffError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
        // Worker-side publish after cancellation reports the lost outcome.
        assert_eq!(tx.publish(7), Err(7));
    }

    #[tokio::test]
    async fn dropped_sender_reports_abandonment() {
        let (tx, rx) = channel::<u32>();
        drop(tx);

        let cancel = CancellationToken::new();
        assert_eq!(rx.wait(&cancel).await, Err(HandoffError::Abandoned));
    }
}
