//! Cancellable waits for the retry loop
//!
//! Waits are expressed as `tokio::time::sleep` suspension points raced
//! against a [`CancellationToken`], so a retry loop never occupies a worker
//! thread for its whole window and stops as soon as its owner asks it to.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Marker returned when a wait was cut short by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Sleep for `duration`, or until `token` is cancelled.
///
/// A zero duration returns immediately without yielding, unless the token is
/// already cancelled.
pub async fn sleep_or_cancel(
    duration: Duration,
    token: Option<&CancellationToken>,
) -> Result<(), Cancelled> {
    let Some(token) = token else {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
        return Ok(());
    };

    if token.is_cancelled() {
        return Err(Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }

    tokio::select! {
        () = tokio::time::sleep(duration) => Ok(()),
        () = token.cancelled() => {
            tracing::debug!(wait_ms = duration.as_millis() as u64, "wait cancelled");
            Err(Cancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn sleeps_full_duration_without_token() {
        let start = Instant::now();
        sleep_or_cancel(Duration::from_millis(250), None)
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();

        let start = Instant::now();
        let result = sleep_or_cancel(Duration::from_secs(10), Some(&token)).await;
        assert_eq!(result, Err(Cancelled));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_wait_stops_early() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = sleep_or_cancel(Duration::from_secs(10), Some(&token)).await;
        assert_eq!(result, Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
