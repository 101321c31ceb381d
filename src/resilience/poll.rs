//! Poll a predicate until it holds or a deadline passes.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use super::backoff::Backoff;

#[derive(Error, Debug)]
pub enum PollError<E> {
    #[error("timed out after {waited:?}")]
    Timeout { waited: Duration },
    #[error(transparent)]
    Failed(E),
}

impl<E> PollError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout { .. })
    }
}

/// Evaluate `predicate` until it returns `Ok(true)`.
///
/// Waits `backoff.delay(n)` between attempts, never sleeping past
/// `deadline`. An `Err` from the predicate stops polling immediately;
/// predicates that want to retry on transient failures return `Ok(false)`.
/// The deadline also bounds an in-flight predicate call.
pub async fn poll_until<F, Fut, E>(
    backoff: &Backoff,
    deadline: Instant,
    mut predicate: F,
) -> Result<(), PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        match tokio::time::timeout_at(deadline, predicate()).await {
            Ok(Ok(true)) => return Ok(()),
            Ok(Ok(false)) => {}
            Ok(Err(e)) => return Err(PollError::Failed(e)),
            Err(_) => {
                return Err(PollError::Timeout {
                    waited: started.elapsed(),
                })
            }
        }

        attempt = attempt.saturating_add(1);
        let wake = (Instant::now() + backoff.delay(attempt)).min(deadline);
        tokio::time::sleep_until(wake).await;

        if Instant::now() >= deadline {
            return Err(PollError::Timeout {
                waited: started.elapsed(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_poll_succeeds_after_retries() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let result: Result<(), PollError<()>> = poll_until(
            &Backoff::constant(Duration::from_secs(1)),
            started + Duration::from_secs(30),
            || async { Ok(calls.fetch_add(1, Ordering::SeqCst) >= 2) },
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_at_deadline() {
        let started = Instant::now();
        let result: Result<(), PollError<()>> = poll_until(
            &Backoff::constant(Duration::from_secs(10)),
            started + Duration::from_secs(5),
            || async { Ok(false) },
        )
        .await;

        assert!(matches!(result, Err(PollError::Timeout { .. })));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_on_error() {
        let calls = AtomicU32::new(0);
        let result = poll_until(
            &Backoff::constant(Duration::from_secs(1)),
            Instant::now() + Duration::from_secs(30),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<bool, &str>("boom")
            },
        )
        .await;

        assert!(matches!(result, Err(PollError::Failed("boom"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_slow_predicate() {
        let started = Instant::now();
        let result: Result<(), PollError<()>> = poll_until(
            &Backoff::constant(Duration::from_secs(1)),
            started + Duration::from_secs(3),
            || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(true)
            },
        )
        .await;

        assert!(result.unwrap_err().is_timeout());
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }
}
