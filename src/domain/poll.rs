//! The one retry idiom of the crate: re-evaluate a condition against an
//! external system on a fixed interval until it holds, fails, or times out.
//!
//! Predicates decide what is transient. A predicate that hits a lock or a
//! conflict answers "not yet" (`Ok(false)` / `Ok(None)`) and gets called again;
//! a predicate that sees a broken remote state returns `Err` and polling stops
//! immediately.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};

use crate::error::ClientError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("condition not reached after {waited:?} (timeout {timeout:?})")]
    Timeout { waited: Duration, timeout: Duration },
}

/// Polls `predicate` until it returns `Ok(Some(value))`.
///
/// Invocations are spaced at least `interval` apart. The predicate is always
/// evaluated once before the timeout is checked, so a condition that becomes
/// true exactly at `timeout` still succeeds. Never returns later than
/// `timeout + interval` plus the duration of the last predicate call.
pub async fn poll_for<T, E, F, Fut>(interval: Duration, timeout: Duration, mut predicate: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: From<PollError>,
{
    let started = Instant::now();

    loop {
        if let Some(value) = predicate().await? {
            return Ok(value);
        }

        let waited = started.elapsed();
        if waited >= timeout {
            return Err(PollError::Timeout { waited, timeout }.into());
        }

        sleep(interval).await;
    }
}

/// Boolean form of [`poll_for`]: `Ok(true)` is done, `Ok(false)` retries.
pub async fn poll_until<E, F, Fut>(interval: Duration, timeout: Duration, mut predicate: F) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: From<PollError>,
{
    poll_for(interval, timeout, || {
        let check = predicate();
        async move { check.await.map(|done| done.then_some(())) }
    })
    .await
}

/// Runs a mutating call, retrying it while the remote side reports a conflict
/// (e.g. a bare-metal node locked by a conductor). Other errors are returned
/// as they are.
pub async fn retry_on_conflict<T, F, Fut>(interval: Duration, timeout: Duration, mut call: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    poll_for(interval, timeout, || {
        let attempt = call();
        async move {
            match attempt.await {
                Ok(value) => Ok(Some(value)),
                Err(ClientError::Conflict(reason)) => {
                    log::debug!("Remote resource busy, retrying: {}", reason);
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Broken,
        Poll(PollError),
    }

    impl From<PollError> for TestError {
        fn from(value: PollError) -> Self {
            TestError::Poll(value)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_ready_times_out_within_one_interval() {
        let interval = Duration::from_secs(5);
        let timeout = Duration::from_secs(60);
        let started = Instant::now();

        let result: Result<(), TestError> = poll_until(interval, timeout, || async { Ok(false) }).await;

        assert!(matches!(result, Err(TestError::Poll(PollError::Timeout { .. }))));
        let elapsed = started.elapsed();
        assert!(elapsed >= timeout);
        assert!(elapsed <= timeout + interval);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_after_timeout_over_interval_misses_succeeds() {
        let interval = Duration::from_secs(5);
        let timeout = Duration::from_secs(60);
        let misses = (timeout.as_secs() / interval.as_secs()) as usize;
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let result: Result<(), TestError> = poll_until(interval, timeout, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n >= misses) }
        })
        .await;

        assert_eq!(result, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), misses + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn error_stops_polling_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let result: Result<(), TestError> = poll_until(Duration::from_secs(1), Duration::from_secs(30), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Broken) }
        })
        .await;

        assert_eq!(result, Err(TestError::Broken));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invocations_are_spaced_by_the_interval() {
        let interval = Duration::from_secs(3);
        let stamps = Arc::new(std::sync::Mutex::new(Vec::new()));

        let recorded = stamps.clone();
        let _: Result<(), TestError> = poll_until(interval, Duration::from_secs(12), move || {
            recorded.lock().unwrap().push(Instant::now());
            async { Ok(false) }
        })
        .await;

        let stamps = stamps.lock().unwrap();
        assert!(stamps.len() >= 4);
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= interval);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn conflicts_are_retried_until_the_call_goes_through() {
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let result = retry_on_conflict(Duration::from_secs(2), Duration::from_secs(30), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 { Err(ClientError::Conflict("node locked by conductor-1".to_string())) } else { Ok(n) }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_conflict_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let result: Result<(), ClientError> = retry_on_conflict(Duration::from_secs(2), Duration::from_secs(30), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(ClientError::NotFound("node".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(ClientError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
