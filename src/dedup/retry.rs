//! Retry loop with exponential backoff

use std::future::Future;

use super::config::RetryPolicy;

/// Run `fetcher` until it succeeds or `max_retries` additional attempts fail
///
/// Makes at most `max_retries + 1` calls. The delays between attempts follow
/// `policy` and never decrease. On exhaustion the last error observed is
/// returned.
pub async fn retry_with_backoff<F, Fut, V, E>(
    key: &str,
    policy: &RetryPolicy,
    max_retries: u32,
    mut fetcher: F,
) -> Result<V, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<V, E>>,
    E: std::fmt::Display,
{
    let backoff = policy.backoff();
    let mut attempt = 0u32;

    loop {
        match fetcher().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(key = key, retries = attempt, "Fetch succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= max_retries => {
                tracing::warn!(
                    key = key,
                    attempts = attempt + 1,
                    error = %e,
                    "Fetch failed, retries exhausted"
                );
                return Err(e);
            }
            Err(e) => {
                attempt += 1;
                let delay = backoff.delay(attempt);

                tracing::debug!(
                    key = key,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Fetch failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_makes_three_attempts() {
        let calls: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);

        let result: Result<(), String> =
            retry_with_backoff("k", &RetryPolicy::default(), 2, move || {
                let recorded = Arc::clone(&recorded);
                async move {
                    let mut calls = recorded.lock();
                    calls.push(Instant::now());
                    Err(format!("failure {}", calls.len()))
                }
            })
            .await;

        // Last error wins
        assert_eq!(result, Err("failure 3".to_string()));

        let calls = calls.lock();
        assert_eq!(calls.len(), 3);
        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps, vec![Duration::from_millis(1000), Duration::from_millis(2000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let calls = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&calls);

        let result: Result<&str, String> =
            retry_with_backoff("k", &RetryPolicy::default(), 2, move || {
                let counter = Arc::clone(&counter);
                async move {
                    let mut n = counter.lock();
                    *n += 1;
                    if *n < 2 {
                        Err("flaky".to_string())
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(*calls.lock(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_single_attempt() {
        let calls = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&calls);

        let result: Result<(), String> = retry_with_backoff("k", &RetryPolicy::none(), 0, move || {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock() += 1;
                Err("down".to_string())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(*calls.lock(), 1);
    }
}
