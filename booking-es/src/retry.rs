use crate::config::RetryConfig;
use crate::errors::CommandError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `operation` until it succeeds, fails with a non-retriable error, or
/// exhausts `config.max_attempts`.
///
/// Only [`CommandError::ConcurrentModification`] is retried. Between
/// attempts the task sleeps for the configured exponential backoff with up
/// to 25% random jitter either way, never beyond `max_delay`. The error of
/// the final attempt is returned unchanged.
pub async fn retry_on_conflict<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, CommandError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CommandError>>,
{
    let max_attempts = config.max_attempts.into_inner();
    let mut attempt = 1;

    loop {
        match operation().await {
            Err(error) if error.is_retriable() && attempt < max_attempts => {
                let delay = jittered_delay(config, attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "concurrent modification, retrying with fresh state"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn jittered_delay(config: &RetryConfig, retry: u32) -> Duration {
    let delay_ms = config.delay_for_attempt(retry).as_millis() as f64;
    let max_ms = config.max_delay.into_inner() as f64;

    let jitter = delay_ms * rand::rng().random_range(-0.25..=0.25);
    Duration::from_millis((delay_ms + jitter).clamp(0.0, max_ms) as u64)
}
