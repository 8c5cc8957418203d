use crate::{Result, RetryConfig, RetryResult, SorterError};
use std::future::Future;

/// Execute an async operation with retry logic for rate limiting
///
/// This function handles the common pattern of retrying operations that may
/// fail due to rate limiting, with exponential backoff and configurable
/// limits. Only [`SorterError::RateLimit`] is retried; every other error is
/// returned immediately.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation_name` - Name of the operation for logging
/// * `operation` - Async function that returns a Result
/// * `on_rate_limit` - Callback invoked before each wait with (delay, operation name)
///
/// # Returns
/// A `RetryResult` containing the successful result and retry statistics
pub async fn retry_with_backoff<T, F, Fut, OnRateLimit>(
    config: RetryConfig,
    operation_name: &str,
    mut operation: F,
    mut on_rate_limit: OnRateLimit,
) -> Result<RetryResult<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    OnRateLimit: FnMut(u64, &str),
{
    let mut retries = 0;
    let mut was_rate_limited = false;

    loop {
        match operation().await {
            Ok(result) => {
                return Ok(RetryResult {
                    result,
                    retries_used: retries,
                    was_rate_limited,
                });
            }
            Err(SorterError::RateLimit { retry_after }) => {
                was_rate_limited = true;

                if !config.enabled || retries >= config.max_retries {
                    log::warn!(
                        "Max retries ({}) exceeded for {} operation",
                        config.max_retries,
                        operation_name
                    );
                    return Err(SorterError::RateLimit { retry_after });
                }

                // Exponential backoff, capped by max_delay but never shorter
                // than the wait the server asked for.
                let backoff = config.base_delay * 2_u64.pow(retries);
                let delay = std::cmp::max(std::cmp::min(backoff, config.max_delay), retry_after);

                log::info!(
                    "{} rate limited. Waiting {} seconds before retry {} of {}",
                    operation_name,
                    delay,
                    retries + 1,
                    config.max_retries
                );

                on_rate_limit(delay, operation_name);

                tokio::time::sleep(std::time::Duration::from_secs(delay)).await;
                retries += 1;
            }
            Err(other_error) => {
                return Err(other_error);
            }
        }
    }
}

/// Simplified retry function for operations that don't need custom rate limit handling
pub async fn retry_operation<T, F, Fut>(
    config: RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<RetryResult<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_backoff(config, operation_name, operation, |delay, op_name| {
        log::debug!("Rate limited during {op_name}: waiting {delay} seconds");
    })
    .await
}
