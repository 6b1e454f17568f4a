// Store call timeout protection
use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use super::StoreError;

pub struct QueryTimeout;

impl QueryTimeout {
    /// Run a store call, turning an overrun into `StoreError::Timeout`
    pub async fn execute_with_timeout<F, T>(
        query_fn: F,
        timeout_duration: Duration,
    ) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match timeout(timeout_duration, query_fn).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(timeout_duration)),
        }
    }

    /// Default bound for each store call made by the reward jobs (5 seconds)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, StoreError>(())
        };

        let result = QueryTimeout::execute_with_timeout(slow, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(StoreError::Timeout(d)) if d == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let fast = async { Ok::<_, StoreError>(42) };
        let result = QueryTimeout::execute_with_timeout(fast, QueryTimeout::DEFAULT_TIMEOUT).await;
        assert_eq!(result.unwrap(), 42);
    }
}
