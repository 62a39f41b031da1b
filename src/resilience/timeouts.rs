//! Timeout enforcement.

use std::future::IntoFuture;
use std::time::Duration;

use thiserror::Error;

/// A bounded operation did not finish in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{operation} timed out after {limit:?}")]
pub struct Elapsed {
    pub operation: &'static str,
    pub limit: Duration,
}

/// Run `future` with a deadline. A zero `limit` means no deadline.
pub async fn bounded<F>(
    operation: &'static str,
    limit: Duration,
    future: F,
) -> Result<F::Output, Elapsed>
where
    F: IntoFuture,
{
    if limit.is_zero() {
        return Ok(future.await);
    }
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| Elapsed { operation, limit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_limit() {
        let result = bounded("quick", Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_elapsed_names_operation() {
        let result = bounded(
            "eth_getBalance",
            Duration::from_secs(1),
            tokio::time::sleep(Duration::from_secs(30)),
        )
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.operation, "eth_getBalance");
        assert_eq!(err.to_string(), "eth_getBalance timed out after 1s");
    }

    #[tokio::test]
    async fn test_zero_limit_is_unbounded() {
        let result = bounded("slow", Duration::ZERO, async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            1
        })
        .await;
        assert_eq!(result, Ok(1));
    }
}
