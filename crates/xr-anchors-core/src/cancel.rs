//! Cancellation-aware futures.

use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::types::{AnchorError, Result};

/// Race a future against a [`CancellationToken`].
///
/// Resolves to `Err(AnchorError::Cancelled)` when the token fires first.
/// An already-cancelled token always wins.
#[async_trait]
pub(crate) trait OrCancelExt: Sized {
    type Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(AnchorError::Cancelled),
            res = self => Ok(res),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_returns_output_when_future_completes_first() {
        let token = CancellationToken::new();
        let result = async { 42 }.or_cancel(&token).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_returns_cancelled_when_token_fires_first() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = async {
            sleep(Duration::from_secs(5)).await;
            7
        }
        .or_cancel(&token)
        .await;

        assert_eq!(result, Err(AnchorError::Cancelled));
    }

    #[tokio::test]
    async fn test_already_cancelled_token_wins() {
        let token = CancellationToken::new();
        token.cancel();
        let result = async { 1 }.or_cancel(&token).await;
        assert_eq!(result, Err(AnchorError::Cancelled));
    }
}
