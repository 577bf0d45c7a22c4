use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::CoreError;

/// Run one store call under a fixed deadline.
///
/// Dropping the inner future on expiry is the cancellation; anything the
/// call already committed stays committed.
pub async fn with_deadline<T, F>(
    operation: &'static str,
    after: Duration,
    fut: F,
) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = after.as_millis() as u64, "store operation timed out");
            Err(CoreError::Timeout { operation, after })
        }
    }
}
