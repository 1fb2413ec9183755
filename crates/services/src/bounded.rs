use std::future::Future;
use std::time::Duration;

use anyhow::anyhow;

/// Runs a port call with an upper bound on its duration. A call that outlives
/// `limit` is reported as an error; the call itself is dropped.
pub(crate) async fn bounded<T, F>(limit: Duration, operation: &'static str, call: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| anyhow!("{operation} timed out after {}ms", limit.as_millis()))?
}
