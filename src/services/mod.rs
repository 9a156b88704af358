pub mod api_server;
pub mod dispatcher;
pub mod enrollment;
pub mod verifier;

use crate::error::{WalletError, WalletResult};
use std::future::Future;
use std::time::Duration;

/// Runs a service operation under a deadline.
///
/// Dropping the operation at the deadline is safe: wallet writes commit in a
/// single step, so a timed-out import leaves no record behind.
pub async fn with_timeout<T>(
    limit: Duration,
    operation: impl Future<Output = WalletResult<T>>,
) -> WalletResult<T> {
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| WalletError::TimedOut(limit))?
}
