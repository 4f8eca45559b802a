pub mod clock;
pub mod manager;

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

pub use clock::{Clock, SystemClock};
pub use manager::LeaseManager;

/// Runs one store-bound operation, failing with `StoreUnavailable` once `limit` elapses.
pub(crate) async fn bounded<T>(
    limit: Duration,
    op: &'static str,
    fut: impl Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::StoreUnavailable(format!(
            "{op} did not complete within {limit:?}"
        ))),
    }
}
