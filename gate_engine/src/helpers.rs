use std::{future::Future, time::Duration};

use log::warn;

use crate::errors::StoreError;

/// Runs a store lookup with an upper bound on how long it may take. A lookup that does not finish in time is reported
/// as [`StoreError::Timeout`], which every caller in the pipeline treats as a hard failure.
pub async fn bounded_lookup<F, T>(limit: Duration, what: &str, lookup: F) -> Result<T, StoreError>
where F: Future<Output = Result<T, StoreError>> {
    match tokio::time::timeout(limit, lookup).await {
        Ok(result) => result,
        Err(_) => {
            warn!("🗃️ Lookup '{what}' timed out after {limit:?}");
            Err(StoreError::Timeout(limit))
        },
    }
}
