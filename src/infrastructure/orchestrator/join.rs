use std::future::Future;

use futures::future::join_all;
use tracing::error;

use crate::domain::ProvisionError;

/// Spawn one task per item and wait for every one of them.
///
/// Outcomes come back in input order. A task that panics is reported as
/// [`ProvisionError::Internal`] in its slot; the other tasks are unaffected.
pub async fn join_all_tasks<I, T, F, Fut, O>(items: I, task: F) -> Vec<Result<O, ProvisionError>>
where
    I: IntoIterator<Item = T>,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<O, ProvisionError>> + Send + 'static,
    O: Send + 'static,
{
    let handles: Vec<_> = items
        .into_iter()
        .map(|item| tokio::spawn(task(item)))
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| {
            joined.unwrap_or_else(|e| {
                error!(error = %e, "Provisioning task aborted");
                Err(ProvisionError::internal(format!("task aborted: {}", e)))
            })
        })
        .collect()
}
