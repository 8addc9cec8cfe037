use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Runs `work` over `items` with at most `limit` units in flight.
///
/// Cancellation is checked before each dispatch: once `cancel` fires no new unit
/// starts, while units already running finish and their results are kept.
/// Units returning `None` contribute nothing. Results arrive in completion order.
pub async fn run_bounded<I, T, F, Fut>(
    items: I,
    limit: usize,
    cancel: &CancellationToken,
    work: F,
) -> Vec<T>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = Option<T>> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let (tx, mut rx) = mpsc::unbounded_channel();

    for item in items {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Cancelled, no further units dispatched");
                break;
            }
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let unit = work(item);
        let tx = tx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Some(result) = unit.await {
                // Receiver outlives every sender
                let _ = tx.send(result);
            }
        });
    }

    // Channel closes once the last worker drops its sender
    drop(tx);

    let mut results = Vec::new();
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    results
}
