//! Bounded fan-out over a batch of inputs.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Run `work` for every input with at most `max_concurrency` in flight.
///
/// Results come back in input order. A task that panics leaves `None` in its
/// slot; the rest of the batch is unaffected.
pub async fn map_bounded<I, T, F, Fut>(inputs: Vec<I>, max_concurrency: usize, work: F) -> Vec<Option<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut slots: Vec<Option<T>> = inputs.iter().map(|_| None).collect();
    let mut join_set = JoinSet::new();

    for (index, input) in inputs.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let task = work(input);
        join_set.spawn(async move {
            // The semaphore is never closed, so acquire only fails if it were.
            let _permit = semaphore.acquire_owned().await.ok();
            (index, task.await)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, value)) => slots[index] = Some(value),
            Err(e) => tracing::warn!(error = %e, "worker task failed"),
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let out = map_bounded(vec![30u64, 10, 20, 0], 4, |ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            ms * 2
        })
        .await;
        assert_eq!(out, vec![Some(60), Some(20), Some(40), Some(0)]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let out = map_bounded((0..12).collect(), 3, |i: usize| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                i
            }
        })
        .await;

        assert_eq!(out.len(), 12);
        assert!(out.iter().all(Option::is_some));
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_panicking_task_leaves_empty_slot() {
        let out = map_bounded(vec![1, 2, 3], 2, |i: i32| async move {
            if i == 2 {
                panic!("boom");
            }
            i
        })
        .await;
        assert_eq!(out, vec![Some(1), None, Some(3)]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let out: Vec<Option<()>> = map_bounded(Vec::<()>::new(), 4, |_| async {}).await;
        assert!(out.is_empty());
    }
}
