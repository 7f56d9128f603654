//! Bounded-concurrency execution of independent tasks.
//!
//! Tasks are futures polled on the caller's task, so the limit bounds how
//! many I/O operations are in flight, not how many threads are busy. A
//! failing task never cancels or blocks its siblings.

use std::future::Future;

use futures::stream::{self, StreamExt};

/// Result of one task, tied back to its input position
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome<T, E> {
    /// Position of the input in the original list
    pub index: usize,
    pub result: Result<T, E>,
}

impl<T, E> TaskOutcome<T, E> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run every task with at most `limit` in flight and collect all outcomes.
///
/// Outcomes arrive in completion order; use [`TaskOutcome::index`] to map
/// them back to inputs. A `limit` of zero is treated as one.
pub async fn run_bounded<I, T, E, F, Fut>(
    items: Vec<I>,
    limit: usize,
    task: F,
) -> Vec<TaskOutcome<T, E>>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    run_bounded_streaming(items, limit, task, |_, _, _| {}).await
}

/// Like [`run_bounded`], calling `on_complete(outcome, done, total)` as each
/// task finishes.
pub async fn run_bounded_streaming<I, T, E, F, Fut, C>(
    items: Vec<I>,
    limit: usize,
    mut task: F,
    mut on_complete: C,
) -> Vec<TaskOutcome<T, E>>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&TaskOutcome<T, E>, usize, usize),
{
    let total = items.len();
    let mut outcomes = Vec::with_capacity(total);

    let mut in_flight = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let fut = task(item);
            async move {
                TaskOutcome {
                    index,
                    result: fut.await,
                }
            }
        })
        .buffer_unordered(limit.max(1));

    while let Some(outcome) = in_flight.next().await {
        on_complete(&outcome, outcomes.len() + 1, total);
        outcomes.push(outcome);
    }

    outcomes
}

/// Split outcomes into successes and failures, both sorted by input index
pub fn partition_outcomes<T, E>(
    mut outcomes: Vec<TaskOutcome<T, E>>,
) -> (Vec<(usize, T)>, Vec<(usize, E)>) {
    outcomes.sort_by_key(|o| o.index);

    let mut ok = Vec::new();
    let mut failed = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(value) => ok.push((outcome.index, value)),
            Err(err) => failed.push((outcome.index, err)),
        }
    }
    (ok, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_all_outcomes_returned_despite_failures() {
        let items: Vec<u32> = (0..10).collect();

        let outcomes = run_bounded(items, 3, |n| async move {
            if n % 2 == 0 {
                Err(format!("task {} failed", n))
            } else {
                Ok(n * 10)
            }
        })
        .await;

        assert_eq!(outcomes.len(), 10);
        let (ok, failed) = partition_outcomes(outcomes);
        assert_eq!(ok.len(), 5);
        assert_eq!(failed.len(), 5);
        assert_eq!(ok[0], (1, 10));
        assert_eq!(failed[0], (0, "task 0 failed".to_string()));
    }

    #[tokio::test]
    async fn test_limit_is_respected() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let outcomes = run_bounded((0..20).collect::<Vec<u64>>(), 4, |n| {
            let active = &active;
            let peak = &peak;
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5 + n % 3)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ()>(n)
            }
        })
        .await;

        assert_eq!(outcomes.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_zero_limit_runs_sequentially() {
        let outcomes = run_bounded(vec![1, 2, 3], 0, |n| async move { Ok::<_, ()>(n) }).await;
        assert_eq!(outcomes.len(), 3);
    }

    #[tokio::test]
    async fn test_streaming_reports_progress() {
        let mut seen = Vec::new();

        let outcomes = run_bounded_streaming(
            vec!["a", "b", "c"],
            2,
            |s| async move { Ok::<_, ()>(s.len()) },
            |outcome, done, total| {
                assert!(outcome.is_ok());
                seen.push((done, total));
            },
        )
        .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outcomes = run_bounded(Vec::<u8>::new(), 4, |n| async move { Ok::<_, ()>(n) }).await;
        assert!(outcomes.is_empty());
    }
}
