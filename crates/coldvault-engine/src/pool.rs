//! Bounded batch execution and cooperative cancellation

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Cooperative cancellation flag shared between a batch and its owner
///
/// Cancellation is observed between queue items: an item already being
/// processed runs to completion, so a cancelled batch never leaves a
/// half-applied document.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    /// A fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token; idempotent
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether the token has fired
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Wait until the token fires
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before re-checking the flag so a cancel() landing in
            // between cannot be missed
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Outcome of a batch run
#[derive(Debug)]
pub struct BatchOutcome<R> {
    /// Results of the items that ran, in completion order
    pub results: Vec<R>,

    /// Whether the batch stopped early on cancellation
    pub cancelled: bool,
}

/// Run `handler` over `items` with at most `max_in_flight` concurrent calls
///
/// A fixed set of workers drains a shared queue, so one slow item never
/// blocks the rest while the pool has spare capacity. Each worker checks the
/// cancel token before taking the next item.
pub async fn run_batch<T, R, F, Fut>(
    items: Vec<T>,
    max_in_flight: usize,
    cancel: &CancelToken,
    handler: F,
) -> BatchOutcome<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let queue = Mutex::new(VecDeque::from(items));
    let results = Mutex::new(Vec::new());
    let handler = &handler;
    let queue = &queue;
    let results = &results;

    let workers = (0..max_in_flight.max(1)).map(|_| async move {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let item = queue.lock().unwrap().pop_front();
            match item {
                Some(item) => {
                    let result = handler(item).await;
                    results.lock().unwrap().push(result);
                }
                None => break,
            }
        }
    });
    futures::future::join_all(workers).await;

    let results = results.lock().unwrap().drain(..).collect();
    BatchOutcome {
        results,
        cancelled: cancel.is_cancelled(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_runs_everything_with_bounded_concurrency() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let in_flight = &in_flight;
        let peak = &peak;

        let outcome = run_batch(
            (0..20).collect::<Vec<_>>(),
            3,
            &CancelToken::new(),
            |n| async move {
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(current, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                n * 2
            },
        )
        .await;

        assert_eq!(outcome.results.len(), 20);
        assert!(!outcome.cancelled);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_items() {
        let cancel = CancelToken::new();
        let processed = AtomicUsize::new(0);
        let processed = &processed;
        let cancel_ref = &cancel;

        let outcome = run_batch((0..100).collect::<Vec<_>>(), 1, &cancel, |n| async move {
            processed.fetch_add(1, Ordering::SeqCst);
            if n == 4 {
                cancel_ref.cancel();
            }
            n
        })
        .await;

        assert!(outcome.cancelled);
        // Item 4 finished; nothing after it started
        assert_eq!(outcome.results.len(), 5);
        assert_eq!(processed.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_cancelled_waits_for_fire() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
            true
        });
        token.cancel();
        assert!(handle.await.unwrap());
        assert!(token.is_cancelled());
    }
}
