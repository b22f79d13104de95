//! Batch dispatcher.
//!
//! Fans one unit of work per item out over a bounded pool and collects
//! results into a slot arena indexed by input position, so the output
//! sequence always matches the input sequence regardless of completion
//! order. Item failures are values produced by the closure; one item can
//! never abort its siblings.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Run `work(position, item)` for every item with at most `limit` units
/// in flight. Returns exactly one output per input, in input order.
pub async fn run_batch<T, R, F, Fut>(items: Vec<T>, limit: usize, work: F) -> Vec<R>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = R>,
{
    let limit = limit.max(1);
    let total = items.len();

    let mut slots: Vec<Option<R>> = Vec::with_capacity(total);
    slots.resize_with(total, || None);

    let mut completions = stream::iter(items.into_iter().enumerate().map(|(pos, item)| {
        let unit = work(pos, item);
        async move { (pos, unit.await) }
    }))
    .buffer_unordered(limit);

    while let Some((pos, output)) = completions.next().await {
        slots[pos] = Some(output);
    }
    drop(completions);

    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_output_matches_input_order_under_reversed_latency() {
        let items: Vec<u64> = (0..10).collect();
        let out = run_batch(items, 4, |pos, item| async move {
            // later items finish first
            tokio::time::sleep(Duration::from_millis(20 - item)).await;
            pos * 100 + item as usize
        })
        .await;
        let expected: Vec<usize> = (0..10).map(|i| i * 100 + i).collect();
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn test_output_length_equals_input_length() {
        for n in [0usize, 1, 7] {
            let items: Vec<usize> = (0..n).collect();
            let out = run_batch(items, 3, |_, item| async move { item }).await;
            assert_eq!(out.len(), n);
        }
    }

    #[tokio::test]
    async fn test_one_failure_never_aborts_siblings() {
        let items = vec!["ok", "boom", "ok"];
        let out = run_batch(items, 2, |_, item| async move {
            if item == "boom" {
                Err("failed")
            } else {
                Ok(item)
            }
        })
        .await;
        assert_eq!(out, vec![Ok("ok"), Err("failed"), Ok("ok")]);
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_respected() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..20).collect();

        let (in_flight2, peak2) = (in_flight.clone(), peak.clone());
        run_batch(items, 3, move |_, _| {
            let in_flight = in_flight2.clone();
            let peak = peak2.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_limit_treated_as_one() {
        let out = run_batch(vec![1, 2], 0, |_, item| async move { item * 2 }).await;
        assert_eq!(out, vec![2, 4]);
    }
}
