//! Hold-down queue of pending trigger notifications.
//!
//! A binary min-heap ordered by fire time, guarded by a mutex, plus a
//! [`Notify`] that wakes the consumer whenever the head may have changed.
//! Removal by the consumer and cancellation by key both happen under the
//! same lock, so a task is either handed out or cancelled, never both.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use claw_incident::IncidentEvent;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::task::DelayedTask;

/// Result of [`HoldDownQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// A new task was added.
    Scheduled {
        /// When the task fires.
        fire_at: Instant,
    },
    /// A task for the same key was already pending. Its event was replaced
    /// and its fire time kept.
    Replaced {
        /// When the task fires.
        fire_at: Instant,
    },
    /// The queue is closed and the task was dropped.
    Closed,
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    task: DelayedTask,
}

// Reversed so that `BinaryHeap` pops the earliest fire time first. Ties
// fall back to insertion order.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .task
            .fire_at()
            .cmp(&self.task.fire_at())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
    closed: bool,
}

/// Delay queue with cancel-by-key.
#[derive(Debug, Default)]
pub struct HoldDownQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl HoldDownQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task, or refreshes the event of the task already pending for
    /// the same key.
    pub fn enqueue(&self, task: DelayedTask) -> Enqueued {
        let mut state = self.state.lock();
        if state.closed {
            return Enqueued::Closed;
        }

        let pending = state
            .heap
            .iter()
            .find(|e| e.task.reduction_key() == task.reduction_key())
            .map(|e| e.task.fire_at());

        let outcome = if let Some(fire_at) = pending {
            let reduction_key = task.reduction_key().to_string();
            replace_pending(&mut state.heap, &reduction_key, task.into_event());
            Enqueued::Replaced { fire_at }
        } else {
            let fire_at = task.fire_at();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.heap.push(Entry { seq, task });
            Enqueued::Scheduled { fire_at }
        };
        drop(state);

        self.notify.notify_one();
        outcome
    }

    /// Removes every pending task for `reduction_key`, returning how many
    /// were removed.
    pub fn cancel(&self, reduction_key: &str) -> usize {
        let mut state = self.state.lock();
        let before = state.heap.len();
        state.heap.retain(|e| e.task.reduction_key() != reduction_key);
        let removed = before - state.heap.len();
        drop(state);

        if removed > 0 {
            debug!(reduction_key, removed, "cancelled pending tasks");
            self.notify.notify_one();
        }
        removed
    }

    /// Waits for the next task to become due and removes it.
    ///
    /// Returns `None` once the queue is closed.
    pub async fn next_due(&self) -> Option<DelayedTask> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);

            let remaining = {
                let mut state = self.state.lock();
                if state.closed {
                    return None;
                }
                let now = Instant::now();
                let head = state
                    .heap
                    .peek()
                    .map(|e| (e.task.is_due(now), e.task.remaining(now)));
                match head {
                    Some((true, _)) => return state.heap.pop().map(|e| e.task),
                    Some((false, remaining)) => Some(remaining),
                    None => None,
                }
            };

            match remaining {
                Some(remaining) => {
                    tokio::select! {
                        () = sleep(remaining) => {}
                        () = &mut notified => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Closes the queue, dropping every pending task.
    ///
    /// Returns how many tasks were dropped.
    pub fn close(&self) -> usize {
        let mut state = self.state.lock();
        state.closed = true;
        let dropped = state.heap.len();
        state.heap.clear();
        drop(state);

        self.notify.notify_one();
        dropped
    }

    /// Returns true once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Returns true if a task is pending for `reduction_key`.
    pub fn contains(&self, reduction_key: &str) -> bool {
        self.state
            .lock()
            .heap
            .iter()
            .any(|e| e.task.reduction_key() == reduction_key)
    }

    /// Returns the number of pending tasks.
    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    /// Returns true if no task is pending.
    pub fn is_empty(&self) -> bool {
        self.state.lock().heap.is_empty()
    }
}

fn replace_pending(heap: &mut BinaryHeap<Entry>, reduction_key: &str, event: IncidentEvent) {
    let mut entries = std::mem::take(heap).into_vec();
    if let Some(entry) = entries
        .iter_mut()
        .find(|e| e.task.reduction_key() == reduction_key)
    {
        entry.task.replace_event(event);
    }
    *heap = BinaryHeap::from(entries);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use claw_incident::{EventAction, EventPayload, IncidentSeverity};

    use super::*;

    fn trigger(key: &str, summary: &str) -> IncidentEvent {
        IncidentEvent::new("R0UT1NG", key, EventAction::Trigger).with_payload(EventPayload::new(
            summary,
            "router-1",
            IncidentSeverity::Error,
        ))
    }

    fn task(delay_secs: u64, key: &str) -> DelayedTask {
        DelayedTask::after(Duration::from_secs(delay_secs), key, trigger(key, key)).unwrap()
    }

    fn refreshed(delay_secs: u64, key: &str, summary: &str) -> DelayedTask {
        DelayedTask::after(Duration::from_secs(delay_secs), key, trigger(key, summary)).unwrap()
    }

    fn summary(task: &DelayedTask) -> &str {
        task.event().payload.as_ref().map_or("", |p| p.summary.as_str())
    }

    mod ordering_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn pops_in_fire_time_order() {
            let queue = HoldDownQueue::new();
            queue.enqueue(task(3, "c"));
            queue.enqueue(task(1, "a"));
            queue.enqueue(task(2, "b"));

            let mut keys = Vec::new();
            for _ in 0..3 {
                keys.push(queue.next_due().await.unwrap().reduction_key().to_string());
            }
            assert_eq!(keys, vec!["a", "b", "c"]);
        }

        #[tokio::test(start_paused = true)]
        async fn equal_fire_times_keep_insertion_order() {
            let queue = HoldDownQueue::new();
            let at = Instant::now() + Duration::from_secs(1);
            queue.enqueue(DelayedTask::new(at, "first", trigger("first", "1")));
            queue.enqueue(DelayedTask::new(at, "second", trigger("second", "2")));

            assert_eq!(queue.next_due().await.unwrap().reduction_key(), "first");
            assert_eq!(queue.next_due().await.unwrap().reduction_key(), "second");
        }

        #[tokio::test(start_paused = true)]
        async fn does_not_return_before_fire_time() {
            let queue = HoldDownQueue::new();
            let start = Instant::now();
            queue.enqueue(task(5, "k1"));

            let popped = queue.next_due().await.unwrap();
            assert_eq!(popped.reduction_key(), "k1");
            assert!(Instant::now() - start >= Duration::from_secs(5));
        }
    }

    mod dedupe_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn duplicate_key_keeps_fire_time_and_takes_latest_event() {
            let queue = HoldDownQueue::new();
            let first = queue.enqueue(refreshed(5, "k1", "first"));
            let Enqueued::Scheduled { fire_at } = first else {
                panic!("expected Scheduled, got {first:?}");
            };

            tokio::time::advance(Duration::from_secs(2)).await;
            let second = queue.enqueue(refreshed(5, "k1", "second"));
            assert_eq!(second, Enqueued::Replaced { fire_at });
            assert_eq!(queue.len(), 1);

            let popped = queue.next_due().await.unwrap();
            assert_eq!(popped.fire_at(), fire_at);
            assert_eq!(summary(&popped), "second");
        }
    }

    mod cancel_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn cancel_removes_only_matching_key() {
            let queue = HoldDownQueue::new();
            queue.enqueue(task(5, "k1"));
            queue.enqueue(task(5, "k2"));

            assert_eq!(queue.cancel("k1"), 1);
            assert_eq!(queue.cancel("k1"), 0);
            assert!(!queue.contains("k1"));
            assert!(queue.contains("k2"));
            assert_eq!(queue.len(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn cancel_wakes_waiting_consumer() {
            let queue = Arc::new(HoldDownQueue::new());
            queue.enqueue(task(5, "k1"));
            queue.enqueue(task(10, "k2"));

            let consumer = {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let task = queue.next_due().await.unwrap();
                    (task.reduction_key().to_string(), Instant::now())
                })
            };

            let start = Instant::now();
            tokio::time::sleep(Duration::from_secs(2)).await;
            queue.cancel("k1");

            let (key, at) = consumer.await.unwrap();
            assert_eq!(key, "k2");
            assert!(at - start >= Duration::from_secs(10));
        }

        #[tokio::test(start_paused = true)]
        async fn earlier_task_wakes_consumer() {
            let queue = Arc::new(HoldDownQueue::new());
            queue.enqueue(task(60, "late"));

            let consumer = {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.next_due().await.unwrap() })
            };
            tokio::task::yield_now().await;
            queue.enqueue(task(1, "early"));

            assert_eq!(consumer.await.unwrap().reduction_key(), "early");
        }

        #[tokio::test(start_paused = true)]
        async fn waits_on_empty_queue_until_enqueue() {
            let queue = Arc::new(HoldDownQueue::new());
            let consumer = {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.next_due().await })
            };

            tokio::time::sleep(Duration::from_secs(30)).await;
            assert!(!consumer.is_finished());

            queue.enqueue(task(0, "now"));
            assert_eq!(consumer.await.unwrap().unwrap().reduction_key(), "now");
        }
    }

    mod close_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn close_drops_pending_and_releases_consumer() {
            let queue = Arc::new(HoldDownQueue::new());
            queue.enqueue(task(5, "k1"));

            let consumer = {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.next_due().await })
            };
            tokio::task::yield_now().await;

            assert_eq!(queue.close(), 1);
            assert!(consumer.await.unwrap().is_none());
            assert!(queue.is_closed());
            assert!(queue.is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn enqueue_after_close_is_rejected() {
            let queue = HoldDownQueue::new();
            queue.close();
            assert_eq!(queue.enqueue(task(1, "k1")), Enqueued::Closed);
            assert!(queue.is_empty());
        }
    }
}
