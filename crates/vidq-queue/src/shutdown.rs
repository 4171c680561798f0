//! Shutdown coordination for a [`BoundedQueue`] shared by producer and consumer threads.
//!
//! None of these operations surface the transient full/empty/timeout conditions; they retry
//! internally. Each one logs a `debug!` event naming the queue when it finishes.

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::liveness::ProducerLiveness;
use crate::queue::{BoundedQueue, QueueError, QueueFull};
use crate::types::{EndOfStream, QueueState};

/// Poll interval for timed pops while draining. Short enough to notice producer exit
/// promptly, long enough to avoid spinning.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerReport {
    /// Items dropped from the head of the queue to make room for the marker.
    pub evicted: u64,
}

/// Places an end-of-stream marker on `queue`, evicting from the head if it is full.
///
/// On return the marker is in the queue, so any consumer reading to completion observes it.
///
/// Precondition: this is the only thread sending a marker to `queue`, and no producer is
/// still pushing. Under that precondition the loop performs at most `capacity` evictions.
///
/// Data loss: up to `capacity` queued items may be discarded (each is acknowledged with
/// `task_done` so `join` does not wait for them). Shutdown takes priority over delivery.
pub fn send_completion_marker<T>(queue: &BoundedQueue<T>, name: &str) -> MarkerReport
where
    T: EndOfStream,
{
    queue.set_state(QueueState::Closing);
    let mut marker = T::end_of_stream();
    let mut evicted = 0u64;
    loop {
        match queue.try_put(marker) {
            Ok(()) => break,
            Err(QueueFull(returned)) => {
                marker = returned;
                match queue.try_get() {
                    Ok(_) => {
                        evicted += 1;
                        queue.metrics().evicted_total.inc();
                        acknowledge(queue, name);
                    }
                    // A consumer freed a slot between our two calls.
                    Err(_) => thread::yield_now(),
                }
            }
        }
    }
    debug!(
        queue = name,
        evicted, "sent end-of-stream marker to indicate we're stopping"
    );
    MarkerReport { evicted }
}

/// Removes and discards everything currently in `queue` without waiting for new items.
///
/// Returns as soon as the queue is observed empty; a producer that is still pushing may
/// leave items behind. Must not run concurrently with another `drain_now` on the same queue.
/// Returns the number of items discarded.
pub fn drain_now<T>(queue: &BoundedQueue<T>, name: &str) -> u64 {
    queue.set_state(QueueState::Closing);
    let mut drained = 0u64;
    while !queue.is_empty() {
        // Timed pop: another consumer may empty the queue between the check and the pop.
        if queue.get(Some(DRAIN_POLL_INTERVAL)).is_ok() {
            drained += 1;
            queue.metrics().drained_total.inc();
            acknowledge(queue, name);
        }
    }
    queue.set_state(QueueState::Drained);
    debug!(
        queue = name,
        drained, "purged all remaining elements from queue"
    );
    drained
}

#[derive(Debug)]
pub struct DrainOutcome<P> {
    pub drained: u64,
    /// The producer handle, handed back so the caller can join it.
    pub producer: P,
}

/// Handle to a background drain started by [`drain_until_producer_finishes`].
#[derive(Debug)]
pub struct DrainHandle<P> {
    name: String,
    handle: thread::JoinHandle<DrainOutcome<P>>,
}

impl<P> DrainHandle<P> {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the drain to complete: the producer has finished and the queue is empty.
    pub fn join(self) -> Result<DrainOutcome<P>, QueueError> {
        self.handle
            .join()
            .map_err(|_| QueueError::DrainPanicked(self.name))
    }
}

/// Starts a background thread that discards items from `queue` until `producer` has
/// finished and the queue is empty.
///
/// Use when the producer emits an unknown number of items and could otherwise block forever
/// on a full queue. Returns immediately. The drain pops with a [`DRAIN_POLL_INTERVAL`]
/// timeout so producer liveness is re-checked at least that often. It has no abort: stop it
/// by ending the producer.
pub fn drain_until_producer_finishes<T, P>(
    queue: &BoundedQueue<T>,
    name: &str,
    producer: P,
) -> Result<DrainHandle<P>, QueueError>
where
    T: Send + 'static,
    P: ProducerLiveness,
{
    queue.set_state(QueueState::Closing);
    let queue = queue.clone();
    let label = name.to_string();
    let handle = thread::Builder::new()
        .name(format!("drain-{name}"))
        .spawn(move || {
            let mut drained = 0u64;
            // Liveness is checked before emptiness: once the producer is seen finished it
            // cannot push again, so a following empty check is final.
            while producer.is_running() || !queue.is_empty() {
                if queue.get(Some(DRAIN_POLL_INTERVAL)).is_ok() {
                    drained += 1;
                    queue.metrics().drained_total.inc();
                    acknowledge(&queue, &label);
                }
            }
            queue.set_state(QueueState::Drained);
            debug!(
                queue = %label,
                drained, "purged all remaining elements from queue"
            );
            DrainOutcome { drained, producer }
        })
        .map_err(|source| QueueError::Spawn {
            name: name.to_string(),
            source,
        })?;
    Ok(DrainHandle {
        name: name.to_string(),
        handle,
    })
}

fn acknowledge<T>(queue: &BoundedQueue<T>, name: &str) {
    if let Err(err) = queue.task_done() {
        warn!(queue = name, error = %err, "unbalanced task_done while draining");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn marker_on_empty_queue_evicts_nothing() {
        let q: BoundedQueue<Message<u32>> = BoundedQueue::new(3).unwrap();
        let report = send_completion_marker(&q, "empty");
        assert_eq!(report.evicted, 0);
        assert_eq!(q.try_get().unwrap(), Message::Stop);
        assert_eq!(q.state(), QueueState::Closing);
    }

    #[test]
    fn marker_with_free_slot_keeps_items() {
        let q = BoundedQueue::new(3).unwrap();
        q.try_put(Message::Item(1u32)).unwrap();
        let report = send_completion_marker(&q, "partial");
        assert_eq!(report.evicted, 0);
        assert_eq!(q.try_get().unwrap(), Message::Item(1));
        assert_eq!(q.try_get().unwrap(), Message::Stop);
    }

    #[test]
    fn marker_works_with_option_payloads() {
        let q = BoundedQueue::new(1).unwrap();
        q.try_put(Some("frame")).unwrap();
        let report = send_completion_marker(&q, "option");
        assert_eq!(report.evicted, 1);
        assert_eq!(q.try_get().unwrap(), None);
    }

    #[test]
    fn drain_now_on_empty_queue_is_noop() {
        let q = BoundedQueue::<u32>::new(2).unwrap();
        assert_eq!(drain_now(&q, "noop"), 0);
        assert_eq!(q.state(), QueueState::Drained);
    }

    #[test]
    fn drain_without_producer_exits_once_empty() {
        let q = BoundedQueue::new(4).unwrap();
        q.try_put(1u32).unwrap();
        q.try_put(2u32).unwrap();
        let none: Option<std::thread::JoinHandle<()>> = None;
        let outcome = drain_until_producer_finishes(&q, "no-producer", none)
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(outcome.drained, 2);
        assert!(q.is_empty());
        assert_eq!(q.unfinished_tasks(), 0);
    }
}
