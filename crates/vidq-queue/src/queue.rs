use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use thiserror::Error;

use vidq_observe::metrics::{Counter, Gauge};

use crate::types::QueueState;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue capacity must be > 0")]
    ZeroCapacity,
    #[error("task_done() called more times than there were items")]
    TaskDoneUnderflow,
    #[error("failed to spawn drain thread for queue {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("drain thread for queue {0} panicked")]
    DrainPanicked(String),
}

/// Returned by [`BoundedQueue::try_put`] when the queue is at capacity. Hands the item back.
pub struct QueueFull<T>(pub T);

impl<T> QueueFull<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueFull(..)")
    }
}

impl<T> fmt::Display for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is full")
    }
}

impl<T> std::error::Error for QueueFull<T> {}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("queue is empty")]
pub struct QueueEmpty;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("timed out waiting for a queue item")]
pub struct QueueTimeout;

#[derive(Debug, Default)]
pub struct QueueMetrics {
    pub put_total: Counter,
    pub get_total: Counter,
    pub task_done_total: Counter,
    /// Items discarded to make room for an end-of-stream marker.
    pub evicted_total: Counter,
    /// Items discarded by drain operations.
    pub drained_total: Counter,
    pub depth_high_water: Gauge,
}

struct Inner<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
    unfinished: Mutex<u64>,
    all_done: Condvar,
    state: AtomicU8,
    metrics: QueueMetrics,
}

/// Bounded, thread-safe FIFO shared by producers and consumers.
///
/// Cloning yields another handle to the same queue. Every successful `try_put`/`put` counts as
/// an unfinished task until a consumer pairs its `get` with [`BoundedQueue::task_done`];
/// [`BoundedQueue::join`] waits for that count to reach zero.
///
/// Both channel ends live inside the shared state, so the channel never disconnects while any
/// handle exists.
pub struct BoundedQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.inner.capacity)
            .field("len", &self.inner.rx.len())
            .field("state", &self.state())
            .finish()
    }
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Ok(Self {
            inner: Arc::new(Inner {
                tx,
                rx,
                capacity,
                unfinished: Mutex::new(0),
                all_done: Condvar::new(),
                state: AtomicU8::new(QueueState::Open.as_u8()),
                metrics: QueueMetrics::default(),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.rx.is_empty()
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.inner.metrics
    }

    pub fn state(&self) -> QueueState {
        QueueState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: QueueState) {
        self.inner.state.store(state.as_u8(), Ordering::Release);
    }

    /// Items pushed but not yet acknowledged with `task_done`.
    pub fn unfinished_tasks(&self) -> u64 {
        *self.lock_unfinished()
    }

    /// Non-blocking push. Returns the item inside [`QueueFull`] if there is no free slot.
    pub fn try_put(&self, item: T) -> Result<(), QueueFull<T>> {
        self.begin_task();
        match self.inner.tx.try_send(item) {
            Ok(()) => {
                self.on_put();
                Ok(())
            }
            // Disconnected cannot happen (see type docs); treat it like Full so the
            // caller still gets the item back.
            Err(TrySendError::Full(item)) | Err(TrySendError::Disconnected(item)) => {
                self.cancel_task();
                Err(QueueFull(item))
            }
        }
    }

    /// Blocking push. With `Some(timeout)` gives the item back if no slot frees up in time.
    pub fn put(&self, item: T, timeout: Option<Duration>) -> Result<(), QueueFull<T>> {
        self.begin_task();
        let sent = match timeout {
            None => self.inner.tx.send(item).map_err(|e| e.into_inner()),
            Some(timeout) => self
                .inner
                .tx
                .send_timeout(item, timeout)
                .map_err(|e| e.into_inner()),
        };
        match sent {
            Ok(()) => {
                self.on_put();
                Ok(())
            }
            Err(item) => {
                self.cancel_task();
                Err(QueueFull(item))
            }
        }
    }

    /// Non-blocking pop.
    pub fn try_get(&self) -> Result<T, QueueEmpty> {
        match self.inner.rx.try_recv() {
            Ok(item) => {
                self.inner.metrics.get_total.inc();
                Ok(item)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Err(QueueEmpty),
        }
    }

    /// Blocking pop; `None` waits indefinitely.
    pub fn get(&self, timeout: Option<Duration>) -> Result<T, QueueTimeout> {
        let received = match timeout {
            None => self.inner.rx.recv().map_err(|_| QueueTimeout),
            Some(timeout) => self.inner.rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected => QueueTimeout,
            }),
        };
        if received.is_ok() {
            self.inner.metrics.get_total.inc();
        }
        received
    }

    /// Acknowledges that an item obtained from `get`/`try_get` has been fully processed.
    pub fn task_done(&self) -> Result<(), QueueError> {
        let mut unfinished = self.lock_unfinished();
        if *unfinished == 0 {
            return Err(QueueError::TaskDoneUnderflow);
        }
        *unfinished -= 1;
        self.inner.metrics.task_done_total.inc();
        if *unfinished == 0 {
            self.inner.all_done.notify_all();
        }
        Ok(())
    }

    /// Blocks until every pushed item has been acknowledged with `task_done`.
    pub fn join(&self) {
        let mut unfinished = self.lock_unfinished();
        while *unfinished > 0 {
            unfinished = self
                .inner
                .all_done
                .wait(unfinished)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`BoundedQueue::join`] with a deadline. Returns `true` if all tasks completed.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut unfinished = self.lock_unfinished();
        while *unfinished > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .all_done
                .wait_timeout(unfinished, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            unfinished = guard;
        }
        true
    }

    fn lock_unfinished(&self) -> MutexGuard<'_, u64> {
        self.inner
            .unfinished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // Counted before the send so a fast consumer's task_done never sees zero.
    fn begin_task(&self) {
        *self.lock_unfinished() += 1;
    }

    fn cancel_task(&self) {
        let mut unfinished = self.lock_unfinished();
        *unfinished = unfinished.saturating_sub(1);
        if *unfinished == 0 {
            self.inner.all_done.notify_all();
        }
    }

    fn on_put(&self) {
        self.inner.metrics.put_total.inc();
        self.inner
            .metrics
            .depth_high_water
            .max(u64::try_from(self.len()).unwrap_or(u64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            BoundedQueue::<u32>::new(0),
            Err(QueueError::ZeroCapacity)
        ));
    }

    #[test]
    fn try_put_reports_full_and_returns_item() {
        let q = BoundedQueue::new(1).unwrap();
        q.try_put(1u32).unwrap();
        let err = q.try_put(2u32).unwrap_err();
        assert_eq!(err.into_inner(), 2);
        assert_eq!(q.len(), 1);
        assert_eq!(q.unfinished_tasks(), 1);
    }

    #[test]
    fn try_get_on_empty_queue() {
        let q = BoundedQueue::<u32>::new(2).unwrap();
        assert_eq!(q.try_get(), Err(QueueEmpty));
    }

    #[test]
    fn get_times_out_on_empty_queue() {
        let q = BoundedQueue::<u32>::new(2).unwrap();
        let started = Instant::now();
        assert_eq!(q.get(Some(Duration::from_millis(10))), Err(QueueTimeout));
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn fifo_order_is_preserved() {
        let q = BoundedQueue::new(3).unwrap();
        for i in 0..3u32 {
            q.try_put(i).unwrap();
        }
        let got: Vec<u32> = (0..3).map(|_| q.try_get().unwrap()).collect();
        assert_eq!(got, vec![0, 1, 2]);
    }

    #[test]
    fn task_done_underflow_is_an_error() {
        let q = BoundedQueue::<u32>::new(1).unwrap();
        assert!(matches!(q.task_done(), Err(QueueError::TaskDoneUnderflow)));
    }

    #[test]
    fn join_returns_once_all_items_are_acknowledged() {
        let q = BoundedQueue::new(4).unwrap();
        q.try_put(1u32).unwrap();
        q.try_put(2u32).unwrap();
        assert!(!q.join_timeout(Duration::from_millis(5)));

        let consumer = {
            let q = q.clone();
            std::thread::spawn(move || {
                while q.try_get().is_ok() {
                    q.task_done().unwrap();
                }
            })
        };
        q.join();
        consumer.join().unwrap();
        assert_eq!(q.unfinished_tasks(), 0);
        assert_eq!(q.metrics().task_done_total.get(), 2);
    }

    #[test]
    fn high_water_tracks_peak_depth() {
        let q = BoundedQueue::new(4).unwrap();
        q.try_put(1u32).unwrap();
        q.try_put(2u32).unwrap();
        q.try_get().unwrap();
        q.try_put(3u32).unwrap();
        assert_eq!(q.metrics().depth_high_water.get(), 2);
        assert_eq!(q.metrics().put_total.get(), 3);
    }
}
