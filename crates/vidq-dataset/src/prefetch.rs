//! Background sample loading over a bounded queue.
//!
//! A producer thread walks the dataset and pushes `Message::Item(sample)` into a
//! [`BoundedQueue`], ending with `Message::Stop`. The consumer side is an iterator. Stopping
//! early raises a flag and drains the queue until the producer exits, so a producer blocked
//! on a full queue can never deadlock shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, warn};

use vidq_observe::metrics::Counter;
use vidq_queue::liveness::ProducerLiveness;
use vidq_queue::queue::{BoundedQueue, QueueFull};
use vidq_queue::shutdown::{drain_now, drain_until_producer_finishes, send_completion_marker};
use vidq_queue::types::Message;

use crate::dataset::{PairedClip, PairedClipDataset};
use crate::error::DatasetError;

const PUT_POLL: Duration = Duration::from_millis(20);

type SampleQueue = BoundedQueue<Message<Result<PairedClip, DatasetError>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchConfig {
    /// Samples buffered ahead of the consumer.
    pub capacity: usize,
    pub shuffle: bool,
    pub seed: Option<u64>,
    /// Diagnostic queue name used in log events.
    pub name: String,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            shuffle: false,
            seed: None,
            name: "clip-prefetch".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Samples produced but never handed to the consumer. End-of-stream markers are not counted.
    pub discarded: u64,
}

#[derive(Debug)]
pub struct ClipPrefetcher {
    name: String,
    queue: SampleQueue,
    stop: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
    /// Samples the producer managed to enqueue.
    produced: Arc<Counter>,
    /// Samples handed to the consumer or already reported as discarded.
    accounted: u64,
    exhausted: bool,
}

impl ClipPrefetcher {
    pub fn spawn(dataset: Arc<PairedClipDataset>, cfg: PrefetchConfig) -> Result<Self, DatasetError> {
        let queue: SampleQueue = BoundedQueue::new(cfg.capacity)?;
        let stop = Arc::new(AtomicBool::new(false));
        let produced = Arc::new(Counter::default());

        let mut order: Vec<usize> = (0..dataset.len()).collect();
        if cfg.shuffle {
            let mut rng = match cfg.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            order.shuffle(&mut rng);
        }

        let producer = {
            let queue = queue.clone();
            let stop = stop.clone();
            let produced = produced.clone();
            let name = cfg.name.clone();
            thread::Builder::new()
                .name(format!("{}-producer", cfg.name))
                .spawn(move || produce(&dataset, &order, &queue, &stop, &produced, &name))?
        };

        Ok(Self {
            name: cfg.name,
            queue,
            stop,
            producer: Some(producer),
            produced,
            accounted: 0,
            exhausted: false,
        })
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Stops the producer and discards anything still queued.
    ///
    /// Idempotent. Safe to call while the producer is blocked on a full queue.
    pub fn shutdown(&mut self) -> Result<ShutdownReport, DatasetError> {
        self.stop.store(true, Ordering::Release);
        self.exhausted = true;
        let mut drained = 0u64;
        if let Some(producer) = self.producer.take() {
            let outcome = drain_until_producer_finishes(&self.queue, &self.name, producer)?.join()?;
            drained += outcome.drained;
            outcome
                .producer
                .join()
                .map_err(|_| DatasetError::ProducerPanicked)?;
        }
        drained += drain_now(&self.queue, &self.name);

        // `drained` includes the end-of-stream marker and misses marker evictions; only
        // samples count towards `discarded`.
        let produced = self.produced.get();
        let discarded = produced.saturating_sub(self.accounted);
        self.accounted = produced;
        debug!(queue = %self.name, drained, discarded, "prefetcher shut down");
        Ok(ShutdownReport { discarded })
    }

    fn producer_running(&self) -> bool {
        self.producer.is_running()
    }
}

impl Iterator for ClipPrefetcher {
    type Item = Result<PairedClip, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted {
            match self.queue.get(Some(PUT_POLL)) {
                Ok(message) => {
                    self.queue.task_done().ok();
                    match message {
                        Message::Item(sample) => {
                            self.accounted += 1;
                            return Some(sample);
                        }
                        Message::Stop => self.exhausted = true,
                    }
                }
                Err(_) => {
                    // A producer that died without its marker must not hang the consumer.
                    if !self.producer_running() && self.queue.is_empty() {
                        self.exhausted = true;
                        if let Some(producer) = self.producer.take() {
                            if producer.join().is_err() {
                                return Some(Err(DatasetError::ProducerPanicked));
                            }
                        }
                    }
                }
            }
        }
        None
    }
}

impl Drop for ClipPrefetcher {
    fn drop(&mut self) {
        if self.producer.is_some() {
            if let Err(err) = self.shutdown() {
                warn!(queue = %self.name, error = %err, "prefetcher shutdown failed");
            }
        }
    }
}

fn produce(
    dataset: &PairedClipDataset,
    order: &[usize],
    queue: &SampleQueue,
    stop: &AtomicBool,
    produced: &Counter,
    name: &str,
) {
    for &index in order {
        if stop.load(Ordering::Acquire) {
            break;
        }
        let sample = dataset.get(index);
        if let Err(err) = &sample {
            warn!(queue = name, index, error = %err, "failed to load sample");
        }
        if !put_until_stopped(queue, Message::Item(sample), stop) {
            break;
        }
        produced.inc();
    }

    if stop.load(Ordering::Acquire) {
        // Stopping: the consumer is gone, so make room for the marker if needed.
        send_completion_marker(queue, name);
    } else if !put_until_stopped(queue, Message::Stop, stop) {
        send_completion_marker(queue, name);
    }
}

/// Blocking put that gives up once `stop` is raised. Returns whether the message was queued.
fn put_until_stopped<T>(queue: &BoundedQueue<T>, mut message: T, stop: &AtomicBool) -> bool {
    loop {
        match queue.put(message, Some(PUT_POLL)) {
            Ok(()) => return true,
            Err(QueueFull(returned)) => {
                if stop.load(Ordering::Acquire) {
                    return false;
                }
                message = returned;
            }
        }
    }
}
