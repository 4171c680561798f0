use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Non-blocking "is the producer still running?" query, usable from another thread.
///
/// Must report `false` only once the producer can no longer push to the queue.
pub trait ProducerLiveness: Send + 'static {
    fn is_running(&self) -> bool;
}

impl<T: Send + 'static> ProducerLiveness for std::thread::JoinHandle<T> {
    fn is_running(&self) -> bool {
        !self.is_finished()
    }
}

impl<T: Send + 'static> ProducerLiveness for tokio::task::JoinHandle<T> {
    fn is_running(&self) -> bool {
        !self.is_finished()
    }
}

/// `None` means there is no producer to wait for.
impl<P: ProducerLiveness> ProducerLiveness for Option<P> {
    fn is_running(&self) -> bool {
        self.as_ref().is_some_and(ProducerLiveness::is_running)
    }
}

impl<P: ProducerLiveness + Sync> ProducerLiveness for Arc<P> {
    fn is_running(&self) -> bool {
        (**self).is_running()
    }
}

/// Shared liveness flag for producers that are not a dedicated thread or task
/// (e.g. a job on a pool). The producer holds the [`RunningGuard`]; dropping it, including
/// during a panic unwind, marks the producer finished.
#[derive(Debug, Clone)]
pub struct RunningFlag(Arc<AtomicBool>);

#[derive(Debug)]
pub struct RunningGuard(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new() -> (Self, RunningGuard) {
        let flag = Arc::new(AtomicBool::new(true));
        (Self(flag.clone()), RunningGuard(flag))
    }
}

impl ProducerLiveness for RunningFlag {
    fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
