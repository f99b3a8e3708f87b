//! Dispatch queue: a worker pool draining one shared FIFO.
//!
//! `dispatch` appends an operation and wakes exactly one idle worker. Each
//! worker pops one operation under the lock, releases the lock and runs it.
//! A single worker therefore executes operations in submission order; with
//! several workers only the hand-off order is FIFO.
//!
//! Dropping the queue signals quit, wakes every worker and joins them.
//! Operations still queued at that point are dropped without running.

use std::sync::Arc;
use std::thread::JoinHandle;

use embvm_core::{Dispatcher, FuncOp, OpQueue, Operation, UnboundedQueue};

use crate::config::DispatchQueueConfig;
use crate::error::DispatchError;
use crate::worker::{join_workers, spawn_worker, WorkQueue};

/// A pool of worker threads draining one FIFO of operations.
///
/// `Q` selects the memory model: the default [`UnboundedQueue`] of boxed
/// [`FuncOp`]s grows on demand, a `BoundedQueue<InlineOp<W>, N>` never
/// allocates and treats overflow as a configuration error.
pub struct DispatchQueue<Q = UnboundedQueue<FuncOp>>
where
    Q: OpQueue,
{
    name: String,
    shared: Arc<WorkQueue<Q>>,
    workers: Vec<JoinHandle<()>>,
}

impl DispatchQueue {
    /// Creates an unbounded queue served by `threads` workers.
    pub fn new(threads: usize) -> Self {
        Self::with_config(DispatchQueueConfig::builder().threads(threads).build())
    }

    pub fn with_config(config: DispatchQueueConfig) -> Self {
        Self::with_queue(config, UnboundedQueue::new())
    }
}

impl<Q> DispatchQueue<Q>
where
    Q: OpQueue + Send + 'static,
    Q::Item: Operation,
{
    /// Creates a dispatch queue over a caller-chosen queue.
    ///
    /// # Panics
    ///
    /// Panics if `config.threads` is zero or a worker cannot be spawned.
    pub fn with_queue(config: DispatchQueueConfig, queue: Q) -> Self {
        assert!(config.threads > 0, "dispatch queue needs at least one worker");

        let shared = Arc::new(WorkQueue::new(queue));
        let workers = (0..config.threads)
            .map(|index| {
                let shared = Arc::clone(&shared);
                spawn_worker(
                    format!("{}-{index}", config.name),
                    config.stack_size,
                    move || worker_loop(&shared),
                )
            })
            .collect();

        log::debug!(
            "dispatch queue '{}' started with {} worker(s)",
            config.name,
            config.threads
        );

        Self {
            name: config.name,
            shared,
            workers,
        }
    }

    /// Queues `op` for execution on one of the workers.
    ///
    /// # Panics
    ///
    /// Panics if a fixed-capacity queue is full.
    pub fn dispatch<F>(&self, op: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(err) = self.try_dispatch(op) {
            panic!("dispatch queue '{}': {err}", self.name);
        }
    }

    /// Queues `op`, reporting a full queue instead of panicking.
    pub fn try_dispatch<F>(&self, op: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        log::trace!("dispatch queue '{}': dispatch", self.name);
        self.shared.push(<Q::Item as Operation>::from_fn(op))
    }

    /// Number of operations waiting for a worker.
    pub fn queue_size(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue_size() == 0
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Fixed capacity, or `None` for unbounded queues.
    pub fn capacity(&self) -> Option<usize> {
        self.shared.capacity()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn worker_loop<Q>(shared: &WorkQueue<Q>)
where
    Q: OpQueue,
    Q::Item: Operation,
{
    while let Some(op) = shared.next() {
        op.run();
    }
}

impl<Q> Dispatcher for DispatchQueue<Q>
where
    Q: OpQueue + Send + 'static,
    Q::Item: Operation,
{
    fn dispatch<F>(&self, op: F)
    where
        F: FnOnce() + Send + 'static,
    {
        DispatchQueue::dispatch(self, op)
    }
}

impl<Q> Drop for DispatchQueue<Q>
where
    Q: OpQueue,
{
    fn drop(&mut self) {
        self.shared.close();
        join_workers(&self.name, std::mem::take(&mut self.workers));
        let discarded = self.shared.discard_pending();
        log::debug!(
            "dispatch queue '{}' stopped, {discarded} pending operation(s) dropped",
            self.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn single_worker_preserves_submission_order() {
        let queue = DispatchQueue::new(1);
        let (tx, rx) = mpsc::channel();

        for i in 0..100 {
            let tx = tx.clone();
            queue.dispatch(move || tx.send(i).unwrap());
        }

        let order: Vec<i32> = (0..100)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(order, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn workers_are_named_after_queue() {
        let queue = DispatchQueue::with_config(
            DispatchQueueConfig::builder().name("bus").threads(2).build(),
        );
        let (tx, rx) = mpsc::channel();
        queue.dispatch(move || {
            tx.send(std::thread::current().name().map(str::to_owned))
                .unwrap()
        });

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(name == "bus-0" || name == "bus-1", "unexpected worker {name}");
        assert_eq!(queue.thread_count(), 2);
        assert_eq!(queue.name(), "bus");
    }

    #[test]
    #[should_panic(expected = "at least one worker")]
    fn zero_workers_is_rejected() {
        let _ = DispatchQueue::new(0);
    }
}
