//! Active object: exclusive single-threaded ownership of state.
//!
//! The owner implements [`Process`]; the active object moves it onto a
//! dedicated worker thread and feeds it items from a FIFO. Other threads only
//! ever see the thread-safe [`ActiveObject::enqueue`] API, which makes it
//! easy to turn a blocking driver call (a bus transfer, say) into an
//! asynchronous one without touching the driver's threading model.

use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::JoinHandle;

use embvm_core::{OpQueue, UnboundedQueue};
use parking_lot::Mutex;

use crate::config::ActiveObjectConfig;
use crate::error::DispatchError;
use crate::worker::{join_workers, spawn_worker, WorkQueue};

/// Behaviour executed by an active object's worker thread.
pub trait Process: Send + 'static {
    type Item: Send + 'static;

    /// Handles one queued item. Runs on the worker thread only.
    fn process(&mut self, item: Self::Item);

    /// Runs on the worker thread before the first item.
    fn on_start(&mut self) {}

    /// Runs on the worker thread after shutdown was requested.
    fn on_stop(&mut self) {}
}

/// A single dedicated worker draining one typed FIFO.
pub struct ActiveObject<P, Q = UnboundedQueue<<P as Process>::Item>>
where
    P: Process,
    Q: OpQueue<Item = P::Item>,
{
    name: String,
    shared: Arc<WorkQueue<Q>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// The processor lives on the worker thread; only its type stays here.
    _process: PhantomData<fn(P)>,
}

impl<P: Process> ActiveObject<P, UnboundedQueue<P::Item>> {
    /// Starts an active object with an unbounded queue.
    pub fn new(processor: P) -> Self {
        Self::with_config(ActiveObjectConfig::default(), processor)
    }

    pub fn with_config(config: ActiveObjectConfig, processor: P) -> Self {
        Self::with_queue(config, processor, UnboundedQueue::new())
    }
}

impl<P, Q> ActiveObject<P, Q>
where
    P: Process,
    Q: OpQueue<Item = P::Item> + Send + 'static,
{
    /// Starts an active object over a caller-chosen queue.
    pub fn with_queue(config: ActiveObjectConfig, mut processor: P, queue: Q) -> Self {
        let shared = Arc::new(WorkQueue::new(queue));
        let worker = {
            let shared = Arc::clone(&shared);
            spawn_worker(config.name.clone(), config.stack_size, move || {
                processor.on_start();
                while let Some(item) = shared.next() {
                    processor.process(item);
                }
                processor.on_stop();
            })
        };

        log::debug!("active object '{}' started", config.name);

        Self {
            name: config.name,
            shared,
            worker: Mutex::new(Some(worker)),
            _process: PhantomData,
        }
    }

    /// Queues `item` for the worker.
    ///
    /// # Panics
    ///
    /// Panics if a fixed-capacity queue is full. Items enqueued after
    /// [`shutdown`](Self::shutdown) are dropped with a warning.
    pub fn enqueue(&self, item: P::Item) {
        match self.try_enqueue(item) {
            Ok(()) => {}
            Err(DispatchError::ShutDown) => {
                log::warn!("active object '{}': item enqueued after shutdown dropped", self.name);
            }
            Err(err) => panic!("active object '{}': {err}", self.name),
        }
    }

    pub fn try_enqueue(&self, item: P::Item) -> Result<(), DispatchError> {
        self.shared.push(item)
    }

    /// Number of items waiting for the worker.
    pub fn queued_count(&self) -> usize {
        self.shared.len()
    }

    pub fn is_running(&self) -> bool {
        !self.shared.is_closed()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the worker and joins it. Pending items are dropped unprocessed.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        if !self.shared.close() {
            return;
        }
        if let Some(worker) = self.worker.lock().take() {
            join_workers(&self.name, vec![worker]);
        }
        let discarded = self.shared.discard_pending();
        log::debug!(
            "active object '{}' stopped, {discarded} pending item(s) dropped",
            self.name
        );
    }
}

impl<P, Q> Drop for ActiveObject<P, Q>
where
    P: Process,
    Q: OpQueue<Item = P::Item>,
{
    fn drop(&mut self) {
        if self.shared.close() {
            if let Some(worker) = self.worker.get_mut().take() {
                join_workers(&self.name, vec![worker]);
            }
            self.shared.discard_pending();
            log::debug!("active object '{}' stopped", self.name);
        }
    }
}
