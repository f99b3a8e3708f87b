//! Worker queue shared by the dispatch queue and the active object.

use std::thread::{self, JoinHandle};

use embvm_core::OpQueue;
use parking_lot::{Condvar, Mutex};

use crate::error::DispatchError;

struct State<Q> {
    queue: Q,
    quit: bool,
}

/// A FIFO guarded by one mutex, with a condition variable waking consumers.
pub(crate) struct WorkQueue<Q> {
    state: Mutex<State<Q>>,
    available: Condvar,
}

impl<Q: OpQueue> WorkQueue<Q> {
    pub(crate) fn new(queue: Q) -> Self {
        Self {
            state: Mutex::new(State { queue, quit: false }),
            available: Condvar::new(),
        }
    }

    /// Appends an item and wakes exactly one waiting consumer.
    pub(crate) fn push(&self, item: Q::Item) -> Result<(), DispatchError> {
        let mut state = self.state.lock();
        if state.quit {
            return Err(DispatchError::ShutDown);
        }
        if let Err(rejected) = state.queue.push_back(item) {
            let err = state.queue.full_error();
            drop(state);
            drop(rejected);
            return Err(DispatchError::QueueFull(err));
        }
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Blocks until an item is available. Returns `None` once the queue is
    /// closed, even if items are still pending.
    pub(crate) fn next(&self) -> Option<Q::Item> {
        let mut state = self.state.lock();
        loop {
            if state.quit {
                return None;
            }
            if let Some(item) = state.queue.pop_front() {
                return Some(item);
            }
            self.available.wait(&mut state);
        }
    }

    /// Signals quit to every consumer. Returns `false` if already closed.
    pub(crate) fn close(&self) -> bool {
        let mut state = self.state.lock();
        let was_open = !state.quit;
        state.quit = true;
        drop(state);
        self.available.notify_all();
        was_open
    }

    /// Drops every pending item outside the lock, so item destructors may
    /// touch the queue again. Returns how many were discarded.
    pub(crate) fn discard_pending(&self) -> usize {
        let mut discarded = 0;
        loop {
            let item = self.state.lock().queue.pop_front();
            match item {
                Some(item) => {
                    drop(item);
                    discarded += 1;
                }
                None => return discarded,
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub(crate) fn capacity(&self) -> Option<usize> {
        self.state.lock().queue.capacity()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().quit
    }
}

/// Spawns a named worker thread.
///
/// # Panics
///
/// Panics if the platform cannot create the thread.
pub(crate) fn spawn_worker<F>(name: String, stack_size: Option<usize>, body: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    let mut builder = thread::Builder::new().name(name.clone());
    if let Some(size) = stack_size {
        builder = builder.stack_size(size);
    }
    builder
        .spawn(body)
        .unwrap_or_else(|err| panic!("failed to spawn worker thread {name}: {err}"))
}

/// Joins workers, skipping the calling thread if it is one of them.
pub(crate) fn join_workers(name: &str, workers: Vec<JoinHandle<()>>) {
    let current = thread::current().id();
    for worker in workers {
        if worker.thread().id() == current {
            log::warn!("{name}: torn down from its own worker, leaving it to exit on its own");
            continue;
        }
        let worker_name = worker.thread().name().unwrap_or("<unnamed>").to_owned();
        if worker.join().is_err() {
            log::error!("{name}: worker {worker_name} terminated by a panicking operation");
        }
    }
}
