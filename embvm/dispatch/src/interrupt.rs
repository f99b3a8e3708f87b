//! Interrupt queue: top half pushes, bottom half drains.
//!
//! The queue owns no thread. Code running in an interrupt top half pushes
//! operations inside a short critical section; a lock-permitting bottom-half
//! context later calls [`InterruptQueue::drain`] to run them in FIFO order.
//! An optional notifier runs after every push to wake that bottom half.
//!
//! Because it implements [`Dispatcher`], a bare-metal build can hand an
//! interrupt queue straight to the event center or the timer manager.
//!
//! This module is available without `std`. Every build must link exactly
//! one `critical-section` implementation: a target HAL usually provides it,
//! and hosted builds can enable the `critical-section-std` feature.

use alloc::boxed::Box;
use core::cell::RefCell;

use critical_section::Mutex;
use embvm_core::{
    CapacityError, Dispatcher, FuncOp, FunctionQueue, OpQueue, Operation, UnboundedQueue,
};

use crate::error::DispatchError;

type Notifier = Box<dyn Fn() + Send + Sync>;

/// Queue of deferred operations filled from interrupt context.
pub struct InterruptQueue<Q = UnboundedQueue<FuncOp>> {
    queue: Mutex<RefCell<FunctionQueue<Q>>>,
    notifier: Option<Notifier>,
}

impl InterruptQueue {
    pub fn new() -> Self {
        Self::with_queue(UnboundedQueue::new())
    }
}

impl Default for InterruptQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> InterruptQueue<Q>
where
    Q: OpQueue,
    Q::Item: Operation,
{
    pub fn with_queue(queue: Q) -> Self {
        Self {
            queue: Mutex::new(RefCell::new(FunctionQueue::with_queue(queue))),
            notifier: None,
        }
    }

    /// Installs a callback run after every successful push, typically used to
    /// signal the bottom-half thread or raise a software interrupt.
    pub fn with_notifier<F>(mut self, notifier: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier = Some(Box::new(notifier));
        self
    }

    /// Defers `f` to the bottom half.
    ///
    /// # Panics
    ///
    /// Panics if a fixed-capacity queue is full.
    pub fn push<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(err) = self.try_push(f) {
            panic!("interrupt queue: {err}");
        }
    }

    pub fn try_push<F>(&self, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        let op = <Q::Item as Operation>::from_fn(f);
        let rejected = critical_section::with(|cs| {
            let mut queue = self.queue.borrow_ref_mut(cs);
            let capacity = queue.capacity().unwrap_or(0);
            queue.try_push_op(op).map_err(|op| (op, capacity))
        });

        match rejected {
            Ok(()) => {
                if let Some(notify) = &self.notifier {
                    notify();
                }
                Ok(())
            }
            Err((_op, capacity)) => Err(DispatchError::QueueFull(CapacityError::new(
                "interrupt queue",
                capacity,
            ))),
        }
    }

    /// Runs every pending operation in FIFO order and returns how many ran.
    ///
    /// The critical section covers only each pop, so operations may push
    /// more work; that work runs in the same call.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        while let Some(op) = critical_section::with(|cs| self.queue.borrow_ref_mut(cs).pop()) {
            op.run();
            ran += 1;
        }
        ran
    }

    /// Number of operations waiting for the bottom half.
    pub fn pending(&self) -> usize {
        critical_section::with(|cs| self.queue.borrow_ref(cs).len())
    }
}

impl<Q> Dispatcher for InterruptQueue<Q>
where
    Q: OpQueue + Send,
    Q::Item: Operation,
{
    fn dispatch<F>(&self, op: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(op)
    }
}
