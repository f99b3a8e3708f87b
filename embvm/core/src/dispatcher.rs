//! The dispatcher contract.
//!
//! The event center and the timer manager decide *when* a callback is due but
//! never *where* it runs. They hand every callback to a [`Dispatcher`], which
//! may run it on the spot, queue it for a worker pool, or push it to an
//! interrupt bottom half.

use alloc::boxed::Box;
use alloc::sync::Arc;

use crate::func::FuncOp;

/// Accepts a callable and arranges for its execution.
///
/// Implementations must be callable from any thread and may run `op` either
/// synchronously or asynchronously.
pub trait Dispatcher: Send + Sync {
    fn dispatch<F>(&self, op: F)
    where
        F: FnOnce() + Send + 'static;
}

/// Runs every operation immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    #[inline]
    fn dispatch<F>(&self, op: F)
    where
        F: FnOnce() + Send + 'static,
    {
        op()
    }
}

/// Adapts a plain function taking boxed operations into a [`Dispatcher`].
///
/// ```
/// use embvm_core::{Dispatcher, FnDispatcher, FuncOp};
///
/// let dispatcher = FnDispatcher(|op: FuncOp| op());
/// dispatcher.dispatch(|| println!("ran inline"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FnDispatcher<F>(pub F);

impl<F> Dispatcher for FnDispatcher<F>
where
    F: Fn(FuncOp) + Send + Sync,
{
    fn dispatch<O>(&self, op: O)
    where
        O: FnOnce() + Send + 'static,
    {
        (self.0)(Box::new(op))
    }
}

impl<D: Dispatcher> Dispatcher for Arc<D> {
    #[inline]
    fn dispatch<F>(&self, op: F)
    where
        F: FnOnce() + Send + 'static,
    {
        (**self).dispatch(op)
    }
}

impl<D: Dispatcher> Dispatcher for &D {
    #[inline]
    fn dispatch<F>(&self, op: F)
    where
        F: FnOnce() + Send + 'static,
    {
        (**self).dispatch(op)
    }
}
