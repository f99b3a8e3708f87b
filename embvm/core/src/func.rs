//! Function queue: type-erased storage for callables.
//!
//! Two representations are offered behind the [`Operation`] trait:
//!
//! - [`FuncOp`] boxes the closure. Any size works, every operation costs one
//!   heap allocation.
//! - [`InlineOp`] copies the closure into a fixed, word-aligned slot. Put
//!   into a [`BoundedQueue`] it forms a pool of `N` identical slots that
//!   closures of different sizes share without ever touching the heap.
//!
//! Registered callbacks (event subscribers, timer expiries) run many times
//! and are copied out of their registry before they run. They use the
//! [`Callback`] trait, implemented by [`SharedFn`] on the heap and by
//! [`InlineFn`] in a fixed slot.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::marker::PhantomData;
use core::mem::{self, ManuallyDrop, MaybeUninit};
use core::ptr;

use crate::error::CapacityError;
use crate::queue::{BoundedQueue, OpQueue, UnboundedQueue};

/// A type-erased, run-once callable.
pub trait Operation: Send + 'static {
    fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static;

    /// Consumes and runs the operation.
    fn run(self);
}

/// Heap-allocated operation.
pub type FuncOp = Box<dyn FnOnce() + Send + 'static>;

impl Operation for FuncOp {
    fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Box::new(f)
    }

    fn run(self) {
        self()
    }
}

/// Operation stored inline in `WORDS` machine words.
///
/// Closures must fit in `WORDS * size_of::<usize>()` bytes and need no more
/// than word alignment. Building an `InlineOp` from a closure that violates
/// either bound panics: slot sizes are fixed at compile time, so this is a
/// configuration error.
pub struct InlineOp<const WORDS: usize = 6> {
    storage: MaybeUninit<[usize; WORDS]>,
    call: unsafe fn(*mut u8),
    drop: unsafe fn(*mut u8),
    // The closure type is erased, so keep the op !Sync.
    _marker: PhantomData<*mut ()>,
}

// SAFETY: `InlineOp::new` only accepts `Send` closures.
unsafe impl<const WORDS: usize> Send for InlineOp<WORDS> {}

impl<const WORDS: usize> InlineOp<WORDS> {
    /// Slot size in bytes.
    pub const SIZE: usize = mem::size_of::<[usize; WORDS]>();

    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        assert_fits::<F, WORDS>();

        let mut storage = MaybeUninit::<[usize; WORDS]>::uninit();
        // SAFETY: size and alignment were checked above; the slot is
        // uninitialized, so nothing is overwritten.
        unsafe { ptr::write(storage.as_mut_ptr().cast::<F>(), f) };

        Self {
            storage,
            call: call_erased::<F>,
            drop: drop_erased::<F>,
            _marker: PhantomData,
        }
    }

    /// Consumes the operation and runs the stored closure.
    pub fn call(self) {
        let mut this = ManuallyDrop::new(self);
        let slot = this.storage.as_mut_ptr().cast::<u8>();
        // SAFETY: the slot holds a live closure of the type `call` was
        // instantiated with, and `ManuallyDrop` keeps `Drop` from touching
        // it again after it has been moved out.
        unsafe { (this.call)(slot) }
    }
}

impl<const WORDS: usize> Drop for InlineOp<WORDS> {
    fn drop(&mut self) {
        let slot = self.storage.as_mut_ptr().cast::<u8>();
        // SAFETY: an `InlineOp` that was never called still owns its closure.
        unsafe { (self.drop)(slot) }
    }
}

impl<const WORDS: usize> Operation for InlineOp<WORDS> {
    fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::new(f)
    }

    fn run(self) {
        self.call()
    }
}

unsafe fn call_erased<F: FnOnce()>(slot: *mut u8) {
    // SAFETY: caller guarantees `slot` holds an initialized `F`.
    let f = unsafe { ptr::read(slot.cast::<F>()) };
    f()
}

unsafe fn drop_erased<F>(slot: *mut u8) {
    // SAFETY: caller guarantees `slot` holds an initialized `F`.
    unsafe { ptr::drop_in_place(slot.cast::<F>()) }
}

fn assert_fits<F, const WORDS: usize>() {
    let size = mem::size_of::<[usize; WORDS]>();
    assert!(
        mem::size_of::<F>() <= size,
        "closure of {} bytes does not fit an inline slot of {} bytes",
        mem::size_of::<F>(),
        size
    );
    assert!(
        mem::align_of::<F>() <= mem::align_of::<[usize; WORDS]>(),
        "closure alignment {} exceeds inline slot alignment",
        mem::align_of::<F>()
    );
}

/// A shared, repeatable callable taking `&A`.
///
/// Cloning a callback must not allocate: registries copy callbacks out under
/// their lock and run the copies after releasing it.
pub trait Callback<A: ?Sized>: Clone + Send + Sync + 'static {
    fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&A) + Clone + Send + Sync + 'static;

    fn call(&self, arg: &A);
}

/// Heap-allocated callback, shared by reference count.
pub type SharedFn<A> = Arc<dyn Fn(&A) + Send + Sync>;

impl<A: ?Sized + 'static> Callback<A> for SharedFn<A> {
    fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&A) + Clone + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    fn call(&self, arg: &A) {
        (**self)(arg)
    }
}

/// Callback stored inline in `WORDS` machine words.
///
/// The same size and alignment rules as [`InlineOp`] apply. Cloning copies
/// the closure into a fresh slot by calling its `Clone` impl, so a callback
/// capturing an `Arc` costs a reference count and never an allocation.
pub struct InlineFn<A: ?Sized, const WORDS: usize = 4> {
    storage: MaybeUninit<[usize; WORDS]>,
    call: unsafe fn(*const u8, &A),
    clone: unsafe fn(*const u8, *mut u8),
    drop: unsafe fn(*mut u8),
    _marker: PhantomData<fn(&A)>,
}

impl<A: ?Sized, const WORDS: usize> InlineFn<A, WORDS> {
    /// Slot size in bytes.
    pub const SIZE: usize = mem::size_of::<[usize; WORDS]>();

    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&A) + Clone + Send + Sync + 'static,
    {
        assert_fits::<F, WORDS>();

        let mut storage = MaybeUninit::<[usize; WORDS]>::uninit();
        // SAFETY: size and alignment were checked above.
        unsafe { ptr::write(storage.as_mut_ptr().cast::<F>(), f) };

        Self {
            storage,
            call: call_shared::<F, A>,
            clone: clone_erased::<F>,
            drop: drop_erased::<F>,
            _marker: PhantomData,
        }
    }

    pub fn call(&self, arg: &A) {
        // SAFETY: the slot holds a live closure of the type `call` was
        // instantiated with.
        unsafe { (self.call)(self.storage.as_ptr().cast::<u8>(), arg) }
    }
}

impl<A: ?Sized, const WORDS: usize> Clone for InlineFn<A, WORDS> {
    fn clone(&self) -> Self {
        let mut storage = MaybeUninit::<[usize; WORDS]>::uninit();
        // SAFETY: the source slot holds a live closure; the destination has
        // the same size and alignment and is uninitialized.
        unsafe {
            (self.clone)(
                self.storage.as_ptr().cast::<u8>(),
                storage.as_mut_ptr().cast::<u8>(),
            )
        };
        Self {
            storage,
            call: self.call,
            clone: self.clone,
            drop: self.drop,
            _marker: PhantomData,
        }
    }
}

impl<A: ?Sized, const WORDS: usize> Drop for InlineFn<A, WORDS> {
    fn drop(&mut self) {
        // SAFETY: the slot holds a live closure until now.
        unsafe { (self.drop)(self.storage.as_mut_ptr().cast::<u8>()) }
    }
}

impl<A: ?Sized + 'static, const WORDS: usize> Callback<A> for InlineFn<A, WORDS> {
    fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&A) + Clone + Send + Sync + 'static,
    {
        Self::new(f)
    }

    fn call(&self, arg: &A) {
        InlineFn::call(self, arg)
    }
}

unsafe fn call_shared<F: Fn(&A), A: ?Sized>(slot: *const u8, arg: &A) {
    // SAFETY: caller guarantees `slot` holds an initialized `F`.
    let f = unsafe { &*slot.cast::<F>() };
    f(arg)
}

unsafe fn clone_erased<F: Clone>(src: *const u8, dst: *mut u8) {
    // SAFETY: caller guarantees `src` holds an initialized `F` and `dst` is
    // valid for writing one.
    unsafe { ptr::write(dst.cast::<F>(), (*src.cast::<F>()).clone()) }
}

/// FIFO of operations on top of any [`OpQueue`].
pub struct FunctionQueue<Q> {
    queue: Q,
}

/// Growable function queue of boxed operations.
pub type DynamicFunctionQueue = FunctionQueue<UnboundedQueue<FuncOp>>;

/// Fixed pool of `N` inline slots of `WORDS` words each.
pub type StaticFunctionQueue<const N: usize, const WORDS: usize = 6> =
    FunctionQueue<BoundedQueue<InlineOp<WORDS>, N>>;

impl<Q> FunctionQueue<Q>
where
    Q: OpQueue,
    Q::Item: Operation,
{
    pub fn new() -> Self
    where
        Q: Default,
    {
        Self::with_queue(Q::default())
    }

    pub fn with_queue(queue: Q) -> Self {
        Self { queue }
    }

    /// Appends a callable.
    ///
    /// # Panics
    ///
    /// Panics if a fixed-capacity queue is full.
    pub fn push<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(err) = self.try_push(f) {
            panic!("{err}");
        }
    }

    /// Appends a callable, failing if a fixed-capacity queue is full.
    pub fn try_push<F>(&mut self, f: F) -> Result<(), CapacityError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue
            .push_back(<Q::Item as Operation>::from_fn(f))
            .map_err(|_| CapacityError::new("function queue", self.capacity().unwrap_or(0)))
    }

    /// Appends an already type-erased operation, handing it back if a
    /// fixed-capacity queue is full.
    pub fn try_push_op(&mut self, op: Q::Item) -> Result<(), Q::Item> {
        self.queue.push_back(op)
    }

    pub fn pop(&mut self) -> Option<Q::Item> {
        self.queue.pop_front()
    }

    /// Pops and runs the oldest callable. Returns `false` if none was queued.
    pub fn run_one(&mut self) -> bool {
        match self.queue.pop_front() {
            Some(op) => {
                op.run();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.queue.capacity()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<Q> Default for FunctionQueue<Q>
where
    Q: OpQueue + Default,
    Q::Item: Operation,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn inline_op_runs_captured_state() {
        let hits = Arc::new(AtomicUsize::new(0));
        let tally = Arc::clone(&hits);
        let op: InlineOp<4> = InlineOp::new(move || {
            tally.fetch_add(3, Ordering::SeqCst);
        });
        op.call();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn dropped_inline_op_releases_captures() {
        let shared = Arc::new(());
        let captured = Arc::clone(&shared);
        let op: InlineOp<2> = InlineOp::new(move || drop(captured));
        assert_eq!(Arc::strong_count(&shared), 2);
        drop(op);
        assert_eq!(Arc::strong_count(&shared), 1);
    }

    #[test]
    fn zero_sized_closure_fits_empty_slot() {
        let op: InlineOp<0> = InlineOp::new(|| {});
        op.call();
    }

    #[test]
    #[should_panic(expected = "does not fit an inline slot")]
    fn oversized_closure_is_rejected() {
        let big = [0u64; 8];
        let _op: InlineOp<2> = InlineOp::new(move || {
            let _ = big.len();
        });
    }

    #[test]
    fn inline_fn_clones_share_captures() {
        let hits = Arc::new(AtomicUsize::new(0));
        let tally = Arc::clone(&hits);
        let callback: InlineFn<usize> = InlineFn::new(move |step: &usize| {
            tally.fetch_add(*step, Ordering::SeqCst);
        });

        let copy = callback.clone();
        assert_eq!(Arc::strong_count(&hits), 3);
        callback.call(&2);
        copy.call(&5);
        assert_eq!(hits.load(Ordering::SeqCst), 7);

        drop(callback);
        drop(copy);
        assert_eq!(Arc::strong_count(&hits), 1);
    }

    #[test]
    #[should_panic(expected = "does not fit an inline slot")]
    fn oversized_callback_is_rejected() {
        let big = [0u64; 8];
        let _callback: InlineFn<(), 2> = InlineFn::new(move |_: &()| {
            let _ = big.len();
        });
    }

    #[test]
    fn shared_fn_implements_callback() {
        let hits = Arc::new(AtomicUsize::new(0));
        let tally = Arc::clone(&hits);
        let callback = <SharedFn<u8> as Callback<u8>>::from_fn(move |n: &u8| {
            tally.fetch_add(usize::from(*n), Ordering::SeqCst);
        });
        Callback::call(&callback.clone(), &4);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn static_queue_mixes_closure_sizes_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue: StaticFunctionQueue<3, 4> = FunctionQueue::new();

        let l1 = Arc::clone(&log);
        queue.push(move || l1.lock().unwrap().push(1u64));
        let l2 = Arc::clone(&log);
        let extra = [7u64, 8];
        queue.push(move || l2.lock().unwrap().extend_from_slice(&extra));
        let l3 = Arc::clone(&log);
        queue.push(move || l3.lock().unwrap().push(3));

        assert_eq!(queue.len(), 3);
        assert_eq!(
            queue.try_push(|| {}),
            Err(CapacityError::new("function queue", 3))
        );

        while queue.run_one() {}
        assert_eq!(log.lock().unwrap().as_slice(), &[1, 7, 8, 3]);
    }

    #[test]
    #[should_panic(expected = "function queue is full (capacity 1)")]
    fn push_past_capacity_is_fatal() {
        let mut queue: StaticFunctionQueue<1> = FunctionQueue::new();
        queue.push(|| {});
        queue.push(|| {});
    }

    #[test]
    fn dynamic_queue_has_no_limit() {
        let mut queue = DynamicFunctionQueue::new();
        for _ in 0..256 {
            queue.push(|| {});
        }
        assert_eq!(queue.capacity(), None);
        assert_eq!(queue.len(), 256);
        queue.clear();
        assert!(!queue.run_one());
    }
}
