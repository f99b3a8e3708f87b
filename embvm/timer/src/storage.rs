//! Timer records and the containers that hold them.

use alloc::vec::Vec;

use embvm_core::{Callback, InlineFn, SharedFn, Storage, Ticks};

use crate::heap::TimerId;

/// How a timer behaves once it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerConfig {
    Oneshot,
    Periodic,
}

/// The callback of one schedule.
///
/// `serial` is unique per schedule within a manager. A delivery carries the
/// serial it was fired under and only runs while the record still holds it.
#[derive(Clone)]
pub(crate) struct Schedule<C> {
    pub(crate) serial: u32,
    pub(crate) callback: C,
}

/// Scheduling state of one allocated software timer.
///
/// `wait_in_progress` is true exactly while the record's id sits in the
/// scheduled queue.
pub struct TimerRecord<C> {
    pub(crate) config: TimerConfig,
    pub(crate) current: Ticks,
    pub(crate) target: Ticks,
    pub(crate) wait_in_progress: bool,
    pub(crate) schedule: Option<Schedule<C>>,
}

impl<C> TimerRecord<C> {
    pub(crate) fn idle() -> Self {
        Self {
            config: TimerConfig::Oneshot,
            current: Ticks::ZERO,
            target: Ticks::ZERO,
            wait_in_progress: false,
            schedule: None,
        }
    }

    /// Retires the current schedule so deliveries already fired under it
    /// never run. The callback is handed back so the caller can drop it
    /// outside the manager lock.
    pub(crate) fn disarm(&mut self) -> Option<Schedule<C>> {
        self.schedule.take()
    }

    /// Whether a delivery fired under `serial` may still run.
    pub(crate) fn holds(&self, serial: u32) -> bool {
        self.schedule
            .as_ref()
            .is_some_and(|schedule| schedule.serial == serial)
    }
}

/// A callback collected by one expiry pass, waiting to be dispatched.
pub struct Expired<C> {
    pub(crate) id: TimerId,
    pub(crate) serial: u32,
    pub(crate) callback: C,
}

/// Container choice for the timer manager.
pub trait TimerStorage: 'static {
    /// How a callback is kept. Cloning it must not allocate.
    type Callback: Callback<()>;
    /// Timer list, indexed by [`TimerId`]. Freed slots are `None`.
    type Slots: Storage<Option<TimerRecord<Self::Callback>>> + Send;
    /// Scheduled queue backing.
    type Heap: Storage<TimerId> + Send;
    /// Callbacks collected in one expiry pass.
    type Fired: Storage<Expired<Self::Callback>>;
}

/// Heap-backed storage for any number of timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicTimers;

impl TimerStorage for DynamicTimers {
    type Callback = SharedFn<()>;
    type Slots = Vec<Option<TimerRecord<Self::Callback>>>;
    type Heap = Vec<TimerId>;
    type Fired = Vec<Expired<Self::Callback>>;
}

/// Fixed storage for at most `N` timers, callbacks stored inline in `WORDS`
/// machine words.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticTimers<const N: usize, const WORDS: usize = 4>;

impl<const N: usize, const WORDS: usize> TimerStorage for StaticTimers<N, WORDS> {
    type Callback = InlineFn<(), WORDS>;
    type Slots = heapless::Vec<Option<TimerRecord<Self::Callback>>, N>;
    type Heap = heapless::Vec<TimerId, N>;
    type Fired = heapless::Vec<Expired<Self::Callback>, N>;
}
