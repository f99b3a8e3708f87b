//! The timer manager: many software timers on one hardware timer.
//!
//! Each software timer counts down in ticks. Nothing decrements the counters
//! while time passes; instead, whenever the hardware timer fires or the
//! schedule changes, the manager reconciles:
//!
//! 1. stop the hardware timer and read how many ticks it counted,
//! 2. subtract that count from every scheduled timer, flooring at zero,
//! 3. fire every timer that reached zero, reloading periodic ones,
//! 4. arm the hardware timer for the new soonest timer.
//!
//! All four steps run under one lock, so a hardware expiry racing a
//! `schedule` or `cancel` can never lose ticks. Callbacks are handed to the
//! dispatcher only after the lock is released.
//!
//! Every schedule gets a serial number. A fired callback is dispatched along
//! with its serial and looks the timer up again right before it runs: if the
//! timer was cancelled, rescheduled or freed in between, the serial no longer
//! matches and the callback is skipped.

use alloc::sync::{Arc, Weak};
use core::time::Duration;

use embvm_core::sync::Mutex;
use embvm_core::{Callback, Dispatcher, InlineDispatcher, Storage, Ticks};

use crate::error::{HwTimerError, TimerError};
use crate::handle::TimerHandle;
use crate::heap::{ScheduledQueue, TimerId};
use crate::hw::HwTimer;
use crate::storage::{
    DynamicTimers, Expired, Schedule, TimerConfig, TimerRecord, TimerStorage,
};

struct Inner<T, S: TimerStorage> {
    timer: T,
    /// The hardware timer is counting toward the scheduled queue's front.
    hw_armed: bool,
    next_serial: u32,
    slots: S::Slots,
    scheduled: ScheduledQueue<S::Heap>,
}

/// Remaining ticks of `id`; freed ids sort last.
fn remaining<C>(slots: &[Option<TimerRecord<C>>], id: TimerId) -> Ticks {
    slots
        .get(id.0)
        .and_then(Option::as_ref)
        .map_or(Ticks::MAX, |record| record.current)
}

impl<T: HwTimer, S: TimerStorage> Inner<T, S> {
    fn record(&self, id: TimerId) -> Option<&TimerRecord<S::Callback>> {
        self.slots.as_slice().get(id.0).and_then(Option::as_ref)
    }

    fn record_mut(&mut self, id: TimerId) -> Option<&mut TimerRecord<S::Callback>> {
        self.slots.as_mut_slice().get_mut(id.0).and_then(Option::as_mut)
    }

    /// Steps 1 and 2: charge the ticks the hardware counted to every
    /// scheduled timer.
    fn reconcile(&mut self) -> Result<(), HwTimerError> {
        if !self.hw_armed {
            return Ok(());
        }
        self.timer.stop()?;
        self.hw_armed = false;
        let elapsed = self.timer.count();

        // Saturating subtraction is monotonic, so heap order survives it.
        let Self {
            slots, scheduled, ..
        } = self;
        for id in scheduled.ids() {
            if let Some(Some(record)) = slots.as_mut_slice().get_mut(id.0) {
                record.current = record.current.saturating_sub(elapsed);
            }
        }
        log::trace!(
            "reconciled {} scheduled timer(s) against {elapsed}",
            scheduled.len()
        );
        Ok(())
    }

    /// Step 3: pop or reload every timer at the front that is due.
    ///
    /// A fired one-shot keeps its schedule so the delivery stays current
    /// until the timer is cancelled, rescheduled or freed.
    fn clear_expired(&mut self) -> S::Fired {
        let mut fired = S::Fired::default();
        let Self {
            slots, scheduled, ..
        } = self;

        while let Some(front) = scheduled.front() {
            let record = match slots.as_mut_slice().get_mut(front.0) {
                Some(Some(record)) if record.current.is_zero() => record,
                _ => break,
            };

            let config = record.config;
            match config {
                TimerConfig::Periodic => record.current = record.target,
                TimerConfig::Oneshot => record.wait_in_progress = false,
            }
            // A timer is due at most once per pass, so `fired` never
            // outgrows the timer list.
            if let Some(schedule) = &record.schedule {
                let _ = fired.push(Expired {
                    id: front,
                    serial: schedule.serial,
                    callback: schedule.callback.clone(),
                });
            }

            match config {
                TimerConfig::Periodic => {
                    scheduled.sift_front(|id| remaining(slots.as_slice(), id));
                }
                TimerConfig::Oneshot => {
                    scheduled.pop_front(|id| remaining(slots.as_slice(), id));
                }
            }
        }
        fired
    }

    /// Step 4: arm the hardware timer for the soonest scheduled timer.
    fn start_next(&mut self) -> Result<(), HwTimerError> {
        let Some(front) = self.scheduled.front() else {
            return Ok(());
        };
        let ticks = remaining(self.slots.as_slice(), front);
        self.timer.restart(ticks)?;
        self.hw_armed = true;
        log::trace!("hardware timer armed for {ticks} ({front})");
        Ok(())
    }

    /// Queues `id` with a fresh schedule, replacing a pending one. Returns the
    /// replaced schedule.
    fn enqueue(
        &mut self,
        id: TimerId,
        config: TimerConfig,
        ticks: Ticks,
        callback: S::Callback,
    ) -> Result<Option<Schedule<S::Callback>>, TimerError> {
        let Self {
            slots,
            scheduled,
            next_serial,
            ..
        } = self;

        if scheduled.remove(id, |id| remaining(slots.as_slice(), id)) {
            log::trace!("{id} rescheduled while pending");
        }
        let Some(Some(record)) = slots.as_mut_slice().get_mut(id.0) else {
            return Err(TimerError::InvalidHandle);
        };
        let serial = *next_serial;
        *next_serial = next_serial.wrapping_add(1);

        let replaced = record.disarm();
        record.config = config;
        record.current = ticks;
        record.target = ticks;
        record.wait_in_progress = true;
        record.schedule = Some(Schedule { serial, callback });

        let capacity = scheduled.capacity().unwrap_or(0);
        if scheduled
            .push(id, |id| remaining(slots.as_slice(), id))
            .is_err()
        {
            if let Some(Some(record)) = slots.as_mut_slice().get_mut(id.0) {
                record.wait_in_progress = false;
                record.disarm();
            }
            return Err(TimerError::QueueFull { capacity });
        }
        Ok(replaced)
    }

    /// Takes `id` out of the scheduled queue without touching the hardware.
    fn dequeue(&mut self, id: TimerId) {
        let Self {
            slots, scheduled, ..
        } = self;
        scheduled.remove(id, |id| remaining(slots.as_slice(), id));
        if let Some(Some(record)) = slots.as_mut_slice().get_mut(id.0) {
            record.wait_in_progress = false;
        }
    }
}

/// Virtualizes one hardware timer into many one-shot or periodic software
/// timers.
///
/// The manager owns the hardware timer and registers itself as its expiry
/// callback, so it is always created inside an [`Arc`]. Expiry callbacks are
/// routed through `D`; with the default [`InlineDispatcher`] they run on
/// whichever thread noticed the expiry, after the manager lock is released.
///
/// Callbacks are cloned for every expiry, so captured state is usually
/// shared through an `Arc` or is `Copy`. With [`StaticTimers`] the clones
/// live inline in the timer list and scheduling never allocates.
///
/// [`StaticTimers`]: crate::StaticTimers
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use embvm_timer::{SimTimer, Ticks, TimerManager};
///
/// let clock = SimTimer::micros();
/// let manager = TimerManager::new(clock.clone());
/// let fired = Arc::new(AtomicBool::new(false));
///
/// let timer = manager.allocate();
/// let flag = Arc::clone(&fired);
/// timer
///     .async_delay(Duration::from_millis(2), move || flag.store(true, Ordering::SeqCst))
///     .unwrap();
///
/// clock.advance(Ticks(1_999));
/// assert!(!fired.load(Ordering::SeqCst));
/// clock.advance(Ticks(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
pub struct TimerManager<T, D = InlineDispatcher, S = DynamicTimers>
where
    T: HwTimer,
    D: Dispatcher + 'static,
    S: TimerStorage,
{
    this: Weak<Self>,
    dispatcher: D,
    resolution: Duration,
    inner: Mutex<Inner<T, S>>,
}

impl<T: HwTimer> TimerManager<T> {
    /// A dynamic manager that runs expiry callbacks inline.
    pub fn new(timer: T) -> Arc<Self> {
        Self::with_dispatcher(timer, InlineDispatcher)
    }
}

impl<T: HwTimer, D: Dispatcher + 'static> TimerManager<T, D> {
    pub fn with_dispatcher(timer: T, dispatcher: D) -> Arc<Self> {
        Self::with_storage(timer, dispatcher)
    }
}

impl<T, D, S> TimerManager<T, D, S>
where
    T: HwTimer,
    D: Dispatcher + 'static,
    S: TimerStorage,
{
    /// Creates a manager whose timer storage is chosen by the `S` type
    /// parameter, e.g.
    /// `TimerManager::<_, _, StaticTimers<8>>::with_storage(timer, dispatcher)`.
    ///
    /// Construction allocates the manager itself and the hardware expiry
    /// hook. A static manager allocates nothing after that.
    pub fn with_storage(mut timer: T, dispatcher: D) -> Arc<Self> {
        let resolution = timer.resolution();
        Arc::new_cyclic(|this: &Weak<Self>| {
            let manager = Weak::clone(this);
            timer.register_callback(Arc::new(move || {
                if let Some(manager) = manager.upgrade() {
                    manager.on_timer_expired();
                }
            }));
            log::debug!("timer manager created, resolution {resolution:?}");
            Self {
                this: Weak::clone(this),
                dispatcher,
                resolution,
                inner: Mutex::new(Inner {
                    timer,
                    hw_armed: false,
                    next_serial: 0,
                    slots: S::Slots::default(),
                    scheduled: ScheduledQueue::new(),
                }),
            }
        })
    }

    /// Allocates an idle software timer.
    ///
    /// # Panics
    ///
    /// Panics if static timer storage is exhausted.
    pub fn allocate(&self) -> TimerHandle<'_, T, D, S> {
        match self.try_allocate() {
            Ok(handle) => handle,
            Err(err) => panic!("timer manager: {err}"),
        }
    }

    /// Allocates an idle software timer, reporting exhausted static storage.
    pub fn try_allocate(&self) -> Result<TimerHandle<'_, T, D, S>, TimerError> {
        let id = {
            let mut inner = self.inner.lock();
            let slots = &mut inner.slots;
            match slots.as_slice().iter().position(Option::is_none) {
                Some(index) => {
                    slots.as_mut_slice()[index] = Some(TimerRecord::idle());
                    index
                }
                None => {
                    let capacity = slots.capacity_limit().unwrap_or(0);
                    if slots.push(Some(TimerRecord::idle())).is_err() {
                        return Err(TimerError::ListFull { capacity });
                    }
                    slots.len() - 1
                }
            }
        };

        let id = TimerId(id);
        log::debug!("allocated {id}");
        Ok(TimerHandle::new(self, id))
    }

    /// Hardware expiry entry point.
    ///
    /// Registered with the hardware timer at construction. Platforms that
    /// route expiry through their own bottom half may call it directly; it
    /// must not be called from a true interrupt handler.
    pub fn on_timer_expired(&self) {
        let fired = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if let Err(err) = inner.reconcile() {
                log::error!("timer expiry: cannot stop hardware timer: {err}");
                return;
            }
            let fired = inner.clear_expired();
            if let Err(err) = inner.start_next() {
                log::error!("timer expiry: cannot rearm hardware timer: {err}");
            }
            fired
        };
        log::trace!("{} timer(s) expired", fired.len());
        self.deliver(fired);
    }

    /// Number of software timers waiting to fire.
    pub fn scheduled_count(&self) -> usize {
        self.inner.lock().scheduled.len()
    }

    /// Number of software timers currently allocated.
    pub fn allocated_count(&self) -> usize {
        self.inner
            .lock()
            .slots
            .as_slice()
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    /// Duration of one hardware tick.
    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub(crate) fn schedule<F>(
        &self,
        id: TimerId,
        config: TimerConfig,
        delay: Duration,
        callback: F,
    ) -> Result<(), TimerError>
    where
        F: Fn() + Clone + Send + Sync + 'static,
    {
        let ticks = Ticks::from_duration(delay, self.resolution);
        if config == TimerConfig::Periodic && ticks.is_zero() {
            return Err(TimerError::ZeroPeriod);
        }
        let callback = S::Callback::from_fn(move |_: &()| callback());

        let mut replaced = None;
        let (queued, fired, started) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if inner.record(id).is_none() {
                return Err(TimerError::InvalidHandle);
            }
            inner.reconcile()?;
            let queued = inner
                .enqueue(id, config, ticks, callback)
                .map(|old| replaced = old);
            let fired = inner.clear_expired();
            let started = inner.start_next();
            (queued, fired, started)
        };

        log::trace!("{id} scheduled {config:?} in {ticks}");
        drop(replaced);
        self.deliver(fired);
        queued?;
        started?;
        Ok(())
    }

    /// Removes `id` from the schedule and retires any delivery of it that
    /// is already on its way. Returns whether it was still pending.
    ///
    /// Only cancelling the soonest timer touches the hardware; any other
    /// timer is a plain heap removal.
    pub(crate) fn cancel(&self, id: TimerId) -> Result<bool, TimerError> {
        let retired;
        let (fired, started) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let Some(record) = inner.record_mut(id) else {
                return Err(TimerError::InvalidHandle);
            };
            retired = record.disarm();
            if !record.wait_in_progress {
                return Ok(false);
            }

            let at_front = inner.scheduled.front() == Some(id);
            inner.dequeue(id);
            if !at_front {
                log::trace!("{id} cancelled");
                return Ok(true);
            }

            inner.reconcile()?;
            let fired = inner.clear_expired();
            (fired, inner.start_next())
        };

        log::trace!("{id} cancelled at the front of the queue");
        drop(retired);
        self.deliver(fired);
        started?;
        Ok(true)
    }

    pub(crate) fn is_pending(&self, id: TimerId) -> bool {
        self.inner
            .lock()
            .record(id)
            .is_some_and(|record| record.wait_in_progress)
    }

    /// Cancels `id` if needed and frees its record.
    pub(crate) fn release(&self, id: TimerId) {
        match self.cancel(id) {
            Ok(_) | Err(TimerError::InvalidHandle) => {}
            Err(err) => log::error!("{id}: cancel on release failed: {err}"),
        }

        let record = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            inner.dequeue(id);
            inner.slots.as_mut_slice().get_mut(id.0).and_then(Option::take)
        };
        drop(record);
        log::debug!("freed {id}");
    }

    /// Whether a delivery fired under `serial` still belongs to the current
    /// schedule of `id`.
    fn is_current(&self, id: TimerId, serial: u32) -> bool {
        self.inner
            .lock()
            .record(id)
            .is_some_and(|record| record.holds(serial))
    }

    fn deliver(&self, fired: S::Fired) {
        for expired in fired.as_slice() {
            let manager = Weak::clone(&self.this);
            let (id, serial) = (expired.id, expired.serial);
            let callback = expired.callback.clone();
            self.dispatcher.dispatch(move || {
                let current = manager
                    .upgrade()
                    .is_some_and(|manager| manager.is_current(id, serial));
                if current {
                    callback.call(&());
                } else {
                    log::trace!("{id}: skipped retired delivery");
                }
            });
        }
    }
}

impl<T, D, S> Drop for TimerManager<T, D, S>
where
    T: HwTimer,
    D: Dispatcher + 'static,
    S: TimerStorage,
{
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if let Err(err) = inner.timer.stop() {
            log::warn!("timer manager teardown: cannot stop hardware timer: {err}");
        }
        inner.hw_armed = false;
        log::debug!(
            "timer manager stopped with {} timer(s) scheduled",
            inner.scheduled.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTimer;

    fn assert_invariants<D: Dispatcher + 'static>(manager: &TimerManager<SimTimer, D>, clock: &SimTimer) {
        let inner = manager.inner.lock();
        let slots = inner.slots.as_slice();
        assert!(inner.scheduled.is_heap(|id| remaining(slots, id)));

        for (index, slot) in slots.iter().enumerate() {
            if let Some(record) = slot {
                assert_eq!(
                    record.wait_in_progress,
                    inner.scheduled.contains(TimerId(index)),
                    "timer#{index} pending flag disagrees with the scheduled queue"
                );
            }
        }

        match inner.scheduled.front() {
            Some(front) => {
                assert!(inner.hw_armed);
                assert_eq!(clock.armed_period(), Some(remaining(slots, front)));
            }
            None => assert!(clock.armed_period().is_none()),
        }
    }

    #[test]
    fn invariants_hold_across_schedule_fire_and_cancel() {
        let clock = SimTimer::micros();
        let manager = TimerManager::new(clock.clone());
        let a = manager.allocate();
        let b = manager.allocate();
        let c = manager.allocate();

        a.async_delay(Duration::from_micros(50), || {}).unwrap();
        assert_invariants(&manager, &clock);
        b.periodic_delay(Duration::from_micros(20), || {}).unwrap();
        assert_invariants(&manager, &clock);
        clock.advance(Ticks(15));
        c.async_delay(Duration::from_micros(10), || {}).unwrap();
        assert_invariants(&manager, &clock);

        clock.advance(Ticks(7));
        assert_invariants(&manager, &clock);
        assert!(b.cancel());
        assert_invariants(&manager, &clock);
        clock.advance(Ticks(100));
        assert_invariants(&manager, &clock);
        assert_eq!(manager.scheduled_count(), 0);
    }

    #[test]
    fn reconcile_charges_elapsed_ticks_to_every_timer() {
        let clock = SimTimer::micros();
        let manager = TimerManager::new(clock.clone());
        let slow = manager.allocate();
        let fast = manager.allocate();

        slow.async_delay(Duration::from_micros(100), || {}).unwrap();
        clock.advance(Ticks(40));
        fast.async_delay(Duration::from_micros(10), || {}).unwrap();

        let inner = manager.inner.lock();
        assert_eq!(inner.record(slow.id().unwrap()).unwrap().current, Ticks(60));
        assert_eq!(inner.record(fast.id().unwrap()).unwrap().current, Ticks(10));
        assert_eq!(inner.scheduled.front(), fast.id());
        drop(inner);
        assert_eq!(clock.armed_period(), Some(Ticks(10)));
    }
}
