//! Thread-backed hardware timer.
//!
//! A dedicated thread sleeps until the armed deadline on the monotonic clock
//! and then invokes the expiry callback with no lock held. Deadlines are
//! absolute, so a late wake-up never stretches the next period.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use embvm_core::Ticks;
use embvm_timer::{ExpiryCallback, HwTimer, HwTimerError, HwTimerState};
use parking_lot::{Condvar, Mutex, MutexGuard};

/// Default tick length.
pub const DEFAULT_RESOLUTION: Duration = Duration::from_micros(1);

struct State {
    period: Ticks,
    /// Start of the current countdown, while armed.
    armed_at: Option<Instant>,
    /// Count captured when the timer stopped or expired.
    frozen: Ticks,
    state: HwTimerState,
    callback: Option<ExpiryCallback>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

/// A hardware timer emulated by a thread on the host's monotonic clock.
pub struct PosixTimer {
    resolution: Duration,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl PosixTimer {
    /// Creates a timer with 1 µs ticks.
    pub fn new() -> io::Result<Self> {
        Self::with_resolution(DEFAULT_RESOLUTION)
    }

    /// Creates a timer whose ticks last `resolution`.
    ///
    /// # Panics
    ///
    /// Panics if `resolution` is zero.
    pub fn with_resolution(resolution: Duration) -> io::Result<Self> {
        assert!(!resolution.is_zero(), "timer resolution must be non-zero");

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                period: Ticks::ZERO,
                armed_at: None,
                frozen: Ticks::ZERO,
                state: HwTimerState::Stopped,
                callback: None,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });

        let thread = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("posix-timer".into())
                .spawn(move || run(&shared, resolution))?
        };
        log::debug!("posix timer started, resolution {resolution:?}");

        Ok(Self {
            resolution,
            shared,
            thread: Some(thread),
        })
    }

    fn elapsed(&self, state: &State) -> Ticks {
        match (state.state, state.armed_at) {
            (HwTimerState::Armed, Some(start)) => {
                to_ticks(start.elapsed(), self.resolution).min(state.period)
            }
            _ => state.frozen,
        }
    }
}

impl HwTimer for PosixTimer {
    fn resolution(&self) -> Duration {
        self.resolution
    }

    fn start(&mut self) -> Result<(), HwTimerError> {
        let period = self.shared.state.lock().period;
        self.restart(period)
    }

    fn stop(&mut self) -> Result<(), HwTimerError> {
        let mut state = self.shared.state.lock();
        if state.state == HwTimerState::Armed {
            state.frozen = self.elapsed(&state);
            state.state = HwTimerState::Stopped;
            state.armed_at = None;
            drop(state);
            self.shared.wake.notify_one();
        }
        Ok(())
    }

    fn restart(&mut self, period: Ticks) -> Result<(), HwTimerError> {
        if period.is_zero() {
            return Err(HwTimerError::InvalidPeriod);
        }
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(HwTimerError::ShutDown);
        }
        state.period = period;
        state.frozen = Ticks::ZERO;
        state.armed_at = Some(Instant::now());
        state.state = HwTimerState::Armed;
        drop(state);
        self.shared.wake.notify_one();
        Ok(())
    }

    fn count(&self) -> Ticks {
        let state = self.shared.state.lock();
        self.elapsed(&state)
    }

    fn state(&self) -> HwTimerState {
        self.shared.state.lock().state
    }

    fn register_callback(&mut self, callback: ExpiryCallback) {
        self.shared.state.lock().callback = Some(callback);
    }
}

impl Drop for PosixTimer {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.state = HwTimerState::Stopped;
            state.armed_at = None;
        }
        self.shared.wake.notify_all();

        if let Some(thread) = self.thread.take() {
            // The last owner may be released from inside the expiry callback.
            if thread.thread().id() == thread::current().id() {
                log::debug!("posix timer dropped from its own thread, not joining");
                return;
            }
            if thread.join().is_err() {
                log::error!("posix timer thread panicked");
            }
        }
        log::debug!("posix timer stopped");
    }
}

fn to_ticks(elapsed: Duration, resolution: Duration) -> Ticks {
    let ticks = elapsed.as_nanos() / resolution.as_nanos();
    Ticks(u64::try_from(ticks).unwrap_or(u64::MAX))
}

fn run(shared: &Shared, resolution: Duration) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            return;
        }
        let (HwTimerState::Armed, Some(start)) = (state.state, state.armed_at) else {
            shared.wake.wait(&mut state);
            continue;
        };

        let deadline = start + state.period.to_duration(resolution);
        if Instant::now() < deadline {
            shared.wake.wait_until(&mut state, deadline);
            continue;
        }

        state.frozen = state.period;
        state.state = HwTimerState::Expired;
        state.armed_at = None;
        if let Some(callback) = state.callback.clone() {
            MutexGuard::unlocked(&mut state, || callback());
        }
    }
}
