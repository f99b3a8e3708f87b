//! POSIX hosted platform support for embvm.
//!
//! Simulator builds have no countdown peripheral, so [`PosixTimer`] emulates
//! one with a thread sleeping on the monotonic clock. Hand it to a
//! [`TimerManager`](embvm_timer::TimerManager) like any other hardware timer:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use embvm_posix::PosixTimer;
//! use embvm_timer::TimerManager;
//!
//! let manager = TimerManager::new(PosixTimer::new().expect("spawn timer thread"));
//! let blink = manager.allocate();
//! blink
//!     .periodic_delay(Duration::from_millis(500), || println!("toggle LED"))
//!     .unwrap();
//! std::thread::sleep(Duration::from_secs(2));
//! ```

pub mod timer;

pub use timer::PosixTimer;
