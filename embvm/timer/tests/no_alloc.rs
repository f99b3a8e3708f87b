//! Static timer managers must not touch the heap once they exist.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use embvm_timer::{InlineDispatcher, SimTimer, StaticTimers, Ticks, TimerManager};

struct CountingAllocator;

thread_local! {
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let _ = ALLOCATIONS.try_with(|count| count.set(count.get() + 1));
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let _ = ALLOCATIONS.try_with(|count| count.set(count.get() + 1));
        System.realloc(ptr, layout, new_size)
    }
}

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator;

fn allocations() -> usize {
    ALLOCATIONS.with(Cell::get)
}

static TICKS: AtomicUsize = AtomicUsize::new(0);
static ALARMS: AtomicUsize = AtomicUsize::new(0);

#[test]
fn static_schedule_fire_and_cancel_do_not_allocate() {
    let clock = SimTimer::micros();
    let manager =
        TimerManager::<_, _, StaticTimers<4>>::with_storage(clock.clone(), InlineDispatcher);
    let step = 2usize;

    let before = allocations();
    let heartbeat = manager.allocate();
    let alarm = manager.allocate();
    heartbeat
        .periodic_delay(Duration::from_micros(10), move || {
            TICKS.fetch_add(step, Ordering::SeqCst);
        })
        .unwrap();
    alarm
        .async_delay(Duration::from_micros(25), || {
            ALARMS.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    clock.advance(Ticks(30));
    assert!(heartbeat.cancel());
    assert!(!alarm.is_pending());
    drop(alarm);
    drop(heartbeat);
    let after = allocations();

    assert_eq!(after - before, 0, "static timer manager allocated");
    assert_eq!(TICKS.load(Ordering::SeqCst), 3 * step);
    assert_eq!(ALARMS.load(Ordering::SeqCst), 1);
    assert_eq!(manager.allocated_count(), 0);
}
