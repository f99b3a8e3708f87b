//! Static centers must not touch the heap once they exist.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

use embvm_event::{EventCenter, InlineDispatcher, Signal, StaticSubscribers};

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

const BUTTON: Signal = Signal(0x40);
const LID: Signal = Signal(0x41);

static PRESSES: AtomicUsize = AtomicUsize::new(0);

#[test]
fn static_subscribe_and_publish_do_not_allocate() {
    let center = EventCenter::<_, StaticSubscribers<2, 2>>::with_storage(InlineDispatcher);
    let offset = 3usize;

    let before = allocations();
    let mut first = center.subscribe(BUTTON, |_| {
        PRESSES.fetch_add(1, Ordering::SeqCst);
    });
    let second = center.subscribe(BUTTON, move |_| {
        PRESSES.fetch_add(offset, Ordering::SeqCst);
    });
    let third = center.subscribe(LID, |_| {});

    assert_eq!(center.signal(BUTTON), 2);
    assert_eq!(center.signal(LID), 1);
    assert!(first.reset());
    assert_eq!(center.signal(BUTTON), 1);
    drop(second);
    drop(third);
    assert_eq!(center.signal_count(), 0);
    let after = allocations();

    assert_eq!(after - before, 0, "static event center allocated");
    assert_eq!(PRESSES.load(Ordering::SeqCst), 1 + offset + offset);
}
