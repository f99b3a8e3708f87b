//! Tests for the threaded executors over static and dynamic queues.

use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

use embvm_core::{BoundedQueue, Dispatcher, FuncOp, InlineOp};
use embvm_dispatch::{
    ActiveObject, ActiveObjectConfig, DispatchError, DispatchQueue, DispatchQueueConfig, Process,
};

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn inline_pool_dispatch_queue_runs_in_order() {
    let config = DispatchQueueConfig::builder().name("static").threads(1).build();
    let queue = DispatchQueue::with_queue(config, BoundedQueue::<InlineOp, 8>::new());
    let (tx, rx) = mpsc::channel();

    for i in 0..8u32 {
        let tx = tx.clone();
        queue.dispatch(move || tx.send(i).unwrap());
    }

    let order: Vec<u32> = (0..8).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
    assert_eq!(order, (0..8).collect::<Vec<_>>());
    assert_eq!(queue.capacity(), Some(8));
}

#[test]
fn full_inline_pool_reports_overflow() {
    let config = DispatchQueueConfig::builder().name("tight").build();
    let queue = DispatchQueue::with_queue(config, BoundedQueue::<InlineOp<2>, 2>::new());

    let started = Arc::new(Barrier::new(2));
    let gate = Arc::new(Barrier::new(2));
    {
        let started = Arc::clone(&started);
        let gate = Arc::clone(&gate);
        queue.dispatch(move || {
            started.wait();
            gate.wait();
        });
    }
    // The worker now holds the first op, so the queue itself is empty.
    started.wait();

    queue.dispatch(|| {});
    queue.dispatch(|| {});
    match queue.try_dispatch(|| {}) {
        Err(DispatchError::QueueFull(err)) => assert_eq!(err.capacity, 2),
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(queue.queue_size(), 2);

    gate.wait();
}

#[test]
#[should_panic(expected = "queue is full")]
fn dispatch_on_a_full_static_queue_panics() {
    let config = DispatchQueueConfig::builder().name("overflow").threads(1).build();
    let queue = DispatchQueue::with_queue(config, BoundedQueue::<FuncOp, 1>::new());
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    queue.dispatch(move || {
        started_tx.send(()).unwrap();
        let _ = release_rx.recv();
    });
    started_rx.recv_timeout(TIMEOUT).unwrap();

    // Dropped before the queue while unwinding, which frees the worker.
    let _release = release_tx;
    queue.dispatch(|| {});
    queue.dispatch(|| {});
}

#[test]
fn dispatch_queue_serves_as_dispatcher() {
    fn run_via<D: Dispatcher>(dispatcher: &D, tx: mpsc::Sender<&'static str>) {
        dispatcher.dispatch(move || tx.send("dispatched").unwrap());
    }

    let queue = DispatchQueue::new(2);
    let (tx, rx) = mpsc::channel();
    run_via(&queue, tx);
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "dispatched");
}

#[test]
fn dropping_queue_discards_pending_work() {
    let ran = Arc::new(Mutex::new(0u32));
    let started = Arc::new(Barrier::new(2));
    let gate = Arc::new(Barrier::new(2));
    {
        let queue = DispatchQueue::new(1);
        {
            let started = Arc::clone(&started);
            let gate = Arc::clone(&gate);
            queue.dispatch(move || {
                started.wait();
                gate.wait();
            });
        }
        started.wait();
        for _ in 0..3 {
            let ran = Arc::clone(&ran);
            queue.dispatch(move || *ran.lock().unwrap() += 1);
        }
        let gate = Arc::clone(&gate);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            gate.wait();
        });
    }
    assert_eq!(*ran.lock().unwrap(), 0);
}

/// A blocking bus whose transfers are made asynchronous by an active object.
struct Bus {
    lifecycle: mpsc::Sender<&'static str>,
}

struct Transfer {
    tx: Vec<u8>,
    done: Box<dyn FnOnce(Vec<u8>) + Send>,
}

impl Process for Bus {
    type Item = Transfer;

    fn process(&mut self, item: Transfer) {
        // Loopback: the response is the request with every byte inverted.
        let rx = item.tx.iter().map(|b| !b).collect();
        (item.done)(rx);
    }

    fn on_start(&mut self) {
        self.lifecycle.send("start").unwrap();
    }

    fn on_stop(&mut self) {
        self.lifecycle.send("stop").unwrap();
    }
}

#[test]
fn active_object_adapts_blocking_bus() {
    let (life_tx, life_rx) = mpsc::channel();
    let ao = ActiveObject::with_config(
        ActiveObjectConfig::new("i2c0"),
        Bus { lifecycle: life_tx },
    );
    assert_eq!(life_rx.recv_timeout(TIMEOUT).unwrap(), "start");

    let (done_tx, done_rx) = mpsc::channel();
    for request in [vec![0x00u8, 0x0f], vec![0xff]] {
        let done_tx = done_tx.clone();
        ao.enqueue(Transfer {
            tx: request,
            done: Box::new(move |rx| done_tx.send(rx).unwrap()),
        });
    }

    assert_eq!(done_rx.recv_timeout(TIMEOUT).unwrap(), vec![0xff, 0xf0]);
    assert_eq!(done_rx.recv_timeout(TIMEOUT).unwrap(), vec![0x00]);

    ao.shutdown();
    assert_eq!(life_rx.recv_timeout(TIMEOUT).unwrap(), "stop");
    assert_eq!(ao.name(), "i2c0");
}

struct Gate {
    started: Arc<Barrier>,
    gate: Arc<Barrier>,
}

impl Process for Gate {
    type Item = u8;

    fn process(&mut self, item: u8) {
        if item == 0 {
            self.started.wait();
            self.gate.wait();
        }
    }
}

#[test]
fn bounded_active_object_reports_overflow() {
    let started = Arc::new(Barrier::new(2));
    let gate = Arc::new(Barrier::new(2));
    let ao = ActiveObject::with_queue(
        ActiveObjectConfig::default(),
        Gate {
            started: Arc::clone(&started),
            gate: Arc::clone(&gate),
        },
        BoundedQueue::<u8, 1>::new(),
    );

    ao.enqueue(0);
    started.wait();
    ao.enqueue(1);
    assert!(matches!(
        ao.try_enqueue(2),
        Err(DispatchError::QueueFull(_))
    ));
    assert_eq!(ao.queued_count(), 1);

    gate.wait();
}

/// Blocks on item 0 until the test lets go of the release channel.
struct Stall {
    started: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

impl Process for Stall {
    type Item = u8;

    fn process(&mut self, item: u8) {
        if item == 0 {
            let _ = self.started.send(());
            let _ = self.release.recv();
        }
    }
}

#[test]
#[should_panic(expected = "queue is full")]
fn enqueue_on_a_full_static_queue_panics() {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let ao = ActiveObject::with_queue(
        ActiveObjectConfig::new("stalled"),
        Stall {
            started: started_tx,
            release: release_rx,
        },
        BoundedQueue::<u8, 1>::new(),
    );

    ao.enqueue(0);
    started_rx.recv_timeout(TIMEOUT).unwrap();

    // Dropped before the active object while unwinding, which frees the worker.
    let _release = release_tx;
    ao.enqueue(1);
    ao.enqueue(2);
}
