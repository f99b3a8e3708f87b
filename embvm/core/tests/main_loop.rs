//! A function queue drained by a main loop, fed through the dispatcher
//! contract from other threads.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use embvm_core::{
    CapacityError, Dispatcher, DynEvent, DynamicFunctionQueue, FnDispatcher, FuncOp, Signal,
    StaticFunctionQueue, Ticks,
};

fn main_loop() -> (Arc<Mutex<DynamicFunctionQueue>>, impl Dispatcher) {
    let queue = Arc::new(Mutex::new(DynamicFunctionQueue::new()));
    let sink = Arc::clone(&queue);
    let dispatcher = FnDispatcher(move |op: FuncOp| {
        assert!(sink.lock().unwrap().try_push_op(op).is_ok());
    });
    (queue, dispatcher)
}

fn drain(queue: &Mutex<DynamicFunctionQueue>) -> usize {
    let mut ran = 0;
    loop {
        // Pop under the lock, run outside it so operations may dispatch more work.
        let Some(op) = queue.lock().unwrap().pop() else {
            return ran;
        };
        op();
        ran += 1;
    }
}

#[test]
fn work_from_other_threads_runs_on_the_loop() {
    let (queue, dispatcher) = main_loop();
    let dispatcher = Arc::new(dispatcher);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let dispatcher = Arc::clone(&dispatcher);
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                for step in 0..10 {
                    let seen = Arc::clone(&seen);
                    dispatcher.dispatch(move || {
                        seen.lock().unwrap().push((producer, step, thread::current().id()));
                    });
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(drain(&queue), 40);

    let seen = seen.lock().unwrap();
    let here = thread::current().id();
    assert!(seen.iter().all(|(_, _, thread)| *thread == here));
    for producer in 0..4 {
        let steps: Vec<_> = seen
            .iter()
            .filter(|(p, _, _)| *p == producer)
            .map(|(_, step, _)| *step)
            .collect();
        assert_eq!(steps, (0..10).collect::<Vec<_>>());
    }
}

#[test]
fn operations_may_queue_follow_up_work() {
    let (queue, dispatcher) = main_loop();
    let dispatcher = Arc::new(dispatcher);
    let log = Arc::new(Mutex::new(Vec::new()));

    let again = Arc::clone(&dispatcher);
    let first = Arc::clone(&log);
    dispatcher.dispatch(move || {
        first.lock().unwrap().push("first");
        let second = Arc::clone(&first);
        again.dispatch(move || second.lock().unwrap().push("second"));
    });

    assert_eq!(drain(&queue), 2);
    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
}

#[test]
fn fixed_pool_reports_exhaustion_and_recovers() {
    let mut pool: StaticFunctionQueue<2> = StaticFunctionQueue::new();
    let hits = Arc::new(Mutex::new(0));

    for _ in 0..2 {
        let hits = Arc::clone(&hits);
        pool.try_push(move || *hits.lock().unwrap() += 1).unwrap();
    }
    let err = pool.try_push(|| {}).unwrap_err();
    assert_eq!(err, CapacityError::new("function queue", 2));

    assert!(pool.run_one());
    pool.try_push(|| {}).unwrap();
    while pool.run_one() {}
    assert_eq!(*hits.lock().unwrap(), 2);
    assert!(pool.is_empty());
}

#[test]
fn shared_event_payload_survives_deferred_delivery() {
    let (queue, dispatcher) = main_loop();
    let event = DynEvent::with_payload(Signal::new(7), Ticks::from_duration(
        Duration::from_micros(2_500),
        Duration::from_millis(1),
    ));
    let received = Arc::new(Mutex::new(None));

    for _ in 0..2 {
        let event = event.clone();
        let received = Arc::clone(&received);
        dispatcher.dispatch(move || {
            *received.lock().unwrap() = event.payload_ref::<Ticks>().copied();
        });
    }
    drop(event);

    assert_eq!(drain(&queue), 2);
    assert_eq!(*received.lock().unwrap(), Some(Ticks::new(3)));
}
