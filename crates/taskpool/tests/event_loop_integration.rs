//! Integration tests for the typed event loop

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use taskpool::{EventLoop, EventLoopConfig, EventLoopError, PushError};

#[derive(Debug)]
enum Event {
    Add(String, u64),
    Remove(String),
}

#[test]
fn test_event_loop_multi_producer() {
    let totals = Arc::new(Mutex::new(HashMap::new()));
    let handled = Arc::new(AtomicUsize::new(0));

    let event_loop = {
        let totals = totals.clone();
        let handled = handled.clone();
        Arc::new(
            EventLoop::new(
                move |event: Event| {
                    match event {
                        Event::Add(key, n) => *totals.lock().entry(key).or_insert(0) += n,
                        Event::Remove(key) => {
                            totals.lock().remove(&key);
                        }
                    }
                    handled.fetch_add(1, Ordering::SeqCst);
                },
                4,
            )
            .unwrap(),
        )
    };

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let event_loop = event_loop.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    event_loop.push(Event::Add(format!("p{}", p), 2)).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    event_loop.stop().join();
    assert_eq!(handled.load(Ordering::SeqCst), 1000);

    let totals = totals.lock();
    assert_eq!(totals.len(), 4);
    assert!(totals.values().all(|&total| total == 500));

    match event_loop.push(Event::Remove("p0".to_string())) {
        Err(PushError::Completed(Event::Remove(key))) => assert_eq!(key, "p0"),
        other => panic!("expected Completed, got {:?}", other),
    }
}

#[test]
fn test_event_loop_thread_names() {
    let names = Arc::new(Mutex::new(Vec::new()));
    let event_loop = {
        let names = names.clone();
        EventLoop::with_config(
            move |_: ()| {
                let name = thread::current().name().map(str::to_string);
                names.lock().push(name);
            },
            EventLoopConfig::default()
                .with_workers(1)
                .with_thread_name("events"),
        )
        .unwrap()
    };

    event_loop.push(()).unwrap();
    event_loop.stop().join();

    assert_eq!(*names.lock(), vec![Some("events-0".to_string())]);
}

#[test]
fn test_event_loop_rejects_zero_capacity() {
    let result = EventLoop::with_config(
        |_: u32| {},
        EventLoopConfig::default().with_capacity(0),
    );
    assert!(matches!(result, Err(EventLoopError::Config(_))));
}
