//! Execution-order guarantees: FIFO order, priority ranks, and the
//! FIFO-only `empty()` predicate.

use dispatch_queue::prelude::*;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Holds the single worker on a rendezvous so a backlog can accumulate
/// before anything executes. Returns the release side.
fn hold_worker(dispatcher: &Dispatcher) -> crossbeam_channel::Sender<()> {
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);
    dispatcher
        .dispatch_fn(move || {
            gate_rx.recv().ok();
            Ok(())
        })
        .expect("Failed to dispatch gate task");
    // Let the worker dequeue the gate before callers enqueue the backlog
    thread::sleep(Duration::from_millis(50));
    gate_tx
}

#[test]
fn test_single_worker_runs_fifo_in_submission_order() {
    init_logging();
    let dispatcher = Dispatcher::new("fifo-order").expect("Failed to create dispatcher");
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..50 {
        let order = Arc::clone(&order);
        dispatcher
            .dispatch_fn(move || {
                order.lock().unwrap().push(i);
                Ok(())
            })
            .expect("Failed to dispatch");
    }

    dispatcher.shutdown().expect("Failed to shut down");

    let order = order.lock().unwrap();
    assert_eq!(*order, (0..50).collect::<Vec<_>>());
}

#[test]
fn test_ranks_2_0_1_execute_as_0_1_2() {
    init_logging();
    let dispatcher = Dispatcher::new("rank-order").expect("Failed to create dispatcher");
    let order = Arc::new(Mutex::new(Vec::new()));
    let gate = hold_worker(&dispatcher);

    for rank in [2u8, 0, 1] {
        let order = Arc::clone(&order);
        dispatcher
            .dispatch_fn_with_priority(
                move || {
                    order.lock().unwrap().push(rank);
                    Ok(())
                },
                rank,
            )
            .expect("Failed to dispatch");
    }

    gate.send(()).expect("Failed to release gate");
    dispatcher.shutdown().expect("Failed to shut down");

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn test_prioritized_runs_before_older_fifo() {
    let dispatcher = Dispatcher::new("precedence").expect("Failed to create dispatcher");
    let order = Arc::new(Mutex::new(Vec::new()));
    let gate = hold_worker(&dispatcher);

    // The FIFO task is older, but the prioritized one still wins
    let o = Arc::clone(&order);
    dispatcher
        .dispatch_fn(move || {
            o.lock().unwrap().push("fifo");
            Ok(())
        })
        .expect("Failed to dispatch");
    let o = Arc::clone(&order);
    dispatcher
        .dispatch_fn_with_priority(
            move || {
                o.lock().unwrap().push("prioritized");
                Ok(())
            },
            200,
        )
        .expect("Failed to dispatch");

    gate.send(()).expect("Failed to release gate");
    dispatcher.shutdown().expect("Failed to shut down");

    assert_eq!(*order.lock().unwrap(), vec!["prioritized", "fifo"]);
}

#[test]
fn test_equal_ranks_keep_submission_order() {
    let dispatcher = Dispatcher::new("tie-break").expect("Failed to create dispatcher");
    let order = Arc::new(Mutex::new(Vec::new()));
    let gate = hold_worker(&dispatcher);

    for i in 0..10 {
        let order = Arc::clone(&order);
        dispatcher
            .dispatch_fn_with_priority(
                move || {
                    order.lock().unwrap().push(i);
                    Ok(())
                },
                5,
            )
            .expect("Failed to dispatch");
    }

    gate.send(()).expect("Failed to release gate");
    dispatcher.shutdown().expect("Failed to shut down");

    assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
}

#[test]
fn test_random_ranks_execute_in_nondecreasing_order() {
    let dispatcher = Dispatcher::new("random-ranks").expect("Failed to create dispatcher");
    let order = Arc::new(Mutex::new(Vec::new()));
    let gate = hold_worker(&dispatcher);

    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let rank: u8 = rng.gen();
        let order = Arc::clone(&order);
        dispatcher
            .dispatch_fn_with_priority(
                move || {
                    order.lock().unwrap().push(rank);
                    Ok(())
                },
                rank,
            )
            .expect("Failed to dispatch");
    }

    gate.send(()).expect("Failed to release gate");
    dispatcher.shutdown().expect("Failed to shut down");

    let order = order.lock().unwrap();
    assert_eq!(order.len(), 200);
    assert!(
        order.windows(2).all(|w| w[0] <= w[1]),
        "ranks executed out of order: {:?}",
        *order
    );
}

#[test]
fn test_thousand_tasks_four_workers_all_execute_once() {
    init_logging();
    let dispatcher = Dispatcher::with_threads("throughput", 4).expect("Failed to create dispatcher");
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..1000 {
        let counter = Arc::clone(&counter);
        dispatcher
            .dispatch_fn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("Failed to dispatch");
    }

    dispatcher.shutdown().expect("Failed to shut down");
    assert_eq!(counter.load(Ordering::SeqCst), 1000);
    assert_eq!(dispatcher.stats().executed, 1000);
}

#[test]
fn test_empty_reflects_only_fifo_backlog() {
    let dispatcher = Dispatcher::new("empty-quirk").expect("Failed to create dispatcher");
    assert!(dispatcher.empty());

    let gate = hold_worker(&dispatcher);

    // Prioritized backlog is invisible to empty()
    dispatcher
        .dispatch_fn_with_priority(|| Ok(()), 0)
        .expect("Failed to dispatch");
    assert!(dispatcher.empty());
    assert_eq!(dispatcher.pending(), 1);

    dispatcher.dispatch_fn(|| Ok(())).expect("Failed to dispatch");
    assert!(!dispatcher.empty());

    gate.send(()).expect("Failed to release gate");
    dispatcher.shutdown().expect("Failed to shut down");
    assert!(dispatcher.empty());
}
