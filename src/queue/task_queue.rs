//! Synchronized ordered task queue.
//!
//! This module provides the thread-safe queue shared by every submission
//! path. One mutex guards a single binary heap holding all classes of work;
//! consumers block on a condition variable when the queue is empty, and a
//! second condition variable serves producers blocked by the
//! [`OverflowPolicy::Block`] policy.

use super::overflow::OverflowPolicy;
use crate::core::{BoxedTask, Class, DispatchError, Result, TaskEntry};
use log::warn;
use parking_lot::{Condvar, Mutex};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of the queue. Transitions only move forward:
/// `Running` -> `Draining` -> `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Accepting work; consumers block when empty
    Running,
    /// Rejecting work; consumers finish the backlog, then observe end-of-work
    Draining,
    /// Rejecting work; backlog discarded, consumers observe end-of-work
    Stopped,
}

struct Inner {
    heap: BinaryHeap<TaskEntry>,
    state: State,
    /// FIFO-class entries currently queued; what `fifo_is_empty` reports
    fifo_len: usize,
}

impl Inner {
    /// Removes the oldest entry by submission order, preferring a FIFO
    /// victim over a prioritized one so urgent work survives. Linear in
    /// the queue length; only runs when a bounded queue overflows.
    fn evict_oldest(&mut self) -> Option<TaskEntry> {
        let mut entries = std::mem::take(&mut self.heap).into_vec();
        let victim = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.class().is_fifo())
            .min_by_key(|(_, e)| e.sequence())
            .or_else(|| entries.iter().enumerate().min_by_key(|(_, e)| e.sequence()))
            .map(|(i, _)| i);

        let evicted = victim.map(|i| entries.swap_remove(i));
        if let Some(entry) = &evicted {
            if entry.class().is_fifo() {
                self.fifo_len -= 1;
            }
        }
        self.heap = BinaryHeap::from(entries);
        evicted
    }
}

/// A thread-safe ordered queue holding every class of dispatched work.
///
/// Entries are dequeued in one total order: all prioritized entries before
/// all FIFO entries, prioritized entries by rank (lower first) then
/// submission order, FIFO entries by submission order.
///
/// # Example
///
/// ```rust
/// use dispatch_queue::queue::{OverflowPolicy, TaskQueue};
/// use dispatch_queue::core::{Class, ClosureTask};
///
/// let queue = TaskQueue::new("example", OverflowPolicy::Unbounded);
///
/// // FIFO work yields to prioritized work
/// queue.push(Class::Fifo, Box::new(ClosureTask::new(|| Ok(())))).unwrap();
/// queue
///     .push(Class::Prioritized { rank: 0 }, Box::new(ClosureTask::new(|| Ok(()))))
///     .unwrap();
///
/// let first = queue.pop().unwrap();
/// assert_eq!(first.class(), Class::Prioritized { rank: 0 });
/// ```
pub struct TaskQueue {
    name: String,
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
    policy: OverflowPolicy,
    sequence: AtomicU64,
    submitted: AtomicU64,
    dropped: AtomicU64,
}

impl TaskQueue {
    /// Creates a new queue in the `Running` state.
    ///
    /// # Panics
    ///
    /// Panics if a bounding overflow policy carries a capacity of zero; a
    /// zero-capacity queue could never hold the entry being inserted.
    pub fn new(name: impl Into<String>, policy: OverflowPolicy) -> Self {
        assert!(
            policy.capacity() != Some(0),
            "bounded overflow policy requires a capacity of at least 1"
        );
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                state: State::Running,
                fifo_len: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            policy,
            sequence: AtomicU64::new(0),
            submitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Name of the owning dispatcher, used in errors and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues a task under the given class.
    ///
    /// Assigns the submission sequence number, applies the overflow policy
    /// when bounded, and wakes one waiting consumer. Under
    /// [`OverflowPolicy::Block`] the caller waits for a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueClosed`] once shutdown has begun, and
    /// [`DispatchError::QueueFull`] when at capacity under
    /// [`OverflowPolicy::Reject`].
    pub fn push(&self, class: Class, task: BoxedTask) -> Result<()> {
        self.push_inner(class, task, true)
    }

    /// Enqueues a task without ever suspending the caller.
    ///
    /// Identical to [`push`](Self::push) except under
    /// [`OverflowPolicy::Block`], where an at-capacity queue yields
    /// [`DispatchError::QueueFull`] instead of waiting. The timer thread
    /// uses this so a full queue can never stall its loop.
    pub fn try_push(&self, class: Class, task: BoxedTask) -> Result<()> {
        self.push_inner(class, task, false)
    }

    fn push_inner(&self, class: Class, task: BoxedTask, wait_when_full: bool) -> Result<()> {
        let mut inner = self.inner.lock();

        if inner.state != State::Running {
            return Err(DispatchError::queue_closed(&self.name));
        }

        match self.policy {
            OverflowPolicy::Unbounded => {}
            OverflowPolicy::Reject { capacity } => {
                if inner.heap.len() >= capacity {
                    return Err(DispatchError::queue_full(&self.name, capacity));
                }
            }
            OverflowPolicy::Block { capacity } => {
                if wait_when_full {
                    while inner.state == State::Running && inner.heap.len() >= capacity {
                        self.not_full.wait(&mut inner);
                    }
                    if inner.state != State::Running {
                        return Err(DispatchError::queue_closed(&self.name));
                    }
                } else if inner.heap.len() >= capacity {
                    return Err(DispatchError::queue_full(&self.name, capacity));
                }
            }
            OverflowPolicy::DropOldest { capacity } => {
                if inner.heap.len() >= capacity {
                    if let Some(evicted) = inner.evict_oldest() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            "dispatch queue '{}' at capacity {}; dropped oldest entry (sequence {})",
                            self.name,
                            capacity,
                            evicted.sequence()
                        );
                    }
                }
            }
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        if class.is_fifo() {
            inner.fifo_len += 1;
        }
        inner.heap.push(TaskEntry::new(class, task, sequence));
        drop(inner);

        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the next entry in execution order, blocking while the queue
    /// is empty and running.
    ///
    /// Returns `None` when no entry will ever be available again: the queue
    /// is `Stopped`, or `Draining` with an exhausted backlog. Consumers
    /// should exit on `None`.
    pub fn pop(&self) -> Option<TaskEntry> {
        let mut inner = self.inner.lock();

        loop {
            match inner.state {
                State::Stopped => return None,
                State::Draining if inner.heap.is_empty() => return None,
                _ => {}
            }

            if let Some(entry) = inner.heap.pop() {
                if entry.class().is_fifo() {
                    inner.fifo_len -= 1;
                }
                if self.policy.is_bounded() {
                    self.not_full.notify_one();
                }
                return Some(entry);
            }

            self.not_empty.wait(&mut inner);
        }
    }

    /// True when no FIFO-class entries are queued.
    ///
    /// Prioritized backlog is invisible to this predicate: only the FIFO
    /// sequence is consulted, so the result can be `true` while prioritized
    /// work is still pending. An entry stops counting the moment a worker
    /// dequeues it, not when it finishes executing.
    pub fn fifo_is_empty(&self) -> bool {
        self.inner.lock().fifo_len == 0
    }

    /// Total entries currently queued, across every class.
    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// True when no entries of any class are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    /// Moves to `Draining`: no new work is accepted, the backlog still runs.
    /// Wakes every waiting consumer and producer.
    pub fn close_drain(&self) {
        let mut inner = self.inner.lock();
        if inner.state == State::Running {
            inner.state = State::Draining;
        }
        drop(inner);

        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Moves to `Stopped`: no new work is accepted and the backlog is
    /// discarded. Returns the number of discarded entries. Wakes every
    /// waiting consumer and producer.
    pub fn close_now(&self) -> usize {
        let mut inner = self.inner.lock();
        let discarded = inner.heap.len();
        inner.heap.clear();
        inner.fifo_len = 0;
        inner.state = State::Stopped;
        drop(inner);

        self.not_empty.notify_all();
        self.not_full.notify_all();
        discarded
    }

    /// Number of entries ever accepted by the queue, across every class
    /// and submission path, timer firings included.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Number of entries evicted by [`OverflowPolicy::DropOldest`].
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ClosureTask;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn create_test_task() -> BoxedTask {
        Box::new(ClosureTask::new(|| Ok(())))
    }

    #[test]
    fn test_push_pop_fifo_order() {
        let queue = TaskQueue::new("test", OverflowPolicy::Unbounded);

        for i in 0..5 {
            let task = Box::new(ClosureTask::with_name(|| Ok(()), format!("Task{}", i)));
            queue.push(Class::Fifo, task).unwrap();
        }

        for i in 0..5 {
            let entry = queue.pop().unwrap();
            assert_eq!(entry.into_task().task_type(), format!("Task{}", i));
        }
    }

    #[test]
    fn test_prioritized_dequeues_before_fifo() {
        let queue = TaskQueue::new("test", OverflowPolicy::Unbounded);

        queue.push(Class::Fifo, create_test_task()).unwrap();
        queue
            .push(Class::Prioritized { rank: 9 }, create_test_task())
            .unwrap();
        queue
            .push(Class::Prioritized { rank: 1 }, create_test_task())
            .unwrap();

        assert_eq!(queue.pop().unwrap().class(), Class::Prioritized { rank: 1 });
        assert_eq!(queue.pop().unwrap().class(), Class::Prioritized { rank: 9 });
        assert_eq!(queue.pop().unwrap().class(), Class::Fifo);
    }

    #[test]
    fn test_fifo_is_empty_ignores_prioritized() {
        let queue = TaskQueue::new("test", OverflowPolicy::Unbounded);
        assert!(queue.fifo_is_empty());

        // Prioritized backlog does not register
        queue
            .push(Class::Prioritized { rank: 0 }, create_test_task())
            .unwrap();
        assert!(queue.fifo_is_empty());
        assert_eq!(queue.len(), 1);

        queue.push(Class::Fifo, create_test_task()).unwrap();
        assert!(!queue.fifo_is_empty());

        // The prioritized entry pops first; FIFO still pending
        queue.pop().unwrap();
        assert!(!queue.fifo_is_empty());

        queue.pop().unwrap();
        assert!(queue.fifo_is_empty());
    }

    #[test]
    fn test_push_after_close_fails() {
        let queue = TaskQueue::new("test", OverflowPolicy::Unbounded);
        queue.close_drain();

        match queue.push(Class::Fifo, create_test_task()) {
            Err(DispatchError::QueueClosed { .. }) => {}
            other => panic!("expected QueueClosed, got {:?}", other),
        }
    }

    #[test]
    fn test_draining_serves_backlog_then_ends() {
        let queue = TaskQueue::new("test", OverflowPolicy::Unbounded);
        queue.push(Class::Fifo, create_test_task()).unwrap();
        queue.push(Class::Fifo, create_test_task()).unwrap();

        queue.close_drain();
        assert_eq!(queue.state(), State::Draining);

        assert!(queue.pop().is_some());
        assert!(queue.pop().is_some());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_close_now_discards_and_counts() {
        let queue = TaskQueue::new("test", OverflowPolicy::Unbounded);
        queue.push(Class::Fifo, create_test_task()).unwrap();
        queue.push(Class::Fifo, create_test_task()).unwrap();
        queue
            .push(Class::Prioritized { rank: 3 }, create_test_task())
            .unwrap();

        assert_eq!(queue.close_now(), 3);
        assert_eq!(queue.state(), State::Stopped);
        assert!(queue.is_empty());
        assert!(queue.fifo_is_empty());
        assert!(queue.pop().is_none());

        // A second close has nothing left to discard
        assert_eq!(queue.close_now(), 0);
    }

    #[test]
    fn test_close_wakes_waiting_consumer() {
        let queue = Arc::new(TaskQueue::new("test", OverflowPolicy::Unbounded));

        let q = Arc::clone(&queue);
        let handle = thread::spawn(move || q.pop());

        // Give the consumer time to start waiting
        thread::sleep(Duration::from_millis(50));
        queue.close_drain();

        assert!(handle.join().unwrap().is_none());
    }

    #[test]
    fn test_pop_blocks_until_entry_available() {
        let queue = Arc::new(TaskQueue::new("test", OverflowPolicy::Unbounded));

        let q = Arc::clone(&queue);
        let handle = thread::spawn(move || q.pop());

        thread::sleep(Duration::from_millis(50));
        queue.push(Class::Fifo, create_test_task()).unwrap();

        let entry = handle.join().unwrap();
        assert!(entry.is_some());
    }

    #[test]
    fn test_reject_policy_returns_full() {
        let queue = TaskQueue::new("test", OverflowPolicy::Reject { capacity: 2 });
        queue.push(Class::Fifo, create_test_task()).unwrap();
        queue.push(Class::Fifo, create_test_task()).unwrap();

        match queue.push(Class::Fifo, create_test_task()) {
            Err(DispatchError::QueueFull { capacity, .. }) => assert_eq!(capacity, 2),
            other => panic!("expected QueueFull, got {:?}", other),
        }
    }

    #[test]
    fn test_block_policy_waits_for_space() {
        let queue = Arc::new(TaskQueue::new("test", OverflowPolicy::Block { capacity: 1 }));
        queue.push(Class::Fifo, create_test_task()).unwrap();

        let q = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            // Blocks until the consumer below makes room
            q.push(Class::Fifo, create_test_task())
        });

        thread::sleep(Duration::from_millis(50));
        queue.pop().unwrap();

        assert!(handle.join().unwrap().is_ok());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_try_push_never_waits_at_capacity() {
        let queue = TaskQueue::new("test", OverflowPolicy::Block { capacity: 1 });
        queue.push(Class::Fifo, create_test_task()).unwrap();

        // push() would wait here; try_push reports full instead
        match queue.try_push(Class::Fifo, create_test_task()) {
            Err(DispatchError::QueueFull { capacity, .. }) => assert_eq!(capacity, 1),
            other => panic!("expected QueueFull, got {:?}", other),
        }

        queue.pop().unwrap();
        assert!(queue.try_push(Class::Fifo, create_test_task()).is_ok());
    }

    #[test]
    fn test_submitted_counts_accepted_entries_only() {
        let queue = TaskQueue::new("test", OverflowPolicy::Reject { capacity: 2 });

        queue.push(Class::Fifo, create_test_task()).unwrap();
        queue
            .push(Class::Prioritized { rank: 3 }, create_test_task())
            .unwrap();
        assert!(queue.push(Class::Fifo, create_test_task()).is_err());

        // The rejected push leaves no trace in the accepted count
        assert_eq!(queue.submitted(), 2);

        queue.pop().unwrap();
        assert_eq!(queue.submitted(), 2, "popping does not change submissions");
    }

    #[test]
    #[should_panic(expected = "capacity of at least 1")]
    fn test_zero_capacity_policy_panics() {
        let _ = TaskQueue::new("test", OverflowPolicy::DropOldest { capacity: 0 });
    }

    #[test]
    fn test_block_policy_wakes_on_close() {
        let queue = Arc::new(TaskQueue::new("test", OverflowPolicy::Block { capacity: 1 }));
        queue.push(Class::Fifo, create_test_task()).unwrap();

        let q = Arc::clone(&queue);
        let handle = thread::spawn(move || q.push(Class::Fifo, create_test_task()));

        thread::sleep(Duration::from_millis(50));
        queue.close_drain();

        match handle.join().unwrap() {
            Err(DispatchError::QueueClosed { .. }) => {}
            other => panic!("expected QueueClosed, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_oldest_evicts_fifo_first() {
        let queue = TaskQueue::new("test", OverflowPolicy::DropOldest { capacity: 3 });

        queue
            .push(Class::Prioritized { rank: 0 }, create_test_task())
            .unwrap();
        let oldest_fifo = Box::new(ClosureTask::with_name(|| Ok(()), "oldest"));
        queue.push(Class::Fifo, oldest_fifo).unwrap();
        queue.push(Class::Fifo, create_test_task()).unwrap();

        // At capacity: the oldest FIFO entry goes, not the older prioritized one
        queue.push(Class::Fifo, create_test_task()).unwrap();
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 1);

        assert_eq!(queue.pop().unwrap().class(), Class::Prioritized { rank: 0 });
        let survivor = queue.pop().unwrap();
        assert_ne!(survivor.into_task().task_type(), "oldest");
    }

    #[test]
    fn test_drop_oldest_falls_back_to_prioritized() {
        let queue = TaskQueue::new("test", OverflowPolicy::DropOldest { capacity: 2 });

        queue
            .push(Class::Prioritized { rank: 5 }, create_test_task())
            .unwrap();
        queue
            .push(Class::Prioritized { rank: 1 }, create_test_task())
            .unwrap();

        // No FIFO victim available; the oldest prioritized entry goes
        queue
            .push(Class::Prioritized { rank: 9 }, create_test_task())
            .unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);

        assert_eq!(queue.pop().unwrap().class(), Class::Prioritized { rank: 1 });
        assert_eq!(queue.pop().unwrap().class(), Class::Prioritized { rank: 9 });
    }

    #[test]
    fn test_concurrent_producers_and_consumers() {
        let queue = Arc::new(TaskQueue::new("test", OverflowPolicy::Unbounded));
        let num_tasks = 100;

        let mut producers = vec![];
        for _ in 0..4 {
            let q = Arc::clone(&queue);
            producers.push(thread::spawn(move || {
                for _ in 0..num_tasks / 4 {
                    q.push(Class::Fifo, create_test_task()).unwrap();
                }
            }));
        }

        for p in producers {
            p.join().unwrap();
        }

        let mut received = 0;
        while !queue.is_empty() {
            queue.pop().unwrap();
            received += 1;
        }
        assert_eq!(received, num_tasks);
    }
}
