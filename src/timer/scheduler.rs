//! Single-thread interval scheduling.
//!
//! One timer thread serves every recurring schedule on a dispatcher. The
//! thread keeps a min-ordered heap of upcoming deadlines and sleeps in
//! `recv_timeout` on its control channel until the next deadline or the
//! next command, whichever comes first. Each firing enqueues one FIFO
//! entry on the shared queue; the first firing happens at registration.

use super::handle::ScheduleHandle;
use crate::core::{BoxedTask, Class, DispatchError, Result};
use crate::queue::TaskQueue;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use std::cmp::{Ordering, Reverse};
use std::collections::binary_heap::PeekMut;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Factory invoked once per firing to produce the task to enqueue
pub(crate) type TaskFactory = Box<dyn Fn() -> BoxedTask + Send>;

/// A recurring schedule owned by the timer thread
struct Schedule {
    handle: ScheduleHandle,
    interval: Duration,
    factory: TaskFactory,
}

/// A pending firing: the instant it is due and the schedule to fire
struct Deadline {
    at: Instant,
    schedule: Schedule,
}

impl PartialEq for Deadline {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at
            && self.schedule.handle.schedule_id() == other.schedule.handle.schedule_id()
    }
}

impl Eq for Deadline {}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Earlier deadlines are smaller; ties break by schedule ID so the order
/// is total. Wrapped in `Reverse`, the heap pops the earliest first.
impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then_with(|| {
            self.schedule
                .handle
                .schedule_id()
                .cmp(&other.schedule.handle.schedule_id())
        })
    }
}

enum TimerCommand {
    Register(Schedule),
    Shutdown,
}

/// Owns the timer thread of one dispatcher.
///
/// At most one OS thread exists regardless of how many schedules are
/// registered.
pub(crate) struct Timer {
    thread_name: String,
    queue: Arc<TaskQueue>,
    sender: Sender<TimerCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Timer {
    /// Spawns the timer thread for the given queue.
    pub(crate) fn spawn(queue: Arc<TaskQueue>) -> Result<Self> {
        let thread_name = format!("{}-timer", queue.name());
        let (sender, receiver) = unbounded();

        let queue_clone = Arc::clone(&queue);
        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || run(queue_clone, receiver))
            .map_err(|e| {
                let message = e.to_string();
                DispatchError::spawn_with_source(thread_name.clone(), message, e)
            })?;

        Ok(Self {
            thread_name,
            queue,
            sender,
            thread: Some(thread),
        })
    }

    /// Registers a recurring schedule. The first firing is immediate.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueClosed`] if the timer has already been
    /// shut down.
    pub(crate) fn register(
        &self,
        interval: Duration,
        factory: TaskFactory,
    ) -> Result<ScheduleHandle> {
        let handle = ScheduleHandle::new();
        let schedule = Schedule {
            handle: handle.clone(),
            interval,
            factory,
        };

        self.sender
            .send(TimerCommand::Register(schedule))
            .map_err(|_| DispatchError::queue_closed(self.queue.name()))?;

        Ok(handle)
    }

    /// Stops the loop and joins the thread. Idempotent.
    pub(crate) fn shutdown(&mut self) -> Result<()> {
        // The loop also exits on channel disconnect, so a failed send means
        // the thread is already gone.
        let _ = self.sender.send(TimerCommand::Shutdown);

        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| DispatchError::join(self.thread_name.clone(), "timer thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let _ = self.sender.send(TimerCommand::Shutdown);

        if let Some(thread) = self.thread.take() {
            // Use a timeout to prevent Drop from hanging indefinitely
            const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

            let start = Instant::now();
            loop {
                if thread.is_finished() {
                    if thread.join().is_err() {
                        warn!("timer thread '{}' panicked during shutdown", self.thread_name);
                    }
                    break;
                }

                if start.elapsed() >= JOIN_TIMEOUT {
                    warn!(
                        "timer thread '{}' did not finish within {}s during drop; thread may be leaked",
                        self.thread_name,
                        JOIN_TIMEOUT.as_secs()
                    );
                    break;
                }

                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

/// Timer thread main loop
fn run(queue: Arc<TaskQueue>, receiver: Receiver<TimerCommand>) {
    let mut deadlines: BinaryHeap<Reverse<Deadline>> = BinaryHeap::new();

    debug!("timer started on '{}'", queue.name());

    loop {
        let now = Instant::now();

        // Fire every deadline that has come due
        loop {
            let due = match deadlines.peek_mut() {
                Some(head) if head.0.at <= now => PeekMut::pop(head).0,
                _ => break,
            };
            fire(&queue, due, &mut deadlines);
        }

        // Sleep until the next deadline or the next command
        let command = match deadlines.peek() {
            Some(Reverse(next)) => {
                let timeout = next.at.saturating_duration_since(Instant::now());
                match receiver.recv_timeout(timeout) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match receiver.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        match command {
            Some(TimerCommand::Register(schedule)) => {
                debug!(
                    "registered schedule {} every {:?} on '{}'",
                    schedule.handle.schedule_id(),
                    schedule.interval,
                    queue.name()
                );
                // First firing is immediate
                deadlines.push(Reverse(Deadline {
                    at: Instant::now(),
                    schedule,
                }));
            }
            Some(TimerCommand::Shutdown) => break,
            None => {}
        }
    }

    debug!("timer stopped on '{}'", queue.name());
}

/// Fires one due schedule: enqueue a task, then re-arm at the next
/// interval boundary.
///
/// The enqueue never blocks. A bounded queue at capacity costs the
/// schedule this one firing; only a closed queue retires it.
fn fire(queue: &TaskQueue, due: Deadline, deadlines: &mut BinaryHeap<Reverse<Deadline>>) {
    let Deadline { at, schedule } = due;

    if schedule.handle.is_cancelled() {
        debug!(
            "retiring cancelled schedule {} on '{}'",
            schedule.handle.schedule_id(),
            queue.name()
        );
        return;
    }

    let task = (schedule.factory)();
    match queue.try_push(Class::Fifo, task) {
        Ok(()) => {}
        Err(DispatchError::QueueFull { .. }) => {
            debug!(
                "schedule {} on '{}' skipped a firing: queue at capacity",
                schedule.handle.schedule_id(),
                queue.name()
            );
        }
        Err(e) => {
            // The queue is closing; the schedule cannot fire again
            debug!(
                "retiring schedule {} on '{}': {}",
                schedule.handle.schedule_id(),
                queue.name(),
                e
            );
            return;
        }
    }

    // Fixed-rate re-arm. A late firing re-anchors to the present instead
    // of bursting through the missed boundaries.
    let next = match at.checked_add(schedule.interval) {
        Some(next) => next.max(Instant::now()),
        None => {
            warn!(
                "schedule {} interval {:?} overflows the clock; retiring",
                schedule.handle.schedule_id(),
                schedule.interval
            );
            return;
        }
    };
    deadlines.push(Reverse(Deadline { at: next, schedule }));
}
