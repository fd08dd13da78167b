//! Worker thread implementation

use crate::core::{BoxedTask, DispatchError, Result};
use crate::queue::TaskQueue;
use log::{debug, error, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::{span, Level};

/// Statistics for a worker thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Total number of tasks executed successfully
    pub tasks_executed: AtomicU64,
    /// Total number of tasks that returned an error
    pub tasks_failed: AtomicU64,
    /// Total number of tasks that panicked
    pub tasks_panicked: AtomicU64,
    /// Total time spent executing tasks (microseconds)
    pub total_execution_time_us: AtomicU64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the executed counter
    pub fn increment_executed(&self) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the failed counter
    pub fn increment_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the panicked counter
    pub fn increment_panicked(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Add execution time
    pub fn add_execution_time(&self, microseconds: u64) {
        self.total_execution_time_us
            .fetch_add(microseconds, Ordering::Relaxed);
    }

    /// Get total tasks executed successfully
    pub fn get_tasks_executed(&self) -> u64 {
        self.tasks_executed.load(Ordering::Relaxed)
    }

    /// Get total tasks that returned an error
    pub fn get_tasks_failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::Relaxed)
    }

    /// Get total tasks that panicked
    pub fn get_tasks_panicked(&self) -> u64 {
        self.tasks_panicked.load(Ordering::Relaxed)
    }

    /// Get average execution time per task in microseconds
    pub fn get_average_execution_time_us(&self) -> f64 {
        let total = self.total_execution_time_us.load(Ordering::Relaxed);
        let count = self.tasks_executed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }
}

/// A worker thread that executes tasks from the shared queue
///
/// Workers exit when [`TaskQueue::pop`] reports end-of-work: the queue is
/// stopped, or draining with an exhausted backlog. Each worker decrements
/// the shared live counter right before its thread terminates, which is
/// what makes "every owned thread has exited" externally observable.
#[derive(Debug)]
pub(crate) struct Worker {
    id: usize,
    thread_name: String,
    thread: Option<thread::JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a worker against the given queue.
    ///
    /// The live counter is incremented here, before the thread starts, so
    /// a dispatcher's live count never under-reports during construction.
    pub(crate) fn spawn(
        id: usize,
        dispatcher_name: &str,
        queue: Arc<TaskQueue>,
        live: Arc<AtomicUsize>,
    ) -> Result<Self> {
        let thread_name = format!("{}-worker-{}", dispatcher_name, id);
        let stats = Arc::new(WorkerStats::new());
        let stats_clone = Arc::clone(&stats);

        live.fetch_add(1, Ordering::SeqCst);
        let live_clone = Arc::clone(&live);

        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                Self::run(id, queue, stats_clone, live_clone);
            })
            .map_err(|e| {
                live.fetch_sub(1, Ordering::SeqCst);
                let message = e.to_string();
                DispatchError::spawn_with_source(thread_name.clone(), message, e)
            })?;

        Ok(Self {
            id,
            thread_name,
            thread: Some(thread),
            stats,
        })
    }

    /// Get worker ID
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub(crate) fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Join the worker thread
    pub(crate) fn join(mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| DispatchError::join(self.thread_name.clone(), "worker panicked"))?;
        }
        Ok(())
    }

    /// Main worker loop
    fn run(id: usize, queue: Arc<TaskQueue>, stats: Arc<WorkerStats>, live: Arc<AtomicUsize>) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", id = id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        debug!("worker {} started on '{}'", id, queue.name());

        while let Some(entry) = queue.pop() {
            let mut task = entry.into_task();
            Self::execute_task(id, &mut task, &stats);
        }

        debug!(
            "worker {} on '{}' exiting: {} executed, {} failed, {} panicked",
            id,
            queue.name(),
            stats.get_tasks_executed(),
            stats.get_tasks_failed(),
            stats.get_tasks_panicked()
        );
        live.fetch_sub(1, Ordering::SeqCst);
    }

    /// Execute a single task with panic protection.
    ///
    /// The queue lock is not held here; a slow or blocking task never
    /// prevents other workers from popping.
    fn execute_task(id: usize, task: &mut BoxedTask, stats: &WorkerStats) {
        let task_type = task.task_type().to_string();

        #[cfg(feature = "tracing")]
        let task_span = span!(Level::DEBUG, "task_execution", task_type = %task_type);
        #[cfg(feature = "tracing")]
        let _task_guard = task_span.enter();

        let start = std::time::Instant::now();

        let panic_result = catch_unwind(AssertUnwindSafe(|| task.execute()));

        let elapsed = start.elapsed();
        let elapsed_us = elapsed.as_micros() as u64;

        match panic_result {
            Ok(Ok(())) => {
                stats.increment_executed();
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_completion(&task_type, elapsed, true);
            }
            Ok(Err(e)) => {
                warn!("worker {}: task '{}' failed: {}", id, task_type, e);
                stats.increment_failed();
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_completion(&task_type, elapsed, false);
            }
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                error!("worker {}: task '{}' panicked: {}", id, task_type, panic_msg);
                stats.increment_panicked();
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_panic(&task_type, elapsed);
            }
        }

        stats.add_execution_time(elapsed_us);
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            // Use a timeout to prevent Drop from hanging indefinitely
            const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

            let start = std::time::Instant::now();
            loop {
                if thread.is_finished() {
                    if thread.join().is_err() {
                        warn!("worker thread '{}' panicked during shutdown", self.thread_name);
                    }
                    break;
                }

                if start.elapsed() >= JOIN_TIMEOUT {
                    warn!(
                        "worker thread '{}' did not finish within {}s during drop; thread may be leaked",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Class, ClosureTask};
    use crate::queue::OverflowPolicy;

    fn spawn_worker(queue: &Arc<TaskQueue>) -> (Worker, Arc<AtomicUsize>) {
        let live = Arc::new(AtomicUsize::new(0));
        let worker = Worker::spawn(0, "test", Arc::clone(queue), Arc::clone(&live))
            .expect("Failed to spawn worker");
        (worker, live)
    }

    #[test]
    fn test_worker_executes_tasks() {
        let queue = Arc::new(TaskQueue::new("test", OverflowPolicy::Unbounded));
        let (worker, _live) = spawn_worker(&queue);
        let stats = worker.stats();
        assert_eq!(worker.id(), 0);

        queue
            .push(Class::Fifo, Box::new(ClosureTask::new(|| Ok(()))))
            .expect("Failed to push task");

        thread::sleep(Duration::from_millis(50));
        assert_eq!(stats.get_tasks_executed(), 1);
        assert_eq!(stats.get_tasks_failed(), 0);

        queue.close_drain();
        worker.join().expect("Failed to join worker");
    }

    #[test]
    fn test_worker_survives_task_error() {
        let queue = Arc::new(TaskQueue::new("test", OverflowPolicy::Unbounded));
        let (worker, _live) = spawn_worker(&queue);
        let stats = worker.stats();

        queue
            .push(
                Class::Fifo,
                Box::new(ClosureTask::new(|| {
                    Err(DispatchError::execution("failing", "intentional"))
                })),
            )
            .expect("Failed to push task");
        queue
            .push(Class::Fifo, Box::new(ClosureTask::new(|| Ok(()))))
            .expect("Failed to push task");

        queue.close_drain();
        worker.join().expect("Failed to join worker");

        assert_eq!(stats.get_tasks_failed(), 1);
        assert_eq!(stats.get_tasks_executed(), 1);
    }

    #[test]
    fn test_worker_survives_panic() {
        let queue = Arc::new(TaskQueue::new("test", OverflowPolicy::Unbounded));
        let (worker, _live) = spawn_worker(&queue);
        let stats = worker.stats();

        queue
            .push(
                Class::Fifo,
                Box::new(ClosureTask::new(|| {
                    panic!("Intentional panic for testing");
                })),
            )
            .expect("Failed to push panicking task");

        thread::sleep(Duration::from_millis(100));
        assert_eq!(stats.get_tasks_panicked(), 1);
        assert_eq!(stats.get_tasks_executed(), 0);

        // The worker keeps running after the panic
        queue
            .push(Class::Fifo, Box::new(ClosureTask::new(|| Ok(()))))
            .expect("Failed to push task");

        queue.close_drain();
        worker.join().expect("Failed to join worker");

        assert_eq!(stats.get_tasks_executed(), 1);
        assert_eq!(stats.get_tasks_panicked(), 1);
    }

    #[test]
    fn test_live_counter_tracks_thread_exit() {
        let queue = Arc::new(TaskQueue::new("test", OverflowPolicy::Unbounded));
        let (worker, live) = spawn_worker(&queue);
        assert_eq!(live.load(Ordering::SeqCst), 1);

        queue.close_drain();
        worker.join().expect("Failed to join worker");
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
