//! Optional `tracing`-feature integration.
//!
//! Two pieces live here: [`TracedTask`], which carries the submitter's
//! span onto the worker thread that eventually runs the task, and the
//! feature-gated [`metrics`] module, whose events mirror the counters in
//! [`DispatcherStats`](crate::dispatch::DispatcherStats) — submissions by
//! class, completions and panics by task type, and shutdown discards.
//!
//! With the feature disabled everything compiles down to a transparent
//! wrapper and no events.
//!
//! # Example
//!
//! ```rust,ignore
//! use dispatch_queue::prelude::*;
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env()
//!         .add_directive("dispatch_queue=debug".parse().unwrap()))
//!     .init();
//!
//! let dispatcher = Dispatcher::with_threads("render", 4)?;
//!
//! // The span active here is re-entered on whichever worker runs the task
//! dispatcher.dispatch(TracedTask::new(RenderTile::new(7)))?;
//! ```

use crate::core::{Result, Task};

/// Carries the submitting span across the queue to the executing worker.
///
/// Dispatch severs the usual span parentage: the closure runs on a worker
/// thread long after the submitter's stack frame is gone. Wrapping the
/// task captures the span at submission and re-enters it around
/// `execute`, so per-request context survives the hop. The wrapper adds
/// nothing to the queue's ordering; it is dispatched, ranked, and counted
/// like the task it wraps.
pub struct TracedTask<T: Task> {
    inner: T,
    #[cfg(feature = "tracing")]
    span: tracing::Span,
}

impl<T: Task> TracedTask<T> {
    /// Wrap a task, capturing the span current at the call site.
    pub fn new(task: T) -> Self {
        Self {
            inner: task,
            #[cfg(feature = "tracing")]
            span: tracing::Span::current(),
        }
    }

    /// Wrap a task under an explicitly chosen span.
    #[cfg(feature = "tracing")]
    pub fn with_span(task: T, span: tracing::Span) -> Self {
        Self { inner: task, span }
    }
}

impl<T: Task> Task for TracedTask<T> {
    fn execute(&mut self) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _guard = self.span.enter();
        self.inner.execute()
    }

    fn task_type(&self) -> &str {
        self.inner.task_type()
    }
}

/// Event emitters behind the dispatcher's counters.
///
/// Consumed by metrics collectors (e.g. Prometheus via
/// tracing-opentelemetry); field names match
/// [`DispatcherStats`](crate::dispatch::DispatcherStats).
#[cfg(feature = "tracing")]
pub mod metrics {
    use crate::core::Class;
    use std::time::Duration;

    /// Records an accepted submission, tagged with its queue class.
    #[inline]
    pub fn record_submission(class: Class, queue_depth: usize) {
        match class {
            Class::Prioritized { rank } => tracing::trace!(
                counter.tasks_submitted = 1,
                class = "prioritized",
                rank = rank,
                gauge.queue_depth = queue_depth as i64,
                "task submitted"
            ),
            Class::Fifo => tracing::trace!(
                counter.tasks_submitted = 1,
                class = "fifo",
                gauge.queue_depth = queue_depth as i64,
                "task submitted"
            ),
        }
    }

    /// Records a task finishing, successfully or with an error.
    #[inline]
    pub fn record_completion(task_type: &str, duration: Duration, success: bool) {
        let duration_ms = duration.as_millis() as u64;
        if success {
            tracing::trace!(
                counter.tasks_executed = 1,
                task_type = task_type,
                histogram.task_duration_ms = duration_ms,
                "task completed"
            );
        } else {
            tracing::trace!(
                counter.tasks_failed = 1,
                task_type = task_type,
                histogram.task_duration_ms = duration_ms,
                "task failed"
            );
        }
    }

    /// Records a caught task panic.
    #[inline]
    pub fn record_panic(task_type: &str, duration: Duration) {
        tracing::trace!(
            counter.tasks_panicked = 1,
            task_type = task_type,
            histogram.task_duration_ms = duration.as_millis() as u64,
            "task panicked"
        );
    }

    /// Records the backlog discarded by an abrupt shutdown.
    #[inline]
    pub fn record_discard(discarded: usize) {
        tracing::warn!(
            counter.tasks_discarded = discarded as u64,
            "queued tasks discarded at shutdown"
        );
    }

    /// Records dispatcher startup.
    #[inline]
    pub fn record_dispatcher_start(name: &str, num_workers: usize) {
        tracing::info!(
            dispatcher = name,
            workers = num_workers,
            "dispatcher started"
        );
    }

    /// Records dispatcher shutdown.
    #[inline]
    pub fn record_dispatcher_shutdown(tasks_executed: u64, tasks_failed: u64) {
        tracing::info!(
            tasks_executed = tasks_executed,
            tasks_failed = tasks_failed,
            "dispatcher shutdown complete"
        );
    }
}
