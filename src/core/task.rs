//! The unit of work the dispatcher moves around.
//!
//! A task is owned by the queue that holds it, transfers to a worker at
//! pop time, and is released after execution. [`ClosureTask`] adapts any
//! one-shot closure; the timer's factories hand out a fresh one per
//! firing, which is why executing the same adapter twice is an error
//! rather than a silent no-op.

use crate::core::error::{DispatchError, Result};
use std::borrow::Cow;
use std::fmt;

/// A deferred, opaque unit of work.
///
/// `execute` takes `&mut self` so one-shot state (a consumed closure, a
/// drained buffer) needs no interior mutability. The label from
/// `task_type` is what worker logs and completion metrics report.
pub trait Task: Send {
    /// Run the task to completion.
    ///
    /// # Errors
    ///
    /// An error here is caught by the executing worker, logged, and
    /// counted; it never propagates to other tasks.
    fn execute(&mut self) -> Result<()>;

    /// Short label identifying this kind of task in logs and stats
    fn task_type(&self) -> &str {
        "Task"
    }
}

impl fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.task_type())
    }
}

/// A task that has been boxed for the queue
pub type BoxedTask = Box<dyn Task>;

/// An already-boxed task is still a task, so pre-boxed work can go
/// through the same generic dispatch surface as concrete types.
impl Task for BoxedTask {
    fn execute(&mut self) -> Result<()> {
        (**self).execute()
    }

    fn task_type(&self) -> &str {
        (**self).task_type()
    }
}

const DEFAULT_LABEL: &str = "ClosureTask";

/// Adapts a one-shot closure into a [`Task`].
///
/// The closure is consumed on first execution. A second execution of the
/// same adapter reports [`DispatchError::ExecutionError`] carrying the
/// task's label; workers then count and log it like any other failed
/// task instead of silently succeeding.
pub struct ClosureTask<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    closure: Option<F>,
    label: Cow<'static, str>,
}

impl<F> ClosureTask<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    /// Wrap a closure under the default label
    pub fn new(closure: F) -> Self {
        Self {
            closure: Some(closure),
            label: Cow::Borrowed(DEFAULT_LABEL),
        }
    }

    /// Wrap a closure under a caller-chosen label.
    ///
    /// The label is what shows up in worker logs when this task fails or
    /// panics, so distinct submission sites benefit from distinct names.
    pub fn with_name<S: Into<String>>(closure: F, name: S) -> Self {
        Self {
            closure: Some(closure),
            label: Cow::Owned(name.into()),
        }
    }
}

impl<F> Task for ClosureTask<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    fn execute(&mut self) -> Result<()> {
        match self.closure.take() {
            Some(closure) => closure(),
            None => Err(DispatchError::execution(
                self.label.clone(),
                "task already executed - cannot execute twice",
            )),
        }
    }

    fn task_type(&self) -> &str {
        &self.label
    }
}
