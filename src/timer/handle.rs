//! Handles for recurring schedules

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SCHEDULE_ID: AtomicU64 = AtomicU64::new(1);

/// Generates a unique schedule ID
fn next_schedule_id() -> u64 {
    NEXT_SCHEDULE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A handle to a recurring schedule registered on a dispatcher.
///
/// Cancellation only signals: the schedule is retired the next time its
/// deadline surfaces in the timer loop, so one firing may already be in
/// flight when `cancel` returns.
///
/// # Example
///
/// ```rust
/// use dispatch_queue::dispatch::Dispatcher;
/// use std::time::Duration;
///
/// let dispatcher = Dispatcher::new("metrics").unwrap();
/// let handle = dispatcher
///     .schedule_on_interval(|| Ok(()), Duration::from_millis(100))
///     .unwrap();
///
/// assert!(!handle.is_cancelled());
/// handle.cancel();
/// assert!(handle.is_cancelled());
/// ```
#[derive(Clone, Debug)]
pub struct ScheduleHandle {
    schedule_id: u64,
    cancelled: Arc<AtomicBool>,
}

impl ScheduleHandle {
    /// Create a new handle with a unique ID
    pub(crate) fn new() -> Self {
        Self {
            schedule_id: next_schedule_id(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the unique schedule ID
    pub fn schedule_id(&self) -> u64 {
        self.schedule_id
    }

    /// Stop future firings of this schedule
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if this schedule has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
