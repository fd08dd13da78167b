//! Interval scheduling on a single timer thread

mod handle;
mod scheduler;

pub use handle::ScheduleHandle;
pub(crate) use scheduler::Timer;
