//! The synchronized queue behind every dispatcher.
//!
//! One [`TaskQueue`] holds every class of submitted work in a single
//! ordered structure, guarded by one mutex. Workers and the timer thread
//! share it; overflow behavior for bounded configurations is selected with
//! [`OverflowPolicy`].

mod overflow;
mod task_queue;

pub use overflow::OverflowPolicy;
pub use task_queue::{State, TaskQueue};
