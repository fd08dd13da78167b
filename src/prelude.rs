//! Convenient re-exports for common types and traits

pub use crate::core::{BoxedTask, Class, ClosureTask, DispatchError, Result, Task};
pub use crate::dispatch::{Dispatcher, DispatcherConfig, DispatcherStats, WorkerStats};
pub use crate::queue::OverflowPolicy;
pub use crate::timer::ScheduleHandle;
pub use crate::tracing::TracedTask;
