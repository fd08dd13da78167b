//! # Dispatch Queue
//!
//! A named in-process task dispatcher: a bounded set of worker threads pulls
//! deferred work from one synchronized queue, with priority lanes and
//! interval-based re-submission.
//!
//! ## Features
//!
//! - **Worker Pool**: Fixed set of named worker threads started eagerly at construction
//! - **Priority Lanes**: Prioritized tasks always run before FIFO tasks; lower rank runs sooner
//! - **Interval Scheduling**: Recurring tasks served by a single timer thread per dispatcher
//! - **Overflow Policies**: Unbounded by default, with reject, block, and drop-oldest options
//! - **Panic Isolation**: A failing or panicking task is caught and counted; its worker lives on
//! - **Two Shutdown Modes**: Graceful drain or abrupt stop with an observable discard count
//!
//! ## Quick Start
//!
//! ```rust
//! use dispatch_queue::prelude::*;
//!
//! # fn main() -> Result<()> {
//! // Construction starts the workers; there is no separate start step
//! let dispatcher = Dispatcher::with_threads("encode", 4)?;
//!
//! // FIFO submission
//! for i in 0..10 {
//!     dispatcher.dispatch_fn(move || {
//!         println!("task {} executing", i);
//!         Ok(())
//!     })?;
//! }
//!
//! // Prioritized submission: rank 0 runs before everything else queued
//! dispatcher.dispatch_fn_with_priority(|| Ok(()), 0)?;
//!
//! // Drain the backlog and join every owned thread
//! dispatcher.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Recurring Work
//!
//! ```rust
//! use dispatch_queue::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let dispatcher = Dispatcher::new("metrics")?;
//!
//! // First firing is immediate, then every 100ms
//! let handle = dispatcher.schedule_on_interval(|| Ok(()), Duration::from_millis(100))?;
//!
//! // Recurring schedules can be cancelled individually
//! handle.cancel();
//! # dispatcher.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Tasks
//!
//! ```rust
//! use dispatch_queue::prelude::*;
//!
//! struct EncodeFrame {
//!     frame: u64,
//! }
//!
//! impl Task for EncodeFrame {
//!     fn execute(&mut self) -> Result<()> {
//!         println!("encoding frame {}", self.frame);
//!         Ok(())
//!     }
//!
//!     fn task_type(&self) -> &str {
//!         "EncodeFrame"
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let dispatcher = Dispatcher::new("encode")?;
//! dispatcher.dispatch(EncodeFrame { frame: 42 })?;
//! # dispatcher.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## The `empty()` Quirk
//!
//! [`Dispatcher::empty`] reports only the FIFO backlog. It returns `true`
//! even while prioritized work is still pending; this asymmetry is part of
//! the observable contract. Use [`Dispatcher::pending`] for the whole queue.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod dispatch;
pub mod prelude;
pub mod queue;
pub mod timer;
pub mod tracing;

pub use crate::core::{BoxedTask, ClosureTask, DispatchError, Result, Task};
pub use crate::dispatch::{Dispatcher, DispatcherConfig, DispatcherStats, WorkerStats};
pub use crate::queue::OverflowPolicy;
pub use crate::timer::ScheduleHandle;
