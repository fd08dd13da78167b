//! Core types and traits for the dispatch queue

pub mod entry;
pub mod error;
pub mod task;

pub use entry::{Class, TaskEntry};
pub use error::{DispatchError, Result};
pub use task::{BoxedTask, ClosureTask, Task};
