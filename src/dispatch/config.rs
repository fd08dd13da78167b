//! Dispatcher configuration

use crate::core::{DispatchError, Result};
use crate::queue::OverflowPolicy;

/// Configuration for a [`Dispatcher`](crate::dispatch::Dispatcher)
///
/// # Example
///
/// ```rust
/// use dispatch_queue::dispatch::{Dispatcher, DispatcherConfig};
/// use dispatch_queue::queue::OverflowPolicy;
///
/// let config = DispatcherConfig::new("render")
///     .with_threads(4)
///     .with_overflow(OverflowPolicy::Reject { capacity: 1000 });
///
/// let dispatcher = Dispatcher::with_config(config).unwrap();
/// # dispatcher.shutdown().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Dispatcher name; worker and timer threads are named after it
    pub name: String,
    /// Number of worker threads. Must be at least 1.
    ///
    /// With one thread, execution order equals dequeue order and is
    /// strictly serial; this is the only configuration offering
    /// serialization guarantees.
    pub thread_count: usize,
    /// Overflow policy applied to the shared queue.
    /// Default: [`OverflowPolicy::Unbounded`]
    pub overflow: OverflowPolicy,
}

impl DispatcherConfig {
    /// Create a configuration with the given name and one worker thread
    #[must_use]
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            thread_count: 1,
            overflow: OverflowPolicy::default(),
        }
    }

    /// Set the number of worker threads
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_threads(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    /// Set the queue overflow policy
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_overflow(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] for an empty name, a zero
    /// thread count, or a bounding overflow policy with zero capacity.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(DispatchError::invalid_config("name", "must not be empty"));
        }
        if self.thread_count == 0 {
            return Err(DispatchError::invalid_config(
                "thread_count",
                "must be at least 1",
            ));
        }
        if self.overflow.capacity() == Some(0) {
            return Err(DispatchError::invalid_config(
                "overflow",
                "capacity must be at least 1",
            ));
        }
        Ok(())
    }
}
