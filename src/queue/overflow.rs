//! Overflow policies for bounded dispatch queues.
//!
//! This module provides configurable policies for handling queue-full
//! scenarios, enabling graceful degradation under load.
//!
//! # Policies
//!
//! - [`OverflowPolicy::Unbounded`]: No capacity limit (default)
//! - [`OverflowPolicy::Reject`]: Return an error immediately when at capacity
//! - [`OverflowPolicy::Block`]: Block the submitter until space is available
//! - [`OverflowPolicy::DropOldest`]: Evict the oldest queued entry to make room
//!
//! # Example
//!
//! ```rust
//! use dispatch_queue::dispatch::DispatcherConfig;
//! use dispatch_queue::queue::OverflowPolicy;
//!
//! // Reject new work once 1000 tasks are queued
//! let config = DispatcherConfig::new("ingest")
//!     .with_overflow(OverflowPolicy::Reject { capacity: 1000 });
//! ```

/// Policy for handling submissions when the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// No capacity limit; submissions always succeed while running (default).
    Unbounded,

    /// Return an error immediately when the queue holds `capacity` entries.
    Reject {
        /// Maximum number of queued entries
        capacity: usize,
    },

    /// Block the submitting thread until the queue drops below `capacity`.
    ///
    /// A shutdown that begins while a submitter is blocked wakes it with a
    /// closed-queue error.
    Block {
        /// Maximum number of queued entries
        capacity: usize,
    },

    /// Evict the oldest queued entry (by submission order) to make room.
    ///
    /// FIFO entries are evicted before prioritized entries so urgent work
    /// survives; within a class the smallest sequence number goes first.
    /// Evictions are logged and counted in the dispatcher stats.
    DropOldest {
        /// Maximum number of queued entries
        capacity: usize,
    },
}

impl OverflowPolicy {
    /// Returns the capacity limit, or `None` for [`OverflowPolicy::Unbounded`].
    pub fn capacity(&self) -> Option<usize> {
        match *self {
            OverflowPolicy::Unbounded => None,
            OverflowPolicy::Reject { capacity }
            | OverflowPolicy::Block { capacity }
            | OverflowPolicy::DropOldest { capacity } => Some(capacity),
        }
    }

    /// Whether this policy imposes a capacity limit.
    pub fn is_bounded(&self) -> bool {
        self.capacity().is_some()
    }
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self::Unbounded
    }
}
