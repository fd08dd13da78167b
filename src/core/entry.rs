//! Tagged queue entries and their execution order
//!
//! Every submission becomes a [`TaskEntry`] carrying a [`Class`] tag and a
//! global sequence number. One comparison covers the whole queue: all
//! prioritized entries run before all FIFO entries, prioritized entries
//! order by rank (lower first) then sequence, and FIFO entries order by
//! sequence alone.

use super::task::BoxedTask;
use std::cmp::Ordering;

/// Classification of a queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    /// Runs before all FIFO work; rank 0 is the most urgent
    Prioritized {
        /// Urgency rank, lower runs sooner
        rank: u8,
    },
    /// Runs in submission order once no prioritized work remains
    Fifo,
}

impl Class {
    /// Whether this entry belongs to the FIFO sequence
    pub fn is_fifo(&self) -> bool {
        matches!(self, Class::Fifo)
    }

    /// Key encoding the run-sooner order: smaller keys run sooner
    fn order_key(&self) -> (u8, u8) {
        match *self {
            Class::Prioritized { rank } => (0, rank),
            Class::Fifo => (1, 0),
        }
    }
}

/// A task together with its class tag and submission sequence
pub struct TaskEntry {
    pub(crate) class: Class,
    pub(crate) task: BoxedTask,
    /// Sequence number for FIFO ordering within the same class and rank
    pub(crate) sequence: u64,
}

impl TaskEntry {
    /// Create a new task entry
    pub fn new(class: Class, task: BoxedTask, sequence: u64) -> Self {
        Self {
            class,
            task,
            sequence,
        }
    }

    /// Get the class of this entry
    pub fn class(&self) -> Class {
        self.class
    }

    /// Get the sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Consume the entry, yielding the task to execute
    pub fn into_task(self) -> BoxedTask {
        self.task
    }
}

/// Ordering for task entries in the heap.
/// Prioritized entries come before FIFO entries, lower rank before higher;
/// within the same class and rank, earlier sequence (FIFO) comes first.
impl PartialEq for TaskEntry {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.sequence == other.sequence
    }
}

impl Eq for TaskEntry {}

impl PartialOrd for TaskEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaskEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // First compare by class and rank (smaller key runs sooner)
        match self.class.order_key().cmp(&other.class.order_key()) {
            Ordering::Equal => {
                // If class and rank are equal, earlier sequence comes first (FIFO)
                // Reverse the comparison because BinaryHeap is a max-heap
                other.sequence.cmp(&self.sequence)
            }
            // Reverse here as well so the soonest entry is the heap maximum
            ord => ord.reverse(),
        }
    }
}
