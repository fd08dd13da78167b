//! Error types for the dispatch queue

/// Result type for dispatch queue operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors that can occur in the dispatch queue
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DispatchError {
    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// Queue no longer accepts work (shutdown has begun)
    #[error("Dispatch queue '{queue_name}' is closed to new work")]
    QueueClosed {
        /// Name of the dispatch queue
        queue_name: String,
    },

    /// Queue is at capacity under a rejecting overflow policy
    #[error("Dispatch queue '{queue_name}' is full: {capacity} tasks queued")]
    QueueFull {
        /// Name of the dispatch queue
        queue_name: String,
        /// Configured capacity
        capacity: usize,
    },

    /// Failed to spawn a worker or timer thread
    #[error("Failed to spawn thread '{thread_name}': {message}")]
    SpawnError {
        /// Name of the thread that failed to spawn
        thread_name: String,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a worker or timer thread
    #[error("Failed to join thread '{thread_name}': {message}")]
    JoinError {
        /// Name of the thread that failed to join
        thread_name: String,
        /// Error message
        message: String,
    },

    /// Task execution failed
    #[error("Task execution failed ({task_label}): {message}")]
    ExecutionError {
        /// Label of the failed task
        task_label: String,
        /// Error message
        message: String,
    },
}

impl DispatchError {
    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        DispatchError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a queue closed error
    pub fn queue_closed(queue_name: impl Into<String>) -> Self {
        DispatchError::QueueClosed {
            queue_name: queue_name.into(),
        }
    }

    /// Create a queue full error
    pub fn queue_full(queue_name: impl Into<String>, capacity: usize) -> Self {
        DispatchError::QueueFull {
            queue_name: queue_name.into(),
            capacity,
        }
    }

    /// Create a spawn error
    pub fn spawn(thread_name: impl Into<String>, message: impl Into<String>) -> Self {
        DispatchError::SpawnError {
            thread_name: thread_name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread_name: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        DispatchError::SpawnError {
            thread_name: thread_name.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread_name: impl Into<String>, message: impl Into<String>) -> Self {
        DispatchError::JoinError {
            thread_name: thread_name.into(),
            message: message.into(),
        }
    }

    /// Create an execution error
    pub fn execution(task_label: impl Into<String>, message: impl Into<String>) -> Self {
        DispatchError::ExecutionError {
            task_label: task_label.into(),
            message: message.into(),
        }
    }
}
