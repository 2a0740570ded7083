/// Error taxonomy of the server runtime.
///
/// Validation errors (`TaskNotFound`, `TaskAlreadyRunning`,
/// `TaskNotCancelable`, `InvalidTransition`, `QueueNotFound`) are detected
/// before any mutation and returned synchronously without side effects.
/// Executor failures are caught at the execution boundary and converted into a
/// terminal `failed` status event instead of propagating to observers.
/// Delivery failures stay inside the push-notification path and are never
/// surfaced to the operation that caused them.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("Task already running: {task_id}")]
    TaskAlreadyRunning { task_id: String },

    #[error("Task cannot be canceled: {task_id} is already {state}")]
    TaskNotCancelable { task_id: String, state: String },

    #[error("Invalid task state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("No live event queue for task: {task_id}")]
    QueueNotFound { task_id: String },

    #[error("Event queue is closed")]
    QueueClosed,

    #[error("Agent executor failed: {reason}")]
    ExecutorFailure { reason: String },

    #[error("Task store failure during {operation}: {reason}")]
    PersistenceFailure { operation: String, reason: String },

    #[error("Push notification delivery failed for {url}: {reason}")]
    DeliveryFailure { url: String, reason: String },

    #[error("Internal error: {component}: {reason}")]
    Internal { component: String, reason: String },
}

impl ServerError {
    /// True for errors that reject a call before any state was touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::TaskNotFound { .. }
                | Self::TaskAlreadyRunning { .. }
                | Self::TaskNotCancelable { .. }
                | Self::InvalidTransition { .. }
                | Self::QueueNotFound { .. }
        )
    }

    /// True when retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TaskAlreadyRunning { .. }
                | Self::PersistenceFailure { .. }
                | Self::DeliveryFailure { .. }
        )
    }

    /// Coarse grouping for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::TaskNotFound { .. }
            | Self::TaskAlreadyRunning { .. }
            | Self::TaskNotCancelable { .. }
            | Self::InvalidTransition { .. } => "task",

            Self::QueueNotFound { .. } | Self::QueueClosed => "queue",

            Self::ExecutorFailure { .. } => "executor",

            Self::PersistenceFailure { .. } => "store",

            Self::DeliveryFailure { .. } => "push",

            Self::Internal { .. } => "system",
        }
    }
}

/// Convenience type alias used throughout the crate.
pub type ServerResult<T> = std::result::Result<T, ServerError>;

impl From<serde_json::Error> for ServerError {
    fn from(error: serde_json::Error) -> Self {
        ServerError::Internal {
            component: "serde".to_string(),
            reason: error.to_string(),
        }
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(error: reqwest::Error) -> Self {
        ServerError::DeliveryFailure {
            url: error
                .url()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown".to_string()),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_flagged() {
        let err = ServerError::TaskNotFound {
            task_id: "t1".to_string(),
        };
        assert!(err.is_validation());
        assert!(!err.is_retryable());
        assert_eq!(err.category(), "task");

        let err = ServerError::TaskAlreadyRunning {
            task_id: "t1".to_string(),
        };
        assert!(err.is_validation());
        assert!(err.is_retryable());
    }

    #[test]
    fn executor_and_delivery_errors_categorize() {
        let err = ServerError::ExecutorFailure {
            reason: "boom".to_string(),
        };
        assert!(!err.is_validation());
        assert_eq!(err.category(), "executor");

        let err = ServerError::DeliveryFailure {
            url: "https://hook.example".to_string(),
            reason: "503".to_string(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), "push");
    }

    #[test]
    fn display_includes_identifiers() {
        let err = ServerError::InvalidTransition {
            from: "Completed".to_string(),
            to: "Working".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid task state transition: Completed -> Working"
        );
    }
}
