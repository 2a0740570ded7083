use crate::a2a::Task;
use crate::errors::ServerResult;
use async_trait::async_trait;

/// Storage abstraction for task persistence.
///
/// The runtime treats the store as the single source of truth for task state;
/// [`TaskManager`](super::TaskManager) is its only writer, serialized per task
/// id by the queue registry's single-live-queue invariant. Implementations
/// must make `save_task` atomic per task id and should surface backend
/// outages as [`ServerError::PersistenceFailure`](crate::ServerError), which
/// the runtime returns to the caller without applying partial state.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Retrieve a task by id. Returns `None` if it was never persisted.
    async fn get_task(&self, task_id: &str) -> ServerResult<Option<Task>>;

    /// Create or fully replace a task.
    async fn save_task(&self, task: &Task) -> ServerResult<()>;

    /// Remove a task. Succeeds silently if it doesn't exist (idempotent).
    async fn delete_task(&self, task_id: &str) -> ServerResult<()>;
}
