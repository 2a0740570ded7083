use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::task_store::TaskStore;
use crate::a2a::Task;
use crate::errors::ServerResult;

/// In-memory [`TaskStore`] for development and testing.
///
/// Thread-safe via an `RwLock`ed map; tasks accumulate until deleted, so
/// production deployments should use a database-backed implementation.
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored tasks. Primarily useful in tests.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Drop all stored tasks.
    pub async fn clear(&self) {
        self.tasks.write().await.clear();
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get_task(&self, task_id: &str) -> ServerResult<Option<Task>> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }

    async fn save_task(&self, task: &Task) -> ServerResult<()> {
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> ServerResult<()> {
        self.tasks.write().await.remove(task_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::{Artifact, Message, Part, TaskState, TaskStatus};

    #[tokio::test]
    async fn save_then_get_returns_an_identical_task() {
        let store = InMemoryTaskStore::new();

        let mut task = Task::new("t1", "ctx1");
        task.status = TaskStatus::new(TaskState::Working);
        task.history
            .push(Message::user_text("do the thing").for_task("t1", "ctx1"));
        task.artifacts
            .push(Artifact::new("a1", vec![Part::text("partial")]));
        task.metadata = Some(
            [("source".to_string(), serde_json::json!("test"))]
                .into_iter()
                .collect(),
        );

        store.save_task(&task).await.unwrap();
        let loaded = store.get_task("t1").await.unwrap().unwrap();
        assert_eq!(loaded, task);
    }

    #[tokio::test]
    async fn get_unknown_task_returns_none() {
        let store = InMemoryTaskStore::new();
        assert!(store.get_task("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_overwrites_existing_task() {
        let store = InMemoryTaskStore::new();
        let mut task = Task::new("t1", "ctx1");
        store.save_task(&task).await.unwrap();

        task.status = TaskStatus::new(TaskState::Completed);
        store.save_task(&task).await.unwrap();

        let loaded = store.get_task("t1").await.unwrap().unwrap();
        assert_eq!(loaded.status.state, TaskState::Completed);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryTaskStore::new();
        store.save_task(&Task::new("t1", "ctx1")).await.unwrap();

        store.delete_task("t1").await.unwrap();
        store.delete_task("t1").await.unwrap();
        assert!(store.is_empty().await);
    }
}
