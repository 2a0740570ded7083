use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::errors::{ServerError, ServerResult};
use crate::events::EventQueue;

/// Registry of live event queues, keyed by task id.
///
/// At most one live (non-closed) queue exists per task id at a time; this is
/// the mutual exclusion that makes concurrent `message/send` calls for the
/// same task safe. A closed queue left in the registry counts as absent.
#[async_trait]
pub trait QueueManager: Send + Sync {
    /// Create the live queue for a task. Fails with
    /// [`ServerError::TaskAlreadyRunning`] if one already exists; a closed
    /// leftover queue is replaced.
    async fn create(&self, task_id: &str) -> ServerResult<Arc<EventQueue>>;

    /// The live queue for a task, if any.
    async fn get(&self, task_id: &str) -> Option<Arc<EventQueue>>;

    /// Tap the live queue for a task, for resubscription. Fails with
    /// [`ServerError::QueueNotFound`] when no live queue exists.
    async fn tap(&self, task_id: &str) -> ServerResult<Arc<EventQueue>>;

    /// Close and deregister the task's queue. No-op for unknown ids.
    async fn close(&self, task_id: &str);
}

/// [`QueueManager`] over a [`DashMap`]; suitable for a single-process server.
pub struct InMemoryQueueManager {
    queues: DashMap<String, Arc<EventQueue>>,
}

impl InMemoryQueueManager {
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
        }
    }
}

impl Default for InMemoryQueueManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueManager for InMemoryQueueManager {
    async fn create(&self, task_id: &str) -> ServerResult<Arc<EventQueue>> {
        // Entry holds the shard lock, so two racing creates serialize here.
        match self.queues.entry(task_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_closed() {
                    return Err(ServerError::TaskAlreadyRunning {
                        task_id: task_id.to_string(),
                    });
                }
                let queue = Arc::new(EventQueue::new());
                occupied.insert(queue.clone());
                Ok(queue)
            }
            Entry::Vacant(vacant) => {
                let queue = Arc::new(EventQueue::new());
                vacant.insert(queue.clone());
                Ok(queue)
            }
        }
    }

    async fn get(&self, task_id: &str) -> Option<Arc<EventQueue>> {
        self.queues
            .get(task_id)
            .map(|entry| entry.value().clone())
            .filter(|queue| !queue.is_closed())
    }

    async fn tap(&self, task_id: &str) -> ServerResult<Arc<EventQueue>> {
        match self.get(task_id).await {
            Some(queue) => Ok(queue.tap()),
            None => Err(ServerError::QueueNotFound {
                task_id: task_id.to_string(),
            }),
        }
    }

    async fn close(&self, task_id: &str) {
        if let Some((_, queue)) = self.queues.remove(task_id) {
            queue.close();
        }
    }
}
