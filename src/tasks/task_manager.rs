use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::lifecycle;
use super::task_store::TaskStore;
use crate::a2a::{
    Artifact, Message, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus, TaskStatusUpdateEvent,
};
use crate::errors::{ServerError, ServerResult};
use crate::events::Event;

/// Metadata key marking an artifact whose last chunk has arrived.
const ARTIFACT_LAST_CHUNK_KEY: &str = "lastChunk";

/// Outcome of resolving an inbound message against the store: the ids the
/// execution will run under, plus the existing task when this is a
/// continuation.
#[derive(Debug)]
pub struct TaskResolution {
    pub task_id: String,
    pub context_id: String,
    pub existing: Option<Task>,
}

/// Owns the task entity's lifecycle.
///
/// The manager is the sole writer of [`TaskStore`] entries, and every
/// read-modify-write cycle is serialized per task id through an internal
/// lock: a cancel request racing the event pump cannot interleave with a
/// half-applied event for the same task. Events are validated against the
/// state machine in [`lifecycle`] and persisted *before* they are forwarded
/// to any subscriber, so a crash after delivery still leaves durable state
/// consistent.
pub struct TaskManager {
    store: Arc<dyn TaskStore>,
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TaskManager {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            write_locks: DashMap::new(),
        }
    }

    /// Per-task-id write lock. Held across every load-mutate-save cycle.
    async fn write_guard(&self, task_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .write_locks
            .entry(task_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    pub async fn get_task(&self, task_id: &str) -> ServerResult<Option<Task>> {
        self.store.get_task(task_id).await
    }

    /// Like [`get_task`](Self::get_task) but absent tasks are an error.
    pub async fn require_task(&self, task_id: &str) -> ServerResult<Task> {
        self.get_task(task_id)
            .await?
            .ok_or_else(|| ServerError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }

    /// Resolves an inbound message to the task it targets.
    ///
    /// A message without a task id (or with an id the store has never seen)
    /// starts a new task; a message naming a stored task continues it, which
    /// requires the task to be non-terminal. No state is written here, so a
    /// rejected call leaves the store untouched.
    pub async fn resolve(&self, message: &Message) -> ServerResult<TaskResolution> {
        if let Some(task_id) = &message.task_id {
            if let Some(task) = self.get_task(task_id).await? {
                if task.status.state.is_terminal() {
                    return Err(ServerError::InvalidTransition {
                        from: format!("{:?}", task.status.state),
                        to: format!("{:?}", TaskState::Working),
                    });
                }
                return Ok(TaskResolution {
                    task_id: task.id.clone(),
                    context_id: task.context_id.clone(),
                    existing: Some(task),
                });
            }
        }

        let task_id = message
            .task_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let context_id = message
            .context_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Ok(TaskResolution {
            task_id,
            context_id,
            existing: None,
        })
    }

    /// Creates a new task in `Submitted` state with the inbound message as
    /// the first history entry, and persists it.
    pub async fn create_task(
        &self,
        task_id: &str,
        context_id: &str,
        message: &Message,
    ) -> ServerResult<Task> {
        let _guard = self.write_guard(task_id).await;
        let mut task = Task::new(task_id, context_id);
        task.history
            .push(message.clone().for_task(task_id, context_id));
        self.store.save_task(&task).await?;
        tracing::debug!(task_id, context_id, "task created");
        Ok(task)
    }

    /// Continues an existing task with a follow-up message.
    ///
    /// The message is appended to history; a task paused in
    /// `input-required`/`auth-required` moves back to `working`.
    pub async fn continue_task(&self, mut task: Task, message: &Message) -> ServerResult<Task> {
        let _guard = self.write_guard(&task.id).await;
        task.history
            .push(message.clone().for_task(&task.id, &task.context_id));
        if task.status.state.is_interrupting() {
            lifecycle::validate_transition(task.status.state, TaskState::Working)?;
            task.status = TaskStatus::new(TaskState::Working);
        }
        self.store.save_task(&task).await?;
        tracing::debug!(task_id = %task.id, "task continued");
        Ok(task)
    }

    /// Applies one queue event to durable state.
    ///
    /// Returns an error when the event is not acceptable for the task's
    /// current state; the caller decides whether to drop it or fail the
    /// request. Events for tasks the store doesn't know are rejected with
    /// `TaskNotFound`.
    pub async fn process(&self, event: &Event) -> ServerResult<()> {
        let _guard = match event.task_id() {
            Some(task_id) => Some(self.write_guard(task_id).await),
            None => None,
        };
        match event {
            Event::StatusUpdate(update) => self.apply_status(update).await,
            Event::ArtifactUpdate(update) => self.apply_artifact(update).await,
            Event::Message(message) => self.apply_message(message).await,
            Event::Task(snapshot) => self.apply_snapshot(snapshot).await,
        }
    }

    /// Cancels a task: validates it is cancelable, applies the `canceled`
    /// transition and persists. Terminal tasks are rejected with
    /// `TaskNotCancelable` and the store is left untouched.
    pub async fn cancel(&self, task_id: &str) -> ServerResult<Task> {
        let _guard = self.write_guard(task_id).await;
        let mut task = self.require_task(task_id).await?;
        if task.status.state.is_terminal() {
            return Err(ServerError::TaskNotCancelable {
                task_id: task_id.to_string(),
                state: format!("{:?}", task.status.state),
            });
        }
        lifecycle::validate_transition(task.status.state, TaskState::Canceled)?;
        task.status = TaskStatus::new(TaskState::Canceled);
        self.store.save_task(&task).await?;
        tracing::debug!(task_id, "task canceled");
        Ok(task)
    }

    async fn apply_status(&self, update: &TaskStatusUpdateEvent) -> ServerResult<()> {
        let mut task = self.require_task(&update.task_id).await?;
        let from = task.status.state;
        let to = update.status.state;

        if from.is_terminal() {
            if from == to {
                // Duplicate of an already-applied terminal event (e.g. the
                // cancel path re-announcing on the queue); nothing to persist.
                return Ok(());
            }
            return Err(ServerError::InvalidTransition {
                from: format!("{from:?}"),
                to: format!("{to:?}"),
            });
        }
        lifecycle::validate_transition(from, to)?;

        if let Some(message) = &update.status.message {
            task.history
                .push(message.clone().for_task(&task.id, &task.context_id));
        }
        task.status = update.status.clone();
        self.store.save_task(&task).await?;
        tracing::debug!(task_id = %task.id, ?from, ?to, "status transition persisted");
        Ok(())
    }

    async fn apply_artifact(&self, update: &TaskArtifactUpdateEvent) -> ServerResult<()> {
        let mut task = self.require_task(&update.task_id).await?;
        if task.status.state.is_terminal() {
            return Err(ServerError::Internal {
                component: "task_manager".to_string(),
                reason: format!(
                    "task {} is {:?}; artifact updates are no longer accepted",
                    task.id, task.status.state
                ),
            });
        }

        let incoming = &update.artifact;
        let slot = task
            .artifacts
            .iter_mut()
            .find(|a| a.artifact_id == incoming.artifact_id);

        if update.append.unwrap_or(false) {
            let Some(artifact) = slot else {
                return Err(ServerError::Internal {
                    component: "task_manager".to_string(),
                    reason: format!(
                        "append to unknown artifact {} on task {}",
                        incoming.artifact_id, task.id
                    ),
                });
            };
            if artifact_is_complete(artifact) {
                return Err(ServerError::Internal {
                    component: "task_manager".to_string(),
                    reason: format!(
                        "artifact {} on task {} already received its last chunk",
                        incoming.artifact_id, task.id
                    ),
                });
            }
            artifact.parts.extend(incoming.parts.iter().cloned());
            if update.last_chunk.unwrap_or(false) {
                mark_artifact_complete(artifact);
            }
        } else {
            let mut artifact = incoming.clone();
            if update.last_chunk.unwrap_or(false) {
                mark_artifact_complete(&mut artifact);
            }
            match slot {
                Some(existing) => *existing = artifact,
                None => task.artifacts.push(artifact),
            }
        }

        self.store.save_task(&task).await?;
        tracing::debug!(
            task_id = %task.id,
            artifact_id = %incoming.artifact_id,
            "artifact update persisted"
        );
        Ok(())
    }

    async fn apply_message(&self, message: &Message) -> ServerResult<()> {
        // Standalone replies carry no task id and need no persistence.
        let Some(task_id) = &message.task_id else {
            return Ok(());
        };
        let mut task = self.require_task(task_id).await?;
        if task.status.state.is_terminal() {
            return Err(ServerError::Internal {
                component: "task_manager".to_string(),
                reason: format!(
                    "task {} is {:?}; history is no longer accepting messages",
                    task.id, task.status.state
                ),
            });
        }
        task.history
            .push(message.clone().for_task(&task.id, &task.context_id));
        self.store.save_task(&task).await
    }

    async fn apply_snapshot(&self, snapshot: &Task) -> ServerResult<()> {
        match self.get_task(&snapshot.id).await? {
            None => self.store.save_task(snapshot).await,
            Some(existing) => {
                if existing.context_id != snapshot.context_id {
                    return Err(ServerError::Internal {
                        component: "task_manager".to_string(),
                        reason: format!(
                            "snapshot for task {} changes contextId from {} to {}",
                            snapshot.id, existing.context_id, snapshot.context_id
                        ),
                    });
                }
                lifecycle::validate_transition(existing.status.state, snapshot.status.state)?;
                // History is append-only and artifacts never vanish: the
                // snapshot must extend the stored task, not rewrite it.
                if snapshot.history.len() < existing.history.len()
                    || snapshot.history[..existing.history.len()] != existing.history[..]
                {
                    return Err(ServerError::Internal {
                        component: "task_manager".to_string(),
                        reason: format!("snapshot for task {} rewrites history", snapshot.id),
                    });
                }
                for artifact in &existing.artifacts {
                    if !snapshot
                        .artifacts
                        .iter()
                        .any(|a| a.artifact_id == artifact.artifact_id)
                    {
                        return Err(ServerError::Internal {
                            component: "task_manager".to_string(),
                            reason: format!(
                                "snapshot for task {} drops artifact {}",
                                snapshot.id, artifact.artifact_id
                            ),
                        });
                    }
                }
                self.store.save_task(snapshot).await
            }
        }
    }
}

fn artifact_is_complete(artifact: &Artifact) -> bool {
    artifact
        .metadata
        .as_ref()
        .and_then(|m| m.get(ARTIFACT_LAST_CHUNK_KEY))
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

fn mark_artifact_complete(artifact: &mut Artifact) {
    artifact
        .metadata
        .get_or_insert_with(Default::default)
        .insert(ARTIFACT_LAST_CHUNK_KEY.to_string(), serde_json::json!(true));
}
