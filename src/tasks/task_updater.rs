use std::sync::Arc;

use crate::a2a::{
    Artifact, Message, TaskArtifactUpdateEvent, TaskState, TaskStatus, TaskStatusUpdateEvent,
};
use crate::errors::ServerResult;
use crate::events::{Event, EventQueue};

/// Executor-side helper that publishes well-formed events for one task.
///
/// Executors receive the raw queue, but building status/artifact events by
/// hand repeats the task and context ids on every call. The updater stamps
/// them in, along with the timestamp the status carries.
pub struct TaskUpdater {
    queue: Arc<EventQueue>,
    task_id: String,
    context_id: String,
}

impl TaskUpdater {
    pub fn new(
        queue: Arc<EventQueue>,
        task_id: impl Into<String>,
        context_id: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            task_id: task_id.into(),
            context_id: context_id.into(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Agent-authored message pre-addressed to this task, for use as a
    /// status message or standalone reply.
    pub fn new_agent_message(&self, text: impl Into<String>) -> Message {
        Message::agent_text(text).for_task(&self.task_id, &self.context_id)
    }

    /// Announce the move to `working`.
    pub async fn start_work(&self) -> ServerResult<()> {
        self.update_status(TaskState::Working, None, false).await
    }

    /// Publish a status update. `is_final` marks the end of this stream:
    /// terminal states and the interrupting pauses set it.
    pub async fn update_status(
        &self,
        state: TaskState,
        message: Option<Message>,
        is_final: bool,
    ) -> ServerResult<()> {
        let mut status = TaskStatus::new(state);
        if let Some(message) = message {
            status.message = Some(message.for_task(&self.task_id, &self.context_id));
        }
        self.queue
            .enqueue(Event::StatusUpdate(TaskStatusUpdateEvent::new(
                &self.task_id,
                &self.context_id,
                status,
                is_final,
            )))
            .await
    }

    /// Pause for user input. Interrupting, so the stream ends here.
    pub async fn requires_input(&self, message: Message) -> ServerResult<()> {
        self.update_status(TaskState::InputRequired, Some(message), true)
            .await
    }

    /// Pause for out-of-band authentication.
    pub async fn requires_auth(&self, message: Message) -> ServerResult<()> {
        self.update_status(TaskState::AuthRequired, Some(message), true)
            .await
    }

    /// Publish an artifact (or one chunk of it, with `append`/`last_chunk`).
    pub async fn add_artifact(
        &self,
        artifact: Artifact,
        append: Option<bool>,
        last_chunk: Option<bool>,
    ) -> ServerResult<()> {
        let mut event = TaskArtifactUpdateEvent::new(&self.task_id, &self.context_id, artifact);
        event.append = append;
        event.last_chunk = last_chunk;
        self.queue.enqueue(Event::ArtifactUpdate(event)).await
    }

    pub async fn complete(&self) -> ServerResult<()> {
        self.update_status(TaskState::Completed, None, true).await
    }

    pub async fn complete_with_message(&self, message: Message) -> ServerResult<()> {
        self.update_status(TaskState::Completed, Some(message), true)
            .await
    }

    pub async fn fail(&self, message: Message) -> ServerResult<()> {
        self.update_status(TaskState::Failed, Some(message), true)
            .await
    }

    pub async fn reject(&self, message: Message) -> ServerResult<()> {
        self.update_status(TaskState::Rejected, Some(message), true)
            .await
    }
}
