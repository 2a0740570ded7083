use serde::{Deserialize, Serialize};

use crate::a2a::{Message, Task, TaskArtifactUpdateEvent, TaskStatusUpdateEvent};

/// Everything an executor can publish onto its queue.
///
/// Untagged on the wire: each payload already carries its own `kind`
/// discriminator, so variant order matters for deserialization (the more
/// specific update events before the plain `Task` and `Message` shapes).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Event {
    StatusUpdate(TaskStatusUpdateEvent),
    ArtifactUpdate(TaskArtifactUpdateEvent),
    Task(Task),
    Message(Message),
}

impl Event {
    /// Task id the event belongs to; `None` for a standalone message.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Event::StatusUpdate(e) => Some(&e.task_id),
            Event::ArtifactUpdate(e) => Some(&e.task_id),
            Event::Task(t) => Some(&t.id),
            Event::Message(m) => m.task_id.as_deref(),
        }
    }

    pub fn context_id(&self) -> Option<&str> {
        match self {
            Event::StatusUpdate(e) => Some(&e.context_id),
            Event::ArtifactUpdate(e) => Some(&e.context_id),
            Event::Task(t) => Some(&t.context_id),
            Event::Message(m) => m.context_id.as_deref(),
        }
    }

    /// Whether this event ends the stream it appears on.
    ///
    /// Status updates say so explicitly; a standalone message is itself the
    /// complete response, so it terminates too. Task snapshots and artifact
    /// chunks never do.
    pub fn is_final(&self) -> bool {
        match self {
            Event::StatusUpdate(e) => e.is_final,
            Event::Message(_) => true,
            Event::Task(_) | Event::ArtifactUpdate(_) => false,
        }
    }
}

impl From<TaskStatusUpdateEvent> for Event {
    fn from(e: TaskStatusUpdateEvent) -> Self {
        Event::StatusUpdate(e)
    }
}

impl From<TaskArtifactUpdateEvent> for Event {
    fn from(e: TaskArtifactUpdateEvent) -> Self {
        Event::ArtifactUpdate(e)
    }
}

impl From<Task> for Event {
    fn from(t: Task) -> Self {
        Event::Task(t)
    }
}

impl From<Message> for Event {
    fn from(m: Message) -> Self {
        Event::Message(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::{TaskState, TaskStatus};

    #[test]
    fn serde_distinguishes_variants_by_kind() {
        let status = Event::StatusUpdate(TaskStatusUpdateEvent::new(
            "t1",
            "ctx1",
            TaskStatus::new(TaskState::Working),
            false,
        ));
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["kind"], "status-update");
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, status);

        let task = Event::Task(Task::new("t1", "ctx1"));
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["kind"], "task");
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);

        let message = Event::Message(Message::agent_text("hi"));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["kind"], "message");
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn finality_follows_the_variant() {
        let non_final = Event::StatusUpdate(TaskStatusUpdateEvent::new(
            "t1",
            "ctx1",
            TaskStatus::new(TaskState::Working),
            false,
        ));
        assert!(!non_final.is_final());

        let done = Event::StatusUpdate(TaskStatusUpdateEvent::new(
            "t1",
            "ctx1",
            TaskStatus::new(TaskState::Completed),
            true,
        ));
        assert!(done.is_final());

        assert!(Event::Message(Message::agent_text("bye")).is_final());
        assert!(!Event::Task(Task::new("t1", "ctx1")).is_final());
    }

    #[test]
    fn task_id_is_extracted_from_every_variant() {
        assert_eq!(Event::Task(Task::new("t1", "c")).task_id(), Some("t1"));
        assert_eq!(Event::Message(Message::agent_text("x")).task_id(), None);
        assert_eq!(
            Event::Message(Message::agent_text("x").for_task("t2", "c")).task_id(),
            Some("t2")
        );
    }
}
