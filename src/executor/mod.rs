//! The agent-logic boundary.
//!
//! [`AgentExecutor`] is the trait agent developers implement; the runtime
//! never inspects agent logic beyond the events it enqueues. [`RequestContext`]
//! is the read-only view of one invocation handed to `execute`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::a2a::{Message, Task};
use crate::errors::ServerResult;
use crate::events::EventQueue;

/// Immutable context of a single executor invocation.
#[derive(Clone)]
pub struct RequestContext {
    message: Message,
    task_id: String,
    context_id: String,
    current_task: Option<Task>,
    metadata: HashMap<String, serde_json::Value>,
    cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new(
        message: Message,
        task_id: impl Into<String>,
        context_id: impl Into<String>,
        current_task: Option<Task>,
        metadata: HashMap<String, serde_json::Value>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            message,
            task_id: task_id.into(),
            context_id: context_id.into(),
            current_task,
            metadata,
            cancellation,
        }
    }

    /// The message that triggered this invocation.
    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// The task as persisted before this invocation, or `None` when the
    /// message started a brand-new task.
    pub fn current_task(&self) -> Option<&Task> {
        self.current_task.as_ref()
    }

    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Cooperative cancellation signal. Long-running executors should check
    /// it between steps or `select!` on [`CancellationToken::cancelled`].
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Agent logic plugged into the runtime.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Run the agent for one invocation, publishing progress onto `queue`.
    ///
    /// The runtime closes the queue when this returns; an `Err` is turned
    /// into a final `failed` status update on the caller's behalf, so
    /// executors only publish terminal states they reach themselves.
    async fn execute(&self, ctx: RequestContext, queue: Arc<EventQueue>) -> ServerResult<()>;

    /// Acknowledge a cancel request for `task_id`.
    ///
    /// This is a hook for stopping in-flight work (aborting an LLM call,
    /// killing a subprocess). Implementations must NOT enqueue the `canceled`
    /// status update; the runtime applies that transition itself after this
    /// returns. The default implementation relies on the context's
    /// cancellation token alone.
    async fn cancel(&self, task_id: &str) -> ServerResult<()> {
        let _ = task_id;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_exposes_cancellation_state() {
        let token = CancellationToken::new();
        let ctx = RequestContext::new(
            Message::user_text("hi"),
            "t1",
            "ctx1",
            None,
            HashMap::new(),
            token.clone(),
        );
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.task_id(), "t1");
        assert_eq!(ctx.context_id(), "ctx1");
    }
}
