use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::a2a::{
    MessageSendParams, SendMessageResult, Task, TaskIdParams, TaskPushNotificationConfig,
    TaskQueryParams,
};
use crate::errors::ServerResult;
use crate::events::Event;

/// Finite stream of events for one streaming request.
pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send + 'static>>;

/// The operations a transport adapter maps protocol methods onto.
///
/// Implementations are transport-agnostic: they speak in the wire types and
/// leave serialization and framing to the adapter.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// `message/send`: run the executor and return the outcome.
    ///
    /// Blocks until the task reaches a terminal or interrupting state, or
    /// the executor answers with a standalone message. With
    /// `configuration.blocking == false` it returns the task snapshot as
    /// soon as the execution has been admitted.
    async fn send_message(&self, params: MessageSendParams) -> ServerResult<SendMessageResult>;

    /// `message/stream`: run the executor and stream every event, starting
    /// with the task snapshot, ending with the final event.
    async fn send_message_stream(&self, params: MessageSendParams) -> ServerResult<EventStream>;

    /// `tasks/get`: current snapshot, with history optionally truncated to
    /// the most recent `history_length` messages.
    async fn get_task(&self, params: TaskQueryParams) -> ServerResult<Task>;

    /// `tasks/cancel`: request cooperative cancellation and persist the
    /// `canceled` state. Terminal tasks are rejected.
    async fn cancel_task(&self, params: TaskIdParams) -> ServerResult<Task>;

    /// `tasks/resubscribe`: reattach to a running task's event stream. For a
    /// task with no live execution the stream carries a single snapshot.
    async fn resubscribe(&self, params: TaskIdParams) -> ServerResult<EventStream>;

    /// `tasks/pushNotificationConfig/set`: register (or replace) the
    /// webhook config for an existing task.
    async fn set_push_notification_config(
        &self,
        params: TaskPushNotificationConfig,
    ) -> ServerResult<TaskPushNotificationConfig>;

    /// `tasks/pushNotificationConfig/get`.
    async fn get_push_notification_config(
        &self,
        params: TaskIdParams,
    ) -> ServerResult<Option<TaskPushNotificationConfig>>;

    /// `tasks/pushNotificationConfig/delete`. Idempotent.
    async fn delete_push_notification_config(&self, params: TaskIdParams) -> ServerResult<()>;
}
