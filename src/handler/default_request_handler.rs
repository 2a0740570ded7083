use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::request_handler::{EventStream, RequestHandler};
use crate::a2a::{
    Message, MessageSendParams, SendMessageResult, Task, TaskIdParams, TaskPushNotificationConfig,
    TaskQueryParams, TaskState, TaskStatus, TaskStatusUpdateEvent,
};
use crate::errors::{ServerError, ServerResult};
use crate::events::{
    Event, EventConsumer, InMemoryQueueManager, QueueManager, DEFAULT_QUEUE_CAPACITY,
};
use crate::executor::{AgentExecutor, RequestContext};
use crate::push::{
    HttpPushDeliverer, InMemoryPushNotificationConfigStore, PushDeliverer,
    PushNotificationConfigStore, PushNotificationSender,
};
use crate::tasks::{TaskManager, TaskStore};

/// Standard [`RequestHandler`] wiring.
///
/// Owns the per-execution plumbing: admission through the queue registry,
/// the executor invocation, and the event pump that persists each event
/// before any observer sees it.
pub struct DefaultRequestHandler {
    executor: Arc<dyn AgentExecutor>,
    task_manager: Arc<TaskManager>,
    queue_manager: Arc<dyn QueueManager>,
    push_configs: Arc<dyn PushNotificationConfigStore>,
    push_sender: Arc<PushNotificationSender>,
    running: Arc<DashMap<String, CancellationToken>>,
}

impl DefaultRequestHandler {
    pub fn new(executor: Arc<dyn AgentExecutor>, store: Arc<dyn TaskStore>) -> Self {
        let push_configs: Arc<dyn PushNotificationConfigStore> =
            Arc::new(InMemoryPushNotificationConfigStore::new());
        let push_sender = Arc::new(PushNotificationSender::new(
            push_configs.clone(),
            Arc::new(HttpPushDeliverer::new()),
        ));
        Self {
            executor,
            task_manager: Arc::new(TaskManager::new(store)),
            queue_manager: Arc::new(InMemoryQueueManager::new()),
            push_configs,
            push_sender,
            running: Arc::new(DashMap::new()),
        }
    }

    /// Replace the webhook transport, e.g. with a capturing mock in tests.
    pub fn with_push_deliverer(mut self, deliverer: Arc<dyn PushDeliverer>) -> Self {
        self.push_sender = Arc::new(PushNotificationSender::new(
            self.push_configs.clone(),
            deliverer,
        ));
        self
    }

    /// Replace the fully configured push sender, e.g. to tune retries.
    pub fn with_push_sender(mut self, sender: PushNotificationSender) -> Self {
        self.push_sender = Arc::new(sender);
        self
    }

    /// Replace the push config store, e.g. with a database-backed one.
    /// Rebuilds the push sender over the new store.
    pub fn with_push_config_store(mut self, configs: Arc<dyn PushNotificationConfigStore>) -> Self {
        self.push_configs = configs.clone();
        self.push_sender = Arc::new(PushNotificationSender::new(
            configs,
            Arc::new(HttpPushDeliverer::new()),
        ));
        self
    }

    /// Admit and start one execution; both send operations share this.
    ///
    /// The returned receiver yields the task snapshot first, then every
    /// event the pump accepted, ending with the final one. Admission
    /// (queue creation) happens before any task state is written, so a
    /// rejected duplicate send leaves no trace.
    async fn start_execution(
        &self,
        params: MessageSendParams,
    ) -> ServerResult<(String, mpsc::Receiver<Event>)> {
        let resolution = self.task_manager.resolve(&params.message).await?;
        let task_id = resolution.task_id.clone();
        let context_id = resolution.context_id.clone();

        let queue = self.queue_manager.create(&task_id).await?;

        let persisted = match resolution.existing {
            Some(task) => self.task_manager.continue_task(task, &params.message).await,
            None => {
                self.task_manager
                    .create_task(&task_id, &context_id, &params.message)
                    .await
            }
        };
        let task = match persisted {
            Ok(task) => task,
            Err(error) => {
                self.queue_manager.close(&task_id).await;
                return Err(error);
            }
        };

        if let Some(config) = params
            .configuration
            .as_ref()
            .and_then(|c| c.push_notification_config.clone())
        {
            if let Err(error) = self.push_configs.set(&task_id, config).await {
                self.queue_manager.close(&task_id).await;
                return Err(error);
            }
        }

        let token = CancellationToken::new();
        self.running.insert(task_id.clone(), token.clone());

        let ctx = RequestContext::new(
            params.message.clone().for_task(&task_id, &context_id),
            &task_id,
            &context_id,
            Some(task.clone()),
            params.metadata.clone().unwrap_or_default(),
            token,
        );

        let (sink_tx, sink_rx) = mpsc::channel(DEFAULT_QUEUE_CAPACITY);
        // Every stream opens with the just-persisted snapshot.
        let _ = sink_tx.send(Event::Task(task)).await;

        // Executor wrapper: a fault becomes a final `failed` status update,
        // and the queue always closes once the executor returns.
        {
            let executor = self.executor.clone();
            let queue = queue.clone();
            let task_id = task_id.clone();
            let context_id = context_id.clone();
            tokio::spawn(async move {
                if let Err(error) = executor.execute(ctx, queue.clone()).await {
                    tracing::error!(task_id = %task_id, %error, "executor failed");
                    let status = TaskStatus::new(TaskState::Failed).with_message(
                        Message::agent_text(error.to_string()).for_task(&task_id, &context_id),
                    );
                    let _ = queue
                        .enqueue(Event::StatusUpdate(TaskStatusUpdateEvent::new(
                            &task_id,
                            &context_id,
                            status,
                            true,
                        )))
                        .await;
                }
                queue.close();
            });
        }

        // Event pump: persist first, then forward. Events the state machine
        // rejects are logged and dropped rather than delivered.
        {
            let task_manager = self.task_manager.clone();
            let queue_manager = self.queue_manager.clone();
            let push_sender = self.push_sender.clone();
            let running = self.running.clone();
            let task_id = task_id.clone();
            tokio::spawn(async move {
                while let Some(event) = queue.dequeue().await {
                    match task_manager.process(&event).await {
                        Ok(()) => {
                            if matches!(event, Event::StatusUpdate(_) | Event::Task(_)) {
                                if let Ok(Some(snapshot)) = task_manager.get_task(&task_id).await {
                                    let push_sender = push_sender.clone();
                                    tokio::spawn(
                                        async move { push_sender.notify(&snapshot).await },
                                    );
                                }
                            }
                            let is_final = event.is_final();
                            let _ = sink_tx.send(event).await;
                            if is_final {
                                break;
                            }
                        }
                        Err(error) => {
                            tracing::warn!(
                                task_id = %task_id,
                                %error,
                                "dropping event rejected by task state"
                            );
                        }
                    }
                }
                queue_manager.close(&task_id).await;
                running.remove(&task_id);
            });
        }

        Ok((task_id, sink_rx))
    }
}

/// Keep only the most recent `limit` history entries.
fn truncate_history(task: &mut Task, limit: Option<i32>) {
    if let Some(limit) = limit {
        let limit = usize::try_from(limit).unwrap_or(0);
        if task.history.len() > limit {
            let excess = task.history.len() - limit;
            task.history.drain(..excess);
        }
    }
}

#[async_trait]
impl RequestHandler for DefaultRequestHandler {
    async fn send_message(&self, params: MessageSendParams) -> ServerResult<SendMessageResult> {
        let blocking = params
            .configuration
            .as_ref()
            .and_then(|c| c.blocking)
            .unwrap_or(true);
        let history_length = params.configuration.as_ref().and_then(|c| c.history_length);

        let (task_id, mut events) = self.start_execution(params).await?;

        if blocking {
            while let Some(event) = events.recv().await {
                match event {
                    // Standalone reply: the execution's entire answer.
                    Event::Message(message) => return Ok(SendMessageResult::Message(message)),
                    Event::StatusUpdate(update) if update.is_final => break,
                    _ => {}
                }
            }
        }

        let mut task = self.task_manager.require_task(&task_id).await?;
        truncate_history(&mut task, history_length);
        Ok(SendMessageResult::Task(task))
    }

    async fn send_message_stream(&self, params: MessageSendParams) -> ServerResult<EventStream> {
        let (_task_id, events) = self.start_execution(params).await?;
        Ok(Box::pin(ReceiverStream::new(events)))
    }

    async fn get_task(&self, params: TaskQueryParams) -> ServerResult<Task> {
        let mut task = self.task_manager.require_task(&params.id).await?;
        truncate_history(&mut task, params.history_length);
        Ok(task)
    }

    async fn cancel_task(&self, params: TaskIdParams) -> ServerResult<Task> {
        let task = self.task_manager.require_task(&params.id).await?;
        if task.status.state.is_terminal() {
            return Err(ServerError::TaskNotCancelable {
                task_id: params.id.clone(),
                state: format!("{:?}", task.status.state),
            });
        }

        // Signal the executor both cooperatively and explicitly before
        // persisting the transition.
        if let Some(token) = self.running.get(&params.id) {
            token.cancel();
        }
        let live_queue = self.queue_manager.get(&params.id).await;
        if live_queue.is_some() {
            self.executor
                .cancel(&params.id)
                .await
                .map_err(|error| ServerError::ExecutorFailure {
                    reason: error.to_string(),
                })?;
        }

        let task = self.task_manager.cancel(&params.id).await?;

        // Re-announce on the live queue so streaming observers see the
        // terminal event; the pump treats the duplicate as a no-op.
        if let Some(queue) = live_queue {
            let event = Event::StatusUpdate(TaskStatusUpdateEvent::new(
                &task.id,
                &task.context_id,
                task.status.clone(),
                true,
            ));
            let _ = queue.enqueue(event).await;
        }

        Ok(task)
    }

    async fn resubscribe(&self, params: TaskIdParams) -> ServerResult<EventStream> {
        self.task_manager.require_task(&params.id).await?;
        match self.queue_manager.tap(&params.id).await {
            Ok(tap) => Ok(Box::pin(EventConsumer::new(tap).into_stream())),
            // No live execution: a one-shot stream with the stored snapshot,
            // reloaded here in case the queue closed after the check above.
            Err(ServerError::QueueNotFound { .. }) => {
                let task = self.task_manager.require_task(&params.id).await?;
                Ok(Box::pin(futures::stream::once(async move {
                    Event::Task(task)
                })))
            }
            Err(error) => Err(error),
        }
    }

    async fn set_push_notification_config(
        &self,
        params: TaskPushNotificationConfig,
    ) -> ServerResult<TaskPushNotificationConfig> {
        self.task_manager.require_task(&params.task_id).await?;
        self.push_configs
            .set(&params.task_id, params.push_notification_config.clone())
            .await?;
        Ok(params)
    }

    async fn get_push_notification_config(
        &self,
        params: TaskIdParams,
    ) -> ServerResult<Option<TaskPushNotificationConfig>> {
        self.task_manager.require_task(&params.id).await?;
        let config = self.push_configs.get(&params.id).await?;
        Ok(config.map(|config| TaskPushNotificationConfig {
            task_id: params.id.clone(),
            push_notification_config: config,
        }))
    }

    async fn delete_push_notification_config(&self, params: TaskIdParams) -> ServerResult<()> {
        self.task_manager.require_task(&params.id).await?;
        self.push_configs.delete(&params.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_history_keeps_the_most_recent_entries() {
        let mut task = Task::new("t1", "ctx1");
        for i in 0..5 {
            task.history
                .push(Message::user_text(format!("m{i}")).for_task("t1", "ctx1"));
        }

        truncate_history(&mut task, Some(2));
        assert_eq!(task.history.len(), 2);
        assert_eq!(task.history[0].parts[0].as_text(), Some("m3"));
        assert_eq!(task.history[1].parts[0].as_text(), Some("m4"));

        // Negative values behave like zero; None leaves history alone.
        truncate_history(&mut task, Some(-1));
        assert!(task.history.is_empty());
        truncate_history(&mut task, None);
    }
}
