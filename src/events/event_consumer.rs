use std::sync::Arc;

use futures::Stream;

use crate::events::{Event, EventQueue};

/// Adapts a queue (usually a tap) into a finite event stream.
///
/// The stream ends after yielding a final event, or when the queue closes
/// and drains. The final event itself is always delivered. Dropping the
/// stream closes the underlying queue, so an abandoned tap stops buffering
/// and never backpressures the producer.
pub struct EventConsumer {
    queue: Arc<EventQueue>,
}

impl EventConsumer {
    pub fn new(queue: Arc<EventQueue>) -> Self {
        Self { queue }
    }

    pub fn into_stream(self) -> impl Stream<Item = Event> + Send {
        let queue = CloseOnDrop(self.queue);
        async_stream::stream! {
            loop {
                let Some(event) = queue.0.dequeue().await else {
                    break;
                };
                let done = event.is_final();
                yield event;
                if done {
                    break;
                }
            }
        }
    }
}

/// Detaches the queue when its subscriber goes away, whether the stream
/// finished or was dropped mid-flight.
struct CloseOnDrop(Arc<EventQueue>);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::{Message, TaskState, TaskStatus, TaskStatusUpdateEvent};
    use futures::StreamExt;
    use std::time::Duration;

    fn status(state: TaskState, is_final: bool) -> Event {
        Event::StatusUpdate(TaskStatusUpdateEvent::new(
            "t1",
            "ctx",
            TaskStatus::new(state),
            is_final,
        ))
    }

    #[tokio::test]
    async fn stream_ends_after_the_final_event() {
        let queue = Arc::new(EventQueue::new());
        queue.enqueue(status(TaskState::Working, false)).await.unwrap();
        queue.enqueue(status(TaskState::Completed, true)).await.unwrap();
        // Anything after a final event is not delivered.
        queue
            .enqueue(Event::Message(Message::agent_text("late")))
            .await
            .unwrap();

        let events: Vec<Event> = EventConsumer::new(queue).into_stream().collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_final());
    }

    #[tokio::test]
    async fn stream_ends_when_the_queue_closes() {
        let queue = Arc::new(EventQueue::new());
        queue.enqueue(status(TaskState::Working, false)).await.unwrap();
        queue.close();

        let events: Vec<Event> = EventConsumer::new(queue).into_stream().collect().await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn dropping_the_stream_detaches_the_tap() {
        let queue = Arc::new(EventQueue::with_capacity(1));
        let tap = queue.tap();
        drop(EventConsumer::new(tap.clone()).into_stream());
        assert!(tap.is_closed());

        // With the tap abandoned, the producer must not stall on its full
        // buffer; only the primary consumer applies backpressure.
        let produce_and_consume = async {
            for _ in 0..3 {
                queue
                    .enqueue(Event::Message(Message::agent_text("tick")))
                    .await
                    .unwrap();
                assert!(queue.dequeue().await.is_some());
            }
        };
        tokio::time::timeout(Duration::from_secs(1), produce_and_consume)
            .await
            .expect("producer stalled on an abandoned tap");
    }
}
