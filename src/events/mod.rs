//! Event plumbing between executors and the request handler.
//!
//! Each execution gets one [`EventQueue`]: the executor is the single
//! producer, the handler's event pump is the consumer, and any number of
//! resubscribing clients observe through [`EventQueue::tap`]. The
//! [`QueueManager`] registry enforces at most one live queue per task id,
//! which is what serializes concurrent `message/send` calls for the same
//! task.

mod event;
mod event_consumer;
mod event_queue;
mod queue_manager;

pub use event::Event;
pub use event_consumer::EventConsumer;
pub use event_queue::{EventQueue, DEFAULT_QUEUE_CAPACITY};
pub use queue_manager::{InMemoryQueueManager, QueueManager};
