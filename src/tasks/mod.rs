//! Task lifecycle and persistence.
//!
//! [`TaskManager`] is the sole writer of [`TaskStore`] entries: it resolves an
//! inbound message to a new or continued task, applies queue events to durable
//! state (validating every status transition against [`lifecycle`]), and
//! performs cancellation. [`TaskUpdater`] is the executor-side counterpart
//! that enqueues well-formed events for a task.

pub mod lifecycle;

mod in_memory_task_store;
mod task_manager;
mod task_store;
mod task_updater;

pub use in_memory_task_store::InMemoryTaskStore;
pub use task_manager::{TaskManager, TaskResolution};
pub use task_store::TaskStore;
pub use task_updater::TaskUpdater;
