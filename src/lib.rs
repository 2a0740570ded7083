//! Server-side runtime for the A2A (Agent2Agent) protocol.
//!
//! This crate implements the task lifecycle and event-streaming core that sits
//! between a transport adapter (JSON-RPC, gRPC, HTTP+JSON) and an agent
//! computation supplied by the integrator:
//!
//! - [`tasks`] — the durable [`Task`](a2a::Task) model, its state machine, and
//!   the [`TaskManager`] that applies events to persistent state.
//! - [`events`] — the per-task [`EventQueue`] (single producer, multiple
//!   tappable consumers), the [`QueueManager`] registry, and the
//!   [`EventConsumer`] subscriber loop.
//! - [`executor`] — the [`AgentExecutor`] contract the integrator implements.
//! - [`handler`] — the protocol-agnostic [`RequestHandler`] operation set that
//!   transport adapters call into.
//! - [`push`] — best-effort webhook delivery of task status changes.
//!
//! Transports, storage engines and authentication live outside this crate and
//! plug in through the [`TaskStore`], [`AgentExecutor`] and
//! [`PushDeliverer`](push::PushDeliverer) traits.

pub mod a2a;
pub mod errors;
pub mod events;
pub mod executor;
pub mod handler;
pub mod push;
pub mod tasks;

// Re-export the types most integrations touch directly.
pub use errors::{ServerError, ServerResult};
pub use events::{Event, EventConsumer, EventQueue, InMemoryQueueManager, QueueManager};
pub use executor::{AgentExecutor, RequestContext};
pub use handler::{DefaultRequestHandler, EventStream, RequestHandler};
pub use tasks::{InMemoryTaskStore, TaskManager, TaskStore, TaskUpdater};
