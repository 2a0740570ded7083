//! Protocol-agnostic request handling.
//!
//! [`RequestHandler`] is the surface a transport adapter (JSON-RPC, gRPC,
//! REST) calls into; [`DefaultRequestHandler`] wires the task manager, queue
//! registry, executor and push sender together and owns the per-execution
//! event pump.

mod default_request_handler;
mod request_handler;

pub use default_request_handler::DefaultRequestHandler;
pub use request_handler::{EventStream, RequestHandler};
