//! A2A protocol data model.
//!
//! The structures here mirror the A2A JSON schema for the slice of the
//! protocol the server runtime needs: tasks, messages, artifacts, the two
//! streaming update events, push-notification configuration and the
//! parameter/result shapes of the request-handler operations. Wire encoding
//! (JSON-RPC envelopes, gRPC messages) is a transport concern and lives
//! outside this crate.

mod types;

pub use types::*;
