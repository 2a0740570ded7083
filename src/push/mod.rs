//! Push notifications: webhook delivery of task snapshots.
//!
//! Clients register a [`PushNotificationConfig`](crate::a2a::PushNotificationConfig)
//! per task; the runtime POSTs the task snapshot to the configured URL after
//! every persisted status change. Delivery is best-effort with bounded
//! retries and never affects task state.

mod config_store;
mod sender;

pub use config_store::{InMemoryPushNotificationConfigStore, PushNotificationConfigStore};
pub use sender::{HttpPushDeliverer, PushDeliverer, PushNotificationSender};
