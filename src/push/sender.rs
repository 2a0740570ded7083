use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::a2a::{PushNotificationConfig, Task};
use crate::errors::ServerResult;
use crate::push::PushNotificationConfigStore;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Transport behind [`PushNotificationSender`]; mockable in tests.
#[async_trait]
pub trait PushDeliverer: Send + Sync {
    async fn deliver(&self, config: &PushNotificationConfig, task: &Task) -> ServerResult<()>;
}

/// Webhook delivery over HTTP POST.
///
/// The body is the task snapshot as JSON. When the config carries a token it
/// is echoed in `X-A2A-Notification-Token`, and the request is signed with
/// `X-A2A-Notification-Signature`: hex SHA-256 over body bytes followed by
/// the token, so the receiver can check both integrity and origin.
pub struct HttpPushDeliverer {
    client: reqwest::Client,
}

impl HttpPushDeliverer {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpPushDeliverer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushDeliverer for HttpPushDeliverer {
    async fn deliver(&self, config: &PushNotificationConfig, task: &Task) -> ServerResult<()> {
        let body = serde_json::to_vec(task)?;
        let mut request = self
            .client
            .post(&config.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(token) = &config.token {
            request = request
                .header("X-A2A-Notification-Token", token)
                .header("X-A2A-Notification-Signature", sign(&body, token));
        }
        request.body(body).send().await?.error_for_status()?;
        Ok(())
    }
}

fn sign(body: &[u8], token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hasher.update(token.as_bytes());
    hasher.finalize().iter().fold(
        String::with_capacity(64),
        |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        },
    )
}

/// Sends the current task snapshot to the task's registered webhook, if any.
///
/// Retries transient failures with exponential backoff, then gives up with a
/// log line. Failures never propagate to task state.
pub struct PushNotificationSender {
    configs: Arc<dyn PushNotificationConfigStore>,
    deliverer: Arc<dyn PushDeliverer>,
    max_attempts: u32,
    base_delay: Duration,
}

impl PushNotificationSender {
    pub fn new(
        configs: Arc<dyn PushNotificationConfigStore>,
        deliverer: Arc<dyn PushDeliverer>,
    ) -> Self {
        Self {
            configs,
            deliverer,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    /// Override the retry schedule. `max_attempts` counts the first try.
    pub fn with_retry(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_delay = base_delay;
        self
    }

    /// Notify the task's webhook about its current snapshot. A task without
    /// a registered config is skipped silently.
    pub async fn notify(&self, task: &Task) {
        let config = match self.configs.get(&task.id).await {
            Ok(Some(config)) => config,
            Ok(None) => return,
            Err(error) => {
                tracing::warn!(task_id = %task.id, %error, "push config lookup failed");
                return;
            }
        };

        let mut delay = self.base_delay;
        for attempt in 1..=self.max_attempts {
            match self.deliverer.deliver(&config, task).await {
                Ok(()) => {
                    tracing::debug!(task_id = %task.id, url = %config.url, "push notification delivered");
                    return;
                }
                Err(error) if attempt < self.max_attempts => {
                    tracing::warn!(
                        task_id = %task.id,
                        url = %config.url,
                        attempt,
                        %error,
                        "push notification attempt failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(error) => {
                    tracing::error!(
                        task_id = %task.id,
                        url = %config.url,
                        attempts = self.max_attempts,
                        %error,
                        "push notification abandoned"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::Task;
    use crate::errors::ServerError;
    use crate::push::InMemoryPushNotificationConfigStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Deliverer that fails the first `failures` calls, then succeeds.
    struct FlakyDeliverer {
        calls: AtomicU32,
        failures: u32,
    }

    impl FlakyDeliverer {
        fn new(failures: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
            }
        }
    }

    #[async_trait]
    impl PushDeliverer for FlakyDeliverer {
        async fn deliver(
            &self,
            _config: &PushNotificationConfig,
            _task: &Task,
        ) -> ServerResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(ServerError::DeliveryFailure {
                    url: "https://client.example/hook".to_string(),
                    reason: "connection refused".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    async fn store_with_config(task_id: &str) -> Arc<InMemoryPushNotificationConfigStore> {
        let store = Arc::new(InMemoryPushNotificationConfigStore::new());
        store
            .set(
                task_id,
                PushNotificationConfig {
                    id: None,
                    url: "https://client.example/hook".to_string(),
                    token: Some("secret".to_string()),
                    authentication: None,
                },
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn notify_without_config_makes_no_delivery() {
        let store = Arc::new(InMemoryPushNotificationConfigStore::new());
        let deliverer = Arc::new(FlakyDeliverer::new(0));
        let sender = PushNotificationSender::new(store, deliverer.clone());

        sender.notify(&Task::new("t1", "ctx1")).await;
        assert_eq!(deliverer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn notify_retries_transient_failures() {
        let store = store_with_config("t1").await;
        let deliverer = Arc::new(FlakyDeliverer::new(2));
        let sender = PushNotificationSender::new(store, deliverer.clone())
            .with_retry(3, Duration::from_millis(1));

        sender.notify(&Task::new("t1", "ctx1")).await;
        assert_eq!(deliverer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn notify_gives_up_after_max_attempts() {
        let store = store_with_config("t1").await;
        let deliverer = Arc::new(FlakyDeliverer::new(u32::MAX));
        let sender = PushNotificationSender::new(store, deliverer.clone())
            .with_retry(2, Duration::from_millis(1));

        // Must return rather than error or loop forever.
        sender.notify(&Task::new("t1", "ctx1")).await;
        assert_eq!(deliverer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn signature_is_hex_sha256_over_body_and_token() {
        let sig = sign(b"{}", "secret");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        // Deterministic for identical inputs, distinct for different tokens.
        assert_eq!(sig, sign(b"{}", "secret"));
        assert_ne!(sig, sign(b"{}", "other"));
    }
}
