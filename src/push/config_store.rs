use async_trait::async_trait;
use dashmap::DashMap;

use crate::a2a::PushNotificationConfig;
use crate::errors::ServerResult;

/// Storage for per-task push notification configs.
///
/// One config per task id; setting a new one replaces the old. Deleting is
/// idempotent.
#[async_trait]
pub trait PushNotificationConfigStore: Send + Sync {
    async fn set(&self, task_id: &str, config: PushNotificationConfig) -> ServerResult<()>;

    async fn get(&self, task_id: &str) -> ServerResult<Option<PushNotificationConfig>>;

    async fn delete(&self, task_id: &str) -> ServerResult<()>;
}

/// In-memory config store for development and testing.
pub struct InMemoryPushNotificationConfigStore {
    configs: DashMap<String, PushNotificationConfig>,
}

impl InMemoryPushNotificationConfigStore {
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
        }
    }
}

impl Default for InMemoryPushNotificationConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushNotificationConfigStore for InMemoryPushNotificationConfigStore {
    async fn set(&self, task_id: &str, config: PushNotificationConfig) -> ServerResult<()> {
        self.configs.insert(task_id.to_string(), config);
        Ok(())
    }

    async fn get(&self, task_id: &str) -> ServerResult<Option<PushNotificationConfig>> {
        Ok(self.configs.get(task_id).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, task_id: &str) -> ServerResult<()> {
        self.configs.remove(task_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> PushNotificationConfig {
        PushNotificationConfig {
            id: None,
            url: url.to_string(),
            token: None,
            authentication: None,
        }
    }

    #[tokio::test]
    async fn set_replaces_and_delete_is_idempotent() {
        let store = InMemoryPushNotificationConfigStore::new();
        assert!(store.get("t1").await.unwrap().is_none());

        store.set("t1", config("https://a.example/hook")).await.unwrap();
        store.set("t1", config("https://b.example/hook")).await.unwrap();
        let stored = store.get("t1").await.unwrap().unwrap();
        assert_eq!(stored.url, "https://b.example/hook");

        store.delete("t1").await.unwrap();
        store.delete("t1").await.unwrap();
        assert!(store.get("t1").await.unwrap().is_none());
    }
}
