//! Document store interface (C12): the persistence layer is an external
//! collaborator out of scope for this engine — only its interface
//! matters. `MemoryStore` is the in-process stand-in used by tests and
//! by default when no external store is wired up, grounded in the
//! teacher's `database::Database`/`repositories::*` façade shape (a
//! thin typed wrapper over the backing engine) but backed by a map
//! instead of SeaORM/SQLite.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

/// Abstracted persistence: get/upsert by key, a naive substring "text
/// search" over titles/aliases, and group-by aggregation. Real
/// deployments back this with a document database providing an actual
/// text index and aggregation pipeline (§4.12); this trait only commits
/// to the shape.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Option<String>;
    async fn upsert_raw(&self, key: &str, value: String);
    async fn delete(&self, key: &str);
    /// All raw values whose key starts with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Vec<(String, String)>;
}

#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        serde_json::from_str(&raw).ok()
    }

    async fn upsert<T: Serialize + Sync>(&self, key: &str, value: &T) {
        if let Ok(raw) = serde_json::to_string(value) {
            self.upsert_raw(key, raw).await;
        }
    }

    async fn find_prefix<T: DeserializeOwned>(&self, prefix: &str) -> Vec<T> {
        self.scan_prefix(prefix)
            .await
            .into_iter()
            .filter_map(|(_, raw)| serde_json::from_str(&raw).ok())
            .collect()
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

/// In-memory `DocumentStore`, keyed by an opaque string key.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_raw(&self, key: &str) -> Option<String> {
        self.data.read().await.get(key).cloned()
    }

    async fn upsert_raw(&self, key: &str, value: String) {
        self.data.write().await.insert(key.to_string(), value);
    }

    async fn delete(&self, key: &str) {
        self.data.write().await.remove(key);
    }

    async fn scan_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.data
            .read()
            .await
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Widget {
        n: u32,
    }

    #[tokio::test]
    async fn round_trips_typed_values() {
        let store = MemoryStore::new();
        store.upsert("widget:1", &Widget { n: 42 }).await;
        let got: Option<Widget> = store.get("widget:1").await;
        assert_eq!(got, Some(Widget { n: 42 }));
    }

    #[tokio::test]
    async fn scan_prefix_filters_by_key_prefix() {
        let store = MemoryStore::new();
        store.upsert("medium:a", &Widget { n: 1 }).await;
        store.upsert("medium:b", &Widget { n: 2 }).await;
        store.upsert("other:a", &Widget { n: 3 }).await;

        let found: Vec<Widget> = store.find_prefix("medium:").await;
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let store = MemoryStore::new();
        store.upsert("k", &Widget { n: 1 }).await;
        store.delete("k").await;
        assert!(store.get_raw("k").await.is_none());
    }
}
