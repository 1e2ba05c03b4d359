//! Keyed record storage.
//!
//! Registries (projects, conversations) are held behind the [`Store`] trait
//! instead of process-wide maps, so a deployment can swap the in-memory
//! implementation for a shared one.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not complete the request
    #[error("store backend error: {0}")]
    Backend(String),
}

/// A value that can be kept in a [`Store`].
pub trait Record: Clone + Send + Sync + 'static {
    /// The key under which this record is stored.
    fn key(&self) -> &str;
}

/// Get/put/list storage for one record type.
#[async_trait]
pub trait Store<T: Record>: Send + Sync {
    /// Fetch a record by key.
    async fn get(&self, key: &str) -> Result<Option<T>, StoreError>;

    /// Insert or overwrite a record.
    async fn put(&self, record: T) -> Result<(), StoreError>;

    /// All records, in no particular order.
    async fn list(&self) -> Result<Vec<T>, StoreError>;

    /// Number of stored records.
    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.list().await?.len())
    }
}

/// Single-process store backed by a guarded map.
pub struct MemoryStore<T> {
    records: RwLock<HashMap<String, T>>,
}

impl<T> MemoryStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MemoryStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: Record> Store<T> for MemoryStore<T> {
    async fn get(&self, key: &str) -> Result<Option<T>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, record: T) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.key().to_string(), record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<T>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Item {
        id: String,
        value: u32,
    }

    impl Record for Item {
        fn key(&self) -> &str {
            &self.id
        }
    }

    fn item(id: &str, value: u32) -> Item {
        Item {
            id: id.to_string(),
            value,
        }
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store: MemoryStore<Item> = MemoryStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryStore::new();
        store.put(item("a", 1)).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(item("a", 1)));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryStore::new();
        store.put(item("a", 1)).await.unwrap();
        store.put(item("a", 2)).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().unwrap().value, 2);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list() {
        let store = MemoryStore::new();
        store.put(item("a", 1)).await.unwrap();
        store.put(item("b", 2)).await.unwrap();

        let mut keys: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_usable_as_trait_object() {
        let store: std::sync::Arc<dyn Store<Item>> = std::sync::Arc::new(MemoryStore::new());
        store.put(item("x", 9)).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
