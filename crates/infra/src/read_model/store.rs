use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadStoreError {
    #[error("document could not be encoded: {0}")]
    Encode(String),

    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// Key/value store abstraction for read models and mutable documents.
///
/// Projections own their rows and can wipe them with `clear` before a rebuild.
/// Reads degrade to "not found" when the backend is unreachable; writes
/// report the failure so callers never assume a document was saved.
pub trait ReadStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;
    fn upsert(&self, key: K, value: V) -> Result<(), ReadStoreError>;
    fn remove(&self, key: &K) -> Result<Option<V>, ReadStoreError>;
    fn list(&self) -> Vec<V>;
    fn clear(&self);
}

impl<K, V, S> ReadStore<K, V> for Arc<S>
where
    S: ReadStore<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn upsert(&self, key: K, value: V) -> Result<(), ReadStoreError> {
        (**self).upsert(key, value)
    }

    fn remove(&self, key: &K) -> Result<Option<V>, ReadStoreError> {
        (**self).remove(key)
    }

    fn list(&self) -> Vec<V> {
        (**self).list()
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// In-memory store for tests/dev and the default server.
#[derive(Debug)]
pub struct InMemoryReadStore<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> InMemoryReadStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryReadStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> ReadStoreError {
    ReadStoreError::Unavailable("lock poisoned".to_string())
}

impl<K, V> ReadStore<K, V> for InMemoryReadStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(key).cloned()
    }

    fn upsert(&self, key: K, value: V) -> Result<(), ReadStoreError> {
        self.inner.write().map_err(|_| poisoned())?.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<Option<V>, ReadStoreError> {
        Ok(self.inner.write().map_err(|_| poisoned())?.remove(key))
    }

    fn list(&self) -> Vec<V> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        }
    }

    fn clear(&self) {
        if let Ok(mut map) = self.inner.write() {
            map.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_and_remove_returns_old_value() {
        let store: InMemoryReadStore<String, u32> = InMemoryReadStore::new();
        store.upsert("a".into(), 1).unwrap();
        store.upsert("a".into(), 2).unwrap();
        store.upsert("b".into(), 3).unwrap();

        assert_eq!(store.get(&"a".to_string()), Some(2));
        assert_eq!(store.remove(&"a".to_string()), Ok(Some(2)));
        assert_eq!(store.get(&"a".to_string()), None);
        assert_eq!(store.remove(&"a".to_string()), Ok(None));
        assert_eq!(store.list(), vec![3]);

        store.clear();
        assert!(store.list().is_empty());
    }

    #[test]
    fn poisoned_store_reports_write_failures() {
        let store: Arc<InMemoryReadStore<String, u32>> = Arc::new(InMemoryReadStore::new());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert_eq!(store.get(&"a".to_string()), None);
        assert!(matches!(store.upsert("a".into(), 1), Err(ReadStoreError::Unavailable(_))));
        assert!(store.remove(&"a".to_string()).is_err());
    }
}
