use async_trait::async_trait;
use bytes::Bytes;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::{validate_key, ObjectStore, ObjectStoreError};

/// An in-process bucket. Contents are lost on restart.
///
/// Counts put/delete calls and can be told to fail them, which is how the
/// orchestrator's failure paths are exercised.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Bytes>>,
    put_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_new(&self, key: &str, body: Bytes) -> Result<(), ObjectStoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        validate_key(key)?;
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Unavailable("put rejected".into()));
        }
        match self.objects.lock().await.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(body);
                Ok(())
            }
            Entry::Occupied(_) => Err(ObjectStoreError::AlreadyExists(key.to_string())),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, ObjectStoreError> {
        validate_key(key)?;
        Ok(self.objects.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        validate_key(key)?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Unavailable("delete rejected".into()));
        }
        self.objects.lock().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        validate_key(key)?;
        Ok(self.objects.lock().await.contains_key(key))
    }

    async fn list_keys(&self) -> Result<Vec<String>, ObjectStoreError> {
        Ok(self.objects.lock().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_calls_and_honours_fail_switches() {
        let store = MemoryObjectStore::new();
        store.put_new("a.png", Bytes::from_static(b"a")).await.unwrap();

        let err = store.put_new("a.png", Bytes::from_static(b"z")).await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::AlreadyExists(_)));
        assert_eq!(store.get("a.png").await.unwrap().unwrap(), &b"a"[..]);

        store.set_fail_puts(true);
        assert!(store.put_new("b.png", Bytes::from_static(b"b")).await.is_err());
        assert_eq!(store.put_calls(), 3);
        assert!(!store.exists("b.png").await.unwrap());

        store.set_fail_deletes(true);
        assert!(store.delete("a.png").await.is_err());
        assert!(store.exists("a.png").await.unwrap());

        store.set_fail_deletes(false);
        store.delete("a.png").await.unwrap();
        assert_eq!(store.delete_calls(), 2);
        assert!(store.list_keys().await.unwrap().is_empty());
    }
}
