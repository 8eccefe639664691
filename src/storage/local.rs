use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{validate_key, ObjectStore, ObjectStoreError};

/// A bucket backed by a directory, one file per object.
pub struct LocalObjectStore {
    root: PathBuf,
    next_tmp: AtomicU64,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            next_tmp: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_new(&self, key: &str, body: Bytes) -> Result<(), ObjectStoreError> {
        let path = self.path_for(key)?;
        // Write aside, then link into place. The link fails if the key is
        // taken, so an existing object is never replaced. Temp names start
        // with a dot, which list_keys skips, and are unique per write.
        let n = self.next_tmp.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .root
            .join(format!(".{}.{}-{}.partial", key, std::process::id(), n));
        tokio::fs::write(&tmp, &body).await?;

        let linked = tokio::fs::hard_link(&tmp, &path).await;
        let _ = tokio::fs::remove_file(&tmp).await;
        match linked {
            Ok(()) => {
                tracing::debug!(key, bytes = body.len(), "Stored object");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(ObjectStoreError::AlreadyExists(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, ObjectStoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key, "Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn list_keys(&self) -> Result<Vec<String>, ObjectStoreError> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut keys = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_key(name).is_ok() {
                    keys.push(name.to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalObjectStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(tmp.path().join("bucket")).unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn put_get_delete() {
        let (_tmp, store) = store();
        store.put_new("p1.png", Bytes::from_static(b"img")).await.unwrap();

        assert!(store.exists("p1.png").await.unwrap());
        assert_eq!(store.get("p1.png").await.unwrap().unwrap(), &b"img"[..]);

        store.delete("p1.png").await.unwrap();
        assert!(!store.exists("p1.png").await.unwrap());
        assert!(store.get("p1.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_missing_is_ok() {
        let (_tmp, store) = store();
        store.delete("never.png").await.unwrap();
    }

    #[tokio::test]
    async fn put_new_refuses_taken_key() {
        let (_tmp, store) = store();
        store.put_new("p1.png", Bytes::from_static(b"one")).await.unwrap();

        let err = store
            .put_new("p1.png", Bytes::from_static(b"two"))
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::AlreadyExists(ref k) if k == "p1.png"));
        assert_eq!(store.get("p1.png").await.unwrap().unwrap(), &b"one"[..]);

        // no temp files left behind either way
        let names: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("p1.png")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_to_one_key_keep_a_single_winner() {
        let (_tmp, store) = store();
        let store = std::sync::Arc::new(store);

        let writes: Vec<_> = (0..8u8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.put_new("p1.png", Bytes::from(vec![i; 64])).await })
            })
            .collect();
        let mut ok = 0;
        for write in writes {
            match write.await.unwrap() {
                Ok(()) => ok += 1,
                Err(e) => assert!(matches!(e, ObjectStoreError::AlreadyExists(_))),
            }
        }
        assert_eq!(ok, 1);

        let stored = store.get("p1.png").await.unwrap().unwrap();
        assert_eq!(stored.len(), 64);
        assert!(stored.iter().all(|b| *b == stored[0]));
        assert_eq!(store.list_keys().await.unwrap(), vec!["p1.png"]);
    }

    #[tokio::test]
    async fn list_skips_hidden_and_directories() {
        let (_tmp, store) = store();
        store.put_new("b.png", Bytes::from_static(b"b")).await.unwrap();
        store.put_new("a.jpg", Bytes::from_static(b"a")).await.unwrap();
        std::fs::write(store.root().join(".stray.partial"), b"x").unwrap();
        std::fs::create_dir(store.root().join("nested")).unwrap();

        assert_eq!(store.list_keys().await.unwrap(), vec!["a.jpg", "b.png"]);
    }

    #[tokio::test]
    async fn traversal_keys_never_touch_disk() {
        let (tmp, store) = store();
        let err = store
            .put_new("../escape.png", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::InvalidKey(_)));
        assert!(!tmp.path().join("escape.png").exists());
    }
}
