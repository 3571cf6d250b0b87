use crate::models::{ContentHash, StoredFile};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Result of an insert-if-absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// The record was written.
    Inserted(StoredFile),
    /// A record for the same checksum already existed; nothing was written.
    Existing(StoredFile),
}

impl PutOutcome {
    pub fn file(&self) -> &StoredFile {
        match self {
            PutOutcome::Inserted(file) | PutOutcome::Existing(file) => file,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, PutOutcome::Inserted(_))
    }
}

/// Content-addressed record store.
///
/// `put_if_absent` must be atomic per key: two concurrent calls with the
/// same checksum produce exactly one `Inserted`.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn get(&self, key: &ContentHash) -> Result<Option<StoredFile>>;

    /// Stores `file` under `file.checksum` unless a record already exists.
    async fn put_if_absent(&self, file: StoredFile) -> Result<PutOutcome>;

    /// All records, oldest first.
    async fn list(&self) -> Result<Vec<StoredFile>>;

    async fn len(&self) -> Result<usize>;
}

/// Process-lifetime store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    files: DashMap<ContentHash, StoredFile>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn get(&self, key: &ContentHash) -> Result<Option<StoredFile>> {
        Ok(self.files.get(key).map(|entry| entry.value().clone()))
    }

    async fn put_if_absent(&self, file: StoredFile) -> Result<PutOutcome> {
        // The entry guard holds the shard write lock, so check and insert
        // happen in one critical section.
        match self.files.entry(file.checksum.clone()) {
            Entry::Occupied(existing) => Ok(PutOutcome::Existing(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(file.clone());
                Ok(PutOutcome::Inserted(file))
            }
        }
    }

    async fn list(&self) -> Result<Vec<StoredFile>> {
        let mut files: Vec<StoredFile> =
            self.files.iter().map(|entry| entry.value().clone()).collect();
        files.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.checksum.cmp(&b.checksum))
        });
        Ok(files)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn record(name: &str, content: &[u8]) -> StoredFile {
        StoredFile {
            name: name.to_string(),
            size: content.len() as u64,
            uploaded_at: Utc::now(),
            checksum: ContentHash::of(content),
        }
    }

    #[tokio::test]
    async fn test_put_if_absent_keeps_first_record() {
        let store = InMemoryFileStore::new();

        let first = store.put_if_absent(record("a.txt", b"same")).await.unwrap();
        assert!(first.was_inserted());

        let second = store.put_if_absent(record("b.txt", b"same")).await.unwrap();
        assert!(!second.was_inserted());
        assert_eq!(second.file().name, "a.txt");
        assert_eq!(store.len().await.unwrap(), 1);

        let fetched = store.get(&ContentHash::of(b"same")).await.unwrap().unwrap();
        assert_eq!(fetched.name, "a.txt");
        assert!(store.get(&ContentHash::of(b"other")).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_inserts_store_once() {
        let store = Arc::new(InMemoryFileStore::new());

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .put_if_absent(record(&format!("copy-{}.bin", i), b"racing bytes"))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap().was_inserted() {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_returns_every_record() {
        let store = InMemoryFileStore::new();
        store.put_if_absent(record("a.txt", b"a")).await.unwrap();
        store.put_if_absent(record("b.txt", b"b")).await.unwrap();

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"a.txt".to_string()));
        assert!(names.contains(&"b.txt".to_string()));
    }
}
