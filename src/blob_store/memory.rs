/// In-memory blob backend for tests
use crate::{
    blob_store::{BlobBackend, BlobGroup, BlobKey, BlobMeta, StoredBlob},
    error::{CmsError, CmsResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryBlobBackend {
    blobs: Mutex<HashMap<BlobKey, (StoredBlob, DateTime<Utc>)>>,
    puts: AtomicUsize,
    /// Fail every put after this many successful writes
    fail_after_puts: Mutex<Option<usize>>,
    fail_deletes: AtomicBool,
    delete_attempts: AtomicUsize,
}

impl MemoryBlobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_after_puts(&self, n: usize) {
        *self.fail_after_puts.lock().unwrap() = Some(n);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Successful writes so far
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Single-blob deletes tried so far, failed ones included
    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn keys(&self) -> Vec<BlobKey> {
        self.blobs.lock().unwrap().keys().cloned().collect()
    }

    /// Backdate every blob of an asset
    pub fn age_group(&self, asset_id: Uuid, at: DateTime<Utc>) {
        for (key, (_, modified)) in self.blobs.lock().unwrap().iter_mut() {
            if key.asset_id() == asset_id {
                *modified = at;
            }
        }
    }
}

#[async_trait]
impl BlobBackend for MemoryBlobBackend {
    async fn put(&self, key: &BlobKey, data: Vec<u8>, meta: &BlobMeta) -> CmsResult<()> {
        if let Some(limit) = *self.fail_after_puts.lock().unwrap() {
            if self.puts.load(Ordering::SeqCst) >= limit {
                return Err(CmsError::Storage(format!("injected put failure for {}", key)));
            }
        }
        self.blobs.lock().unwrap().insert(
            key.clone(),
            (
                StoredBlob {
                    data,
                    content_type: meta.content_type.clone(),
                },
                Utc::now(),
            ),
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &BlobKey) -> CmsResult<Option<StoredBlob>> {
        Ok(self.blobs.lock().unwrap().get(key).map(|(b, _)| b.clone()))
    }

    async fn delete(&self, key: &BlobKey) -> CmsResult<()> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CmsError::Storage(format!("injected delete failure for {}", key)));
        }
        self.blobs.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &BlobKey) -> CmsResult<bool> {
        Ok(self.blobs.lock().unwrap().contains_key(key))
    }

    async fn delete_group(&self, asset_id: Uuid) -> CmsResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CmsError::Storage(format!(
                "injected group delete failure for {}",
                asset_id
            )));
        }
        self.blobs
            .lock()
            .unwrap()
            .retain(|key, _| key.asset_id() != asset_id);
        Ok(())
    }

    async fn list_groups(&self) -> CmsResult<Vec<BlobGroup>> {
        let mut groups: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
        for (key, (_, modified)) in self.blobs.lock().unwrap().iter() {
            let entry = groups.entry(key.asset_id()).or_insert(*modified);
            *entry = (*entry).max(*modified);
        }
        Ok(groups
            .into_iter()
            .map(|(asset_id, last_modified)| BlobGroup {
                asset_id,
                last_modified,
            })
            .collect())
    }
}
