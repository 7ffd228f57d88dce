use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{FileError, FileResult};
use crate::store::{FileStore, GetResult, ObjectHead, ObjectMeta, PutResult};
use crate::types::{buffer_stream, bytes_stream, ByteStream};

struct StoredEntry {
    data: Bytes,
    meta: ObjectMeta,
    created_at: DateTime<Utc>,
}

/// In-memory backend for testing and development.
///
/// Keeps whole objects in process memory and counts write/delete calls so
/// tests can assert that a rejected value never reached the backend.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, StoredEntry>>,
    put_calls: AtomicU64,
    delete_calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently held
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Number of `put` calls received since creation
    pub fn put_count(&self) -> u64 {
        self.put_calls.load(Ordering::Relaxed)
    }

    /// Number of `delete` calls received since creation
    pub fn delete_count(&self) -> u64 {
        self.delete_calls.load(Ordering::Relaxed)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn put(&self, key: &str, meta: ObjectMeta, stream: ByteStream) -> FileResult<PutResult> {
        self.put_calls.fetch_add(1, Ordering::Relaxed);
        let data = buffer_stream(stream).await?;
        let size_bytes = data.len() as u64;
        self.objects.write().insert(
            key.to_string(),
            StoredEntry {
                data,
                meta,
                created_at: Utc::now(),
            },
        );
        Ok(PutResult {
            size_bytes,
            etag: None,
        })
    }

    async fn get(&self, key: &str) -> FileResult<GetResult> {
        let objects = self.objects.read();
        let entry = objects
            .get(key)
            .ok_or_else(|| FileError::not_found(key))?;
        Ok(GetResult {
            stream: bytes_stream(entry.data.clone()),
            size_bytes: entry.data.len() as u64,
            meta: entry.meta.clone(),
        })
    }

    async fn head(&self, key: &str) -> FileResult<ObjectHead> {
        let objects = self.objects.read();
        let entry = objects
            .get(key)
            .ok_or_else(|| FileError::not_found(key))?;
        Ok(ObjectHead {
            size_bytes: entry.data.len() as u64,
            meta: entry.meta.clone(),
            last_modified: Some(entry.created_at),
        })
    }

    async fn delete(&self, key: &str) -> FileResult<bool> {
        self.delete_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.objects.write().remove(key).is_some())
    }

    fn public_url(&self, _key: &str) -> Option<String> {
        None
    }
}
