//! Storage backend primitives.
//!
//! A backend is a bucket-like namespace of objects keyed by file id. The
//! registry and the flush machinery talk to backends exclusively through
//! [`FileStore`]; implement it to plug in another storage service.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::FileResult;
use crate::types::ByteStream;

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

/// Core storage operations - must be implemented by all storage backends
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store an object from a stream
    async fn put(&self, key: &str, meta: ObjectMeta, stream: ByteStream) -> FileResult<PutResult>;

    /// Get an object as a stream
    async fn get(&self, key: &str) -> FileResult<GetResult>;

    /// Get object metadata without content
    async fn head(&self, key: &str) -> FileResult<ObjectHead>;

    /// Delete an object. Idempotent: deleting an absent object returns
    /// `Ok(false)`, never an error.
    async fn delete(&self, key: &str) -> FileResult<bool>;

    /// Public URL for CDN-style direct serving, when the backend has one
    fn public_url(&self, key: &str) -> Option<String>;
}

/// Metadata stored alongside an object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub filename: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

impl Default for ObjectMeta {
    fn default() -> Self {
        Self {
            filename: crate::file::FALLBACK_FILENAME.to_string(),
            content_type: crate::file::FALLBACK_CONTENT_TYPE.to_string(),
            extra: Map::new(),
            headers: None,
        }
    }
}

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutResult {
    pub size_bytes: u64,
    pub etag: Option<String>,
}

/// Result of a get operation
pub struct GetResult {
    pub stream: ByteStream,
    pub size_bytes: u64,
    pub meta: ObjectMeta,
}

/// Metadata about a stored object
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub meta: ObjectMeta,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Reference to an object persisted through the registry
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// `storage_name/file_id`
    pub path: String,
    pub size_bytes: u64,
    pub url: Option<String>,
}

/// Wrap uploaded bytes as the stream form [`FileStore::put`] expects
pub fn content_stream(data: Bytes) -> ByteStream {
    crate::types::bytes_stream(data)
}
