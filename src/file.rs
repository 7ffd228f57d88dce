use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{FileError, FileResult};
use crate::registry::StorageRegistry;
use crate::store::{ObjectMeta, StoredObject};
use crate::types::{ByteStream, FileContent, FileId};

pub const FALLBACK_FILENAME: &str = "unnamed";
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// One attached file: identity, metadata and, once uploaded, the reference to
/// its storage object.
///
/// Before the flush an `Attachment` owns its byte source and `saved` is
/// `false`. The flush uploads the bytes, stamps `path`, `uploaded_at` and
/// `url`, and drops the source. The serialized form is what lands in the
/// relational column; any consumer can rebuild the attachment from that JSON
/// alone.
#[derive(Debug, Serialize, Deserialize)]
pub struct Attachment {
    pub file_id: FileId,
    pub filename: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub size: u64,
    /// `upload_storage/file_id`, set at upload time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Public URL from the backend, when it provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub saved: bool,
    /// Every object path belonging to this attachment: the primary object
    /// plus processor-derived artifacts. Cleanup walks this list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    /// Open-ended metadata; validators and processors add keys here
    /// (`width`, `height`, `thumbnail`, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
    /// Extra request headers for the backend upload (e.g. CORS headers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip)]
    pub(crate) content: Option<FileContent>,
}

fn guess_content_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}

impl Attachment {
    /// Wrap a byte source as a pending attachment. No I/O happens here.
    ///
    /// Filename and content type are guessed from the source where possible;
    /// use [`with_filename`](Self::with_filename) and
    /// [`with_content_type`](Self::with_content_type) to override (filename
    /// first, since setting it re-derives the content type).
    pub fn new(content: impl Into<FileContent>) -> Self {
        let content = content.into();
        let filename = content
            .filename_hint()
            .unwrap_or(FALLBACK_FILENAME)
            .to_string();
        let content_type = guess_content_type(&filename);
        let size = content.size_hint().unwrap_or(0);
        Self {
            file_id: FileId::new(),
            filename,
            content_type,
            upload_storage: None,
            uploaded_at: None,
            size,
            path: None,
            url: None,
            saved: false,
            files: Vec::new(),
            extra: Map::new(),
            headers: None,
            content: Some(content),
        }
    }

    /// Set the filename and re-derive the content type from it
    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = filename.into();
        self.content_type = guess_content_type(&self.filename);
        self
    }

    /// Set an explicit content type
    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Target a specific registered storage instead of the default
    pub fn with_storage<S: Into<String>>(mut self, name: S) -> Self {
        self.upload_storage = Some(name.into());
        self
    }

    /// Attach a metadata key
    pub fn with_extra<K: Into<String>, V: Serialize>(mut self, key: K, value: V) -> Self {
        self.extra
            .insert(key.into(), serde_json::to_value(value).unwrap_or(Value::Null));
        self
    }

    /// Set upload request headers
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Open the stored object for reading.
    ///
    /// Only available once the attachment has been flushed and uploaded.
    pub async fn open(&self, registry: &StorageRegistry) -> FileResult<ByteStream> {
        let path = self.storage_path()?;
        registry.open(path).await
    }

    /// Public URL of the stored object, when the backend provides one
    pub fn public_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Upload derived content (e.g. a thumbnail) next to this attachment.
    ///
    /// The derived object goes to the same storage as the primary object and
    /// its path is recorded in [`files`](Self::files), so it is cleaned up
    /// together with its parent. Meant for [`Processor`](crate::Processor)
    /// implementations.
    pub async fn store_derived(
        &mut self,
        registry: &StorageRegistry,
        filename: String,
        content_type: String,
        data: Bytes,
    ) -> FileResult<StoredObject> {
        let storage = self.upload_storage.clone().ok_or_else(|| {
            FileError::invalid("derived content can only be stored after the upload")
        })?;
        let meta = ObjectMeta {
            filename,
            content_type,
            extra: Map::new(),
            headers: self.headers.clone(),
        };
        let stored = registry.save(&storage, &FileId::new(), meta, data).await?;
        self.files.push(stored.path.clone());
        Ok(stored)
    }

    /// Path of the primary storage object
    pub fn storage_path(&self) -> FileResult<&str> {
        if !self.saved {
            return Err(FileError::invalid(
                "attachment is pending; the storage object exists only after flush",
            ));
        }
        self.path
            .as_deref()
            .ok_or_else(|| FileError::invalid("saved attachment has no storage path"))
    }

    /// Every object path owned by this attachment
    pub fn object_paths(&self) -> Vec<String> {
        if !self.files.is_empty() {
            return self.files.clone();
        }
        // rows written before the files list existed carry only the path
        self.path.clone().into_iter().collect()
    }

    /// Take the pending byte source, buffering streams
    pub(crate) async fn take_content(&mut self) -> FileResult<Bytes> {
        match self.content.take() {
            Some(content) => Ok(content.into_bytes().await?),
            None => Err(FileError::invalid(format!(
                "attachment {} has no content to upload",
                self.file_id
            ))),
        }
    }

    /// Upload the buffered content and mark the attachment saved
    pub(crate) async fn save_to_storage(
        &mut self,
        registry: &StorageRegistry,
        storage: &str,
        data: Bytes,
    ) -> FileResult<()> {
        let meta = ObjectMeta {
            filename: self.filename.clone(),
            content_type: self.content_type.clone(),
            extra: self.extra.clone(),
            headers: self.headers.clone(),
        };
        let stored = registry.save(storage, &self.file_id, meta, data).await?;
        self.upload_storage = Some(storage.to_string());
        self.uploaded_at = Some(Utc::now());
        self.url = stored.url.clone();
        self.path = Some(stored.path.clone());
        self.files.push(stored.path);
        self.saved = true;
        self.content = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_attachment_guesses_metadata() {
        let att = Attachment::new("hello world").with_filename("hello.txt");
        assert_eq!(att.filename, "hello.txt");
        assert_eq!(att.content_type, "text/plain");
        assert_eq!(att.size, 11);
        assert!(!att.saved);
        assert!(att.path.is_none());
    }

    #[test]
    fn test_fallbacks_when_nothing_can_be_inferred() {
        let att = Attachment::new(vec![0u8, 1, 2]);
        assert_eq!(att.filename, FALLBACK_FILENAME);
        assert_eq!(att.content_type, FALLBACK_CONTENT_TYPE);
    }

    #[test]
    fn test_explicit_content_type_wins() {
        let att = Attachment::new("a,b\n1,2")
            .with_filename("data.bin")
            .with_content_type("text/csv");
        assert_eq!(att.content_type, "text/csv");
    }

    #[test]
    fn test_pending_attachment_has_no_storage_path() {
        let att = Attachment::new("pending");
        assert!(att.storage_path().is_err());
    }

    #[test]
    fn test_old_rows_without_newer_keys_still_parse() {
        // the minimum durable contract, as written by early versions
        let row = serde_json::json!({
            "file_id": "abc-123",
            "filename": "report.pdf",
            "content_type": "application/pdf",
            "upload_storage": "default",
            "uploaded_at": "2023-04-01T10:00:00Z",
            "size": 1024,
            "path": "default/abc-123",
            "saved": true
        });
        let att: Attachment = serde_json::from_value(row).unwrap();
        assert_eq!(att.file_id.as_str(), "abc-123");
        assert!(att.files.is_empty());
        assert_eq!(att.object_paths(), vec!["default/abc-123".to_string()]);
        assert!(att.extra.is_empty());
    }
}
