use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{FileError, FileResult};
use crate::file::Attachment;
use crate::store::{content_stream, FileStore, ObjectMeta, StoredObject};
use crate::types::{ByteStream, FileId};

#[derive(Default)]
struct Inner {
    stores: HashMap<String, Arc<dyn FileStore>>,
    default: Option<String>,
}

/// Maps logical storage names to backend handles.
///
/// The registry is an explicit object handed (usually as an `Arc`) to every
/// component that resolves storages; tests construct isolated instances.
/// Registration is expected once at process start; afterwards the registry is
/// read-mostly and lookups only take a read lock. The first registered
/// storage implicitly becomes the default.
#[derive(Default)]
pub struct StorageRegistry {
    inner: RwLock<Inner>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a storage backend under a logical name.
    ///
    /// Fails if the name is already taken. The first registration becomes the
    /// default storage.
    pub fn add(&self, name: impl Into<String>, store: Arc<dyn FileStore>) -> FileResult<()> {
        let name = name.into();
        let mut inner = self.inner.write();
        if inner.stores.contains_key(&name) {
            return Err(FileError::invalid(format!(
                "storage {name} has already been added"
            )));
        }
        if inner.default.is_none() {
            inner.default = Some(name.clone());
        }
        inner.stores.insert(name, store);
        Ok(())
    }

    /// Replace the current default storage
    pub fn set_default(&self, name: &str) -> FileResult<()> {
        let mut inner = self.inner.write();
        if !inner.stores.contains_key(name) {
            return Err(FileError::unknown_storage(name));
        }
        inner.default = Some(name.to_string());
        Ok(())
    }

    /// Name of the current default storage
    pub fn get_default(&self) -> FileResult<String> {
        self.inner
            .read()
            .default
            .clone()
            .ok_or(FileError::NoDefaultStorage)
    }

    /// Resolve a storage name to its backend handle; the default when `name`
    /// is omitted
    pub fn get(&self, name: Option<&str>) -> FileResult<Arc<dyn FileStore>> {
        let inner = self.inner.read();
        let name = match name {
            Some(name) => name,
            None => inner.default.as_deref().ok_or(FileError::NoDefaultStorage)?,
        };
        inner
            .stores
            .get(name)
            .cloned()
            .ok_or_else(|| FileError::unknown_storage(name))
    }

    /// Upload content under `storage_name/file_id`
    pub async fn save(
        &self,
        storage: &str,
        file_id: &FileId,
        meta: ObjectMeta,
        data: Bytes,
    ) -> FileResult<StoredObject> {
        let store = self.get(Some(storage))?;
        let result = store.put(file_id.as_str(), meta, content_stream(data)).await?;
        let path = format!("{storage}/{file_id}");
        debug!(%path, size = result.size_bytes, "stored object");
        Ok(StoredObject {
            url: store.public_url(file_id.as_str()),
            path,
            size_bytes: result.size_bytes,
        })
    }

    /// Materialize a saved [`Attachment`] from a `storage_name/file_id` path.
    ///
    /// Used for direct retrieval outside the ORM, e.g. a file-serving
    /// endpoint. Fails with [`FileError::NotFound`] when the object does not
    /// exist in the backend.
    pub async fn fetch(&self, path: &str) -> FileResult<Attachment> {
        let (storage, file_id) = split_path(path)?;
        let store = self.get(Some(storage))?;
        let head = store
            .head(file_id)
            .await
            .map_err(|err| widen_not_found(err, path))?;
        Ok(Attachment {
            file_id: FileId::from_string(file_id.to_string()),
            filename: head.meta.filename.clone(),
            content_type: head.meta.content_type.clone(),
            upload_storage: Some(storage.to_string()),
            uploaded_at: head.last_modified,
            size: head.size_bytes,
            path: Some(path.to_string()),
            url: store.public_url(file_id),
            saved: true,
            files: vec![path.to_string()],
            extra: head.meta.extra,
            headers: head.meta.headers,
            content: None,
        })
    }

    /// Open the object at `storage_name/file_id` for reading
    pub async fn open(&self, path: &str) -> FileResult<ByteStream> {
        let (storage, file_id) = split_path(path)?;
        let store = self.get(Some(storage))?;
        let result = store
            .get(file_id)
            .await
            .map_err(|err| widen_not_found(err, path))?;
        Ok(result.stream)
    }

    /// Delete the object at `storage_name/file_id`.
    ///
    /// Idempotent: returns `Ok(false)` when the object was already gone.
    pub async fn delete_path(&self, path: &str) -> FileResult<bool> {
        let (storage, file_id) = split_path(path)?;
        let store = self.get(Some(storage))?;
        let removed = store.delete(file_id).await?;
        debug!(%path, removed, "deleted object");
        Ok(removed)
    }
}

/// Split `storage_name/file_id`; storage names may themselves contain `/`,
/// the file id is the last segment
fn split_path(path: &str) -> FileResult<(&str, &str)> {
    path.rsplit_once('/')
        .filter(|(storage, file_id)| !storage.is_empty() && !file_id.is_empty())
        .ok_or_else(|| FileError::invalid(format!("malformed storage path: {path}")))
}

fn widen_not_found(err: FileError, path: &str) -> FileError {
    match err {
        FileError::NotFound { .. } => FileError::not_found(path),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_resolution_without_registration_fails() {
        let registry = StorageRegistry::new();
        assert!(matches!(
            registry.get(None),
            Err(FileError::NoDefaultStorage)
        ));
        assert!(matches!(
            registry.get(Some("nope")),
            Err(FileError::UnknownStorage { .. })
        ));
    }

    #[test]
    fn test_first_registered_becomes_default() {
        let registry = StorageRegistry::new();
        let a = Arc::new(MemoryStore::new());
        let b = Arc::new(MemoryStore::new());
        registry.add("a", a).unwrap();
        registry.add("b", b).unwrap();
        assert_eq!(registry.get_default().unwrap(), "a");

        registry.set_default("b").unwrap();
        assert_eq!(registry.get_default().unwrap(), "b");
    }

    #[test]
    fn test_duplicate_and_unknown_names_rejected() {
        let registry = StorageRegistry::new();
        registry.add("a", Arc::new(MemoryStore::new())).unwrap();
        assert!(registry.add("a", Arc::new(MemoryStore::new())).is_err());
        assert!(matches!(
            registry.set_default("missing"),
            Err(FileError::UnknownStorage { .. })
        ));
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("s3/abc").unwrap(), ("s3", "abc"));
        assert_eq!(split_path("tier/cold/abc").unwrap(), ("tier/cold", "abc"));
        assert!(split_path("no-separator").is_err());
        assert!(split_path("/abc").is_err());
    }

    #[tokio::test]
    async fn test_fetch_missing_object() {
        let registry = StorageRegistry::new();
        registry.add("mem", Arc::new(MemoryStore::new())).unwrap();
        assert!(matches!(
            registry.fetch("mem/ghost").await,
            Err(FileError::NotFound { .. })
        ));
    }
}
