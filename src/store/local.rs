use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::error::{FileError, FileResult};
use crate::store::{FileStore, GetResult, ObjectHead, ObjectMeta, PutResult};
use crate::types::{bytes_stream, ByteStream};

/// Filesystem backend.
///
/// Objects land as plain files under the root directory. The filesystem keeps
/// no object metadata of its own, so each object gets a JSON sidecar
/// (`<key>.meta.json`) holding filename, content type and extra metadata; the
/// sidecar is removed together with its object.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.meta.json"))
    }

    async fn read_meta(&self, key: &str) -> ObjectMeta {
        match tokio::fs::read(self.meta_path(key)).await {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_default(),
            Err(_) => ObjectMeta::default(),
        }
    }
}

fn map_not_found(err: std::io::Error, key: &str) -> FileError {
    if err.kind() == std::io::ErrorKind::NotFound {
        FileError::not_found(key)
    } else {
        FileError::Io { source: err }
    }
}

#[async_trait]
impl FileStore for LocalStore {
    async fn put(
        &self,
        key: &str,
        meta: ObjectMeta,
        mut stream: ByteStream,
    ) -> FileResult<PutResult> {
        tokio::fs::create_dir_all(&self.root).await?;

        let mut out = tokio::fs::File::create(self.data_path(key)).await?;
        let mut size_bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            size_bytes += chunk.len() as u64;
            out.write_all(&chunk).await?;
        }
        out.flush().await?;

        tokio::fs::write(self.meta_path(key), serde_json::to_vec(&meta)?).await?;

        Ok(PutResult {
            size_bytes,
            etag: None,
        })
    }

    async fn get(&self, key: &str) -> FileResult<GetResult> {
        let data = tokio::fs::read(self.data_path(key))
            .await
            .map_err(|err| map_not_found(err, key))?;
        let meta = self.read_meta(key).await;
        Ok(GetResult {
            size_bytes: data.len() as u64,
            stream: bytes_stream(data.into()),
            meta,
        })
    }

    async fn head(&self, key: &str) -> FileResult<ObjectHead> {
        let stat = tokio::fs::metadata(self.data_path(key))
            .await
            .map_err(|err| map_not_found(err, key))?;
        let last_modified = stat.modified().ok().map(DateTime::<Utc>::from);
        Ok(ObjectHead {
            size_bytes: stat.len(),
            meta: self.read_meta(key).await,
            last_modified,
        })
    }

    async fn delete(&self, key: &str) -> FileResult<bool> {
        let removed = match tokio::fs::remove_file(self.data_path(key)).await {
            Ok(()) => true,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
            Err(err) => return Err(err.into()),
        };
        // sidecar may be absent for objects written by other tools
        let _ = tokio::fs::remove_file(self.meta_path(key)).await;
        Ok(removed)
    }

    fn public_url(&self, _key: &str) -> Option<String> {
        None
    }
}
