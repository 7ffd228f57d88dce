//! Post-upload processors.
//!
//! Processors run once the primary object is physically stored, in the order
//! they were declared on the field. A processor may derive new artifacts and
//! upload them through the same registry path; derived paths are recorded on
//! the parent attachment so they share its lifecycle (rollback undo, orphan
//! cleanup). Processor failures abort the flush exactly like upload failures.

use async_trait::async_trait;
use bytes::Bytes;
use image::GenericImageView;
use serde_json::json;
use std::io::Cursor;

use crate::error::{FileError, FileResult};
use crate::file::Attachment;
use crate::registry::StorageRegistry;

#[async_trait]
pub trait Processor: Send + Sync {
    /// `data` is the buffered primary content; `file` is already saved.
    async fn process(
        &self,
        file: &mut Attachment,
        data: &[u8],
        registry: &StorageRegistry,
    ) -> FileResult<()>;
}

/// Generates a thumbnail from the uploaded image and nests its metadata under
/// the `thumbnail` key.
///
/// The resize preserves aspect ratio within the configured bounding box; the
/// default output format is PNG.
pub struct ThumbnailGenerator {
    size: (u32, u32),
    format: image::ImageFormat,
}

impl ThumbnailGenerator {
    pub fn new(size: (u32, u32)) -> Self {
        Self {
            size,
            format: image::ImageFormat::Png,
        }
    }

    pub fn with_format(mut self, format: image::ImageFormat) -> Self {
        self.format = format;
        self
    }
}

#[async_trait]
impl Processor for ThumbnailGenerator {
    async fn process(
        &self,
        file: &mut Attachment,
        data: &[u8],
        registry: &StorageRegistry,
    ) -> FileResult<()> {
        let img = image::load_from_memory(data)
            .map_err(|_| FileError::invalid("thumbnail source is not a decodable image"))?;
        let thumb = img.thumbnail(self.size.0, self.size.1);
        let (width, height) = thumb.dimensions();

        let mut out = Cursor::new(Vec::new());
        thumb
            .write_to(&mut out, self.format)
            .map_err(FileError::backend)?;

        let content_type = self.format.to_mime_type().to_string();
        let ext = self.format.extensions_str().first().copied().unwrap_or("bin");
        let filename = format!("{}.thumbnail{width}x{height}.{ext}", file.filename);

        let stored = file
            .store_derived(registry, filename, content_type, Bytes::from(out.into_inner()))
            .await?;
        let file_id = stored
            .path
            .rsplit_once('/')
            .map(|(_, id)| id.to_string())
            .unwrap_or_else(|| stored.path.clone());

        file.extra.insert(
            "thumbnail".to_string(),
            json!({
                "file_id": file_id,
                "upload_storage": file.upload_storage,
                "path": stored.path,
                "url": stored.url,
                "width": width,
                "height": height,
            }),
        );
        Ok(())
    }
}
