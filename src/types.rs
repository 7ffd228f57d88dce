use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use uuid::Uuid;

use crate::file::Attachment;

/// Stream of bytes for file content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Unique identifier for a stored file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub String);

impl FileId {
    /// Generate a new random file ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from existing string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A byte source waiting to be uploaded.
///
/// Assignment never touches the network or disk: a `Stream` variant is only
/// read when the owning unit of work flushes.
pub enum FileContent {
    /// Raw bytes
    Bytes(Bytes),
    /// Text, encoded as UTF-8 on upload
    Text(String),
    /// Async byte stream, read at flush time
    Stream {
        stream: ByteStream,
        /// Name hint carried by the stream (e.g. the multipart field filename)
        filename: Option<String>,
    },
}

impl FileContent {
    /// Filename carried by the source, if any
    pub fn filename_hint(&self) -> Option<&str> {
        match self {
            FileContent::Stream { filename, .. } => filename.as_deref(),
            _ => None,
        }
    }

    /// Size known without reading the source, if any
    pub fn size_hint(&self) -> Option<u64> {
        match self {
            FileContent::Bytes(data) => Some(data.len() as u64),
            FileContent::Text(text) => Some(text.len() as u64),
            FileContent::Stream { .. } => None,
        }
    }

    /// Buffer the whole source into memory. The only point where streams are read.
    pub async fn into_bytes(self) -> Result<Bytes, std::io::Error> {
        match self {
            FileContent::Bytes(data) => Ok(data),
            FileContent::Text(text) => Ok(Bytes::from(text.into_bytes())),
            FileContent::Stream { stream, .. } => buffer_stream(stream).await,
        }
    }
}

impl std::fmt::Debug for FileContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileContent::Bytes(data) => f.debug_tuple("Bytes").field(&data.len()).finish(),
            FileContent::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            FileContent::Stream { filename, .. } => {
                f.debug_struct("Stream").field("filename", filename).finish()
            }
        }
    }
}

impl From<Bytes> for FileContent {
    fn from(data: Bytes) -> Self {
        FileContent::Bytes(data)
    }
}

impl From<Vec<u8>> for FileContent {
    fn from(data: Vec<u8>) -> Self {
        FileContent::Bytes(Bytes::from(data))
    }
}

impl From<&[u8]> for FileContent {
    fn from(data: &[u8]) -> Self {
        FileContent::Bytes(Bytes::copy_from_slice(data))
    }
}

impl From<String> for FileContent {
    fn from(text: String) -> Self {
        FileContent::Text(text)
    }
}

impl From<&str> for FileContent {
    fn from(text: &str) -> Self {
        FileContent::Text(text.to_string())
    }
}

/// Everything a file attribute accepts on assignment.
///
/// This is a closed union: values outside it are rejected with a typed error
/// instead of being duck-typed into place. `Many` is only valid on
/// multi-valued fields and must not nest.
pub enum FileValue {
    /// A descriptor built by the caller, passed through with field defaults
    /// applied only where absent
    Attachment(Attachment),
    /// A raw byte source
    Content(FileContent),
    /// One entry per element, for multi-valued fields
    Many(Vec<FileValue>),
}

impl std::fmt::Debug for FileValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileValue::Attachment(att) => f.debug_tuple("Attachment").field(&att.file_id).finish(),
            FileValue::Content(content) => f.debug_tuple("Content").field(content).finish(),
            FileValue::Many(items) => f.debug_tuple("Many").field(&items.len()).finish(),
        }
    }
}

impl From<Attachment> for FileValue {
    fn from(att: Attachment) -> Self {
        FileValue::Attachment(att)
    }
}

impl From<FileContent> for FileValue {
    fn from(content: FileContent) -> Self {
        FileValue::Content(content)
    }
}

impl From<Bytes> for FileValue {
    fn from(data: Bytes) -> Self {
        FileValue::Content(data.into())
    }
}

impl From<Vec<u8>> for FileValue {
    fn from(data: Vec<u8>) -> Self {
        FileValue::Content(data.into())
    }
}

impl From<&[u8]> for FileValue {
    fn from(data: &[u8]) -> Self {
        FileValue::Content(data.into())
    }
}

impl From<String> for FileValue {
    fn from(text: String) -> Self {
        FileValue::Content(text.into())
    }
}

impl From<&str> for FileValue {
    fn from(text: &str) -> Self {
        FileValue::Content(text.into())
    }
}

impl From<Vec<FileValue>> for FileValue {
    fn from(items: Vec<FileValue>) -> Self {
        FileValue::Many(items)
    }
}

/// Collect a byte stream into a single buffer
pub async fn buffer_stream(mut stream: ByteStream) -> Result<Bytes, std::io::Error> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

/// Wrap an in-memory buffer as a [`ByteStream`]
pub fn bytes_stream(data: Bytes) -> ByteStream {
    Box::pin(futures_util::stream::once(async move {
        Ok::<Bytes, std::io::Error>(data)
    }))
}
