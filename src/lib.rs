//! # rowfile: transaction-aware file attachments for mapped entities
//!
//! `rowfile` lets ORM-mapped entities carry binary file content: the bytes go
//! to a pluggable object-storage backend, the relational row keeps only a
//! small JSON descriptor. The hard part it takes off your hands is lifecycle
//! coordination across two systems that share no transaction protocol —
//! uploads happen exactly once per committed value, and objects orphaned by
//! rollback, reassignment or deletion are cleaned up.
//!
//! ## Key behavior
//!
//! - **No I/O at assignment**: assigned values become pending descriptors;
//!   bytes move only when the unit of work flushes
//! - **Transaction aware**: every upload is tracked until the transaction
//!   concludes — rollback removes this transaction's uploads, commit removes
//!   the objects they superseded
//! - **Validated before stored**: size/content-type/image validators run over
//!   the whole value before the first byte is uploaded
//! - **Derived artifacts**: post-upload processors (e.g. thumbnailing) upload
//!   through the same path and share the parent's lifecycle
//! - **Storage agnostic**: memory and filesystem backends built in, anything
//!   else via the [`FileStore`] trait
//!
//! ## Quick start
//!
//! ```rust
//! use rowfile::{
//!     AttachmentSession, FileField, FileResult, MemoryStore, SizeValidator, StorageRegistry,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> FileResult<()> {
//! // 1. Register storage backends once at startup; the first one becomes
//! //    the default
//! let registry = Arc::new(StorageRegistry::new());
//! registry.add("default", Arc::new(MemoryStore::new()))?;
//!
//! // 2. Describe the mapped attribute
//! let field = FileField::new().with_validator(SizeValidator::new("2M")?);
//!
//! // 3. One session per unit of work; the host drives flush/commit/rollback
//! let mut session = AttachmentSession::new(registry.clone());
//! let mut value = field.coerce("hello, world".into(), "content")?;
//! session.flush_field(&field, "content", &[], &mut value).await?;
//! session.commit().await;
//!
//! assert!(value[0].saved);
//! // rowfile::column::encode(&value, false)? is what lands in the row
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │  Your ORM binding  │  ← calls flush/commit/rollback deterministically
//! ├────────────────────┤
//! │ AttachmentSession  │  ← upload/cleanup coordination per unit of work
//! ├────────────────────┤
//! │  StorageRegistry   │  ← logical name → backend handle
//! ├────────────────────┤
//! │     FileStore      │  ← storage primitives (memory, filesystem, ...)
//! └────────────────────┘
//! ```
//!
//! The session is infrastructure, not a framework: it never inspects your
//! entities. The host binding hands it attribute-level old/new values at
//! flush time and reports the transaction outcome, nothing more.

pub mod column;
mod error;
mod field;
mod file;
mod processors;
mod registry;
mod session;
pub mod store;
mod types;
pub mod validators;

// Re-export main types for clean API
pub use error::{FileError, FileResult, ValidationError};
pub use field::FileField;
pub use file::Attachment;
pub use processors::{Processor, ThumbnailGenerator};
pub use registry::StorageRegistry;
pub use session::AttachmentSession;
pub use store::{
    FileStore, GetResult, LocalStore, MemoryStore, ObjectHead, ObjectMeta, PutResult, StoredObject,
};
pub use types::{buffer_stream, bytes_stream, ByteStream, FileContent, FileId, FileValue};
pub use validators::{parse_size, ContentTypeValidator, ImageValidator, SizeValidator, Validator};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Attachment, AttachmentSession, ByteStream, FileContent, FileError, FileField, FileId,
        FileResult, FileStore, FileValue, StorageRegistry,
    };
}
