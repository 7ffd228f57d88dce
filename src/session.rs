//! Unit-of-work coordination between the relational flush and the object
//! store.
//!
//! The two systems share no transaction protocol, so the session gives
//! uploads the appearance of transactional semantics: nothing is uploaded
//! before flush, every upload is tracked until the transaction concludes,
//! and the commit/rollback outcome decides which storage objects survive.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{FileResult, ValidationError};
use crate::field::FileField;
use crate::file::Attachment;
use crate::registry::StorageRegistry;
use crate::validators::codes;

/// Per-unit-of-work upload/cleanup coordinator.
///
/// The host application creates one session per transaction and drives it
/// through three transitions:
///
/// - [`flush_field`](Self::flush_field) / [`flush_delete`](Self::flush_delete)
///   when the relational flush runs: pending attachments are validated,
///   uploaded and tracked; superseded values are scheduled for cleanup,
/// - [`commit`](Self::commit) after the relational commit: uploads become
///   permanent, superseded objects are removed,
/// - [`rollback`](Self::rollback) after a relational rollback: this
///   transaction's uploads are removed, scheduled cleanups are discarded.
///
/// Each session owns its bookkeeping, so concurrent transactions never
/// observe each other's state; share the [`StorageRegistry`] itself across
/// sessions.
///
/// Cleanup after the relational outcome is decided is best-effort by design:
/// a delete failure is logged and abandoned rather than turning a concluded
/// commit/rollback into an error. Repeated backend failures can therefore
/// leak storage objects.
pub struct AttachmentSession {
    registry: Arc<StorageRegistry>,
    /// Paths uploaded during the current transaction, undone on rollback
    uploaded: HashSet<String>,
    /// Saved paths no longer referenced, removed after commit
    obsolete: HashSet<String>,
}

impl AttachmentSession {
    pub fn new(registry: Arc<StorageRegistry>) -> Self {
        Self {
            registry,
            uploaded: HashSet::new(),
            obsolete: HashSet::new(),
        }
    }

    pub fn registry(&self) -> &StorageRegistry {
        &self.registry
    }

    /// Uploads tracked for the current transaction
    pub fn uploads_in_flight(&self) -> usize {
        self.uploaded.len()
    }

    /// Cleanups scheduled to run after commit
    pub fn scheduled_cleanups(&self) -> usize {
        self.obsolete.len()
    }

    /// Flush one attribute: upload its pending attachments and schedule
    /// cleanup for the saved ones it no longer references.
    ///
    /// `old` is the attribute value loaded from the row (empty for an
    /// insert), `new` the value being written. Every validator runs over
    /// every pending element before the first byte is uploaded, so a
    /// multi-valued assignment either uploads completely or not at all.
    /// An upload or processor failure propagates to the caller; the host is
    /// expected to roll back the relational transaction and then call
    /// [`rollback`](Self::rollback), which removes the partial uploads.
    pub async fn flush_field(
        &mut self,
        field: &FileField,
        key: &str,
        old: &[Attachment],
        new: &mut [Attachment],
    ) -> FileResult<()> {
        if field.required && new.is_empty() {
            return Err(
                ValidationError::new(key, codes::REQUIRED, format!("field {key} is required"))
                    .into(),
            );
        }

        // buffer pending sources; the only point where streams are read
        let mut staged: Vec<(usize, Bytes)> = Vec::new();
        for (idx, att) in new.iter_mut().enumerate() {
            if att.saved {
                continue;
            }
            let data = att.take_content().await?;
            att.size = data.len() as u64;
            if field.required && data.is_empty() {
                return Err(ValidationError::new(
                    key,
                    codes::REQUIRED,
                    format!("field {key} requires non-empty content"),
                )
                .into());
            }
            staged.push((idx, data));
        }

        // all validators over all elements, before any upload
        for (idx, data) in &staged {
            for validator in &field.validators {
                validator.validate(&mut new[*idx], data, key)?;
            }
        }

        for (idx, data) in &staged {
            let att = &mut new[*idx];
            let storage = match att.upload_storage.clone() {
                Some(name) => name,
                None => self.registry.get_default()?,
            };
            att.save_to_storage(&self.registry, &storage, data.clone())
                .await?;
            self.uploaded.extend(att.object_paths());
            debug!(key, file_id = %att.file_id, %storage, "uploaded attachment");
        }

        for (idx, data) in &staged {
            let att = &mut new[*idx];
            for processor in &field.processors {
                let result = processor.process(att, data, &self.registry).await;
                // derived uploads are tracked even when the processor then
                // fails, so rollback can reap them
                self.uploaded.extend(att.object_paths());
                result?;
            }
        }

        // saved attachments the new value no longer references are orphans
        let live: HashSet<&str> = new.iter().map(|att| att.file_id.as_str()).collect();
        for old_att in old {
            if old_att.saved && !live.contains(old_att.file_id.as_str()) {
                self.obsolete.extend(old_att.object_paths());
            }
        }

        Ok(())
    }

    /// Flush an entity removal: every saved attachment of the deleted entity
    /// is scheduled for cleanup after commit.
    pub fn flush_delete(&mut self, attachments: &[Attachment]) {
        for att in attachments {
            if att.saved {
                self.obsolete.extend(att.object_paths());
            }
        }
    }

    /// Conclude a committed transaction: uploads are now permanent, objects
    /// superseded during the transaction are removed (best-effort).
    pub async fn commit(&mut self) {
        self.uploaded.clear();
        let stale = std::mem::take(&mut self.obsolete);
        for path in stale {
            self.reap(&path, "superseded object").await;
        }
    }

    /// Conclude a rolled-back transaction: this transaction's uploads are
    /// removed (best-effort), scheduled cleanups are discarded since their
    /// objects were never actually superseded.
    pub async fn rollback(&mut self) {
        self.obsolete.clear();
        let undo = std::mem::take(&mut self.uploaded);
        for path in undo {
            self.reap(&path, "rolled-back upload").await;
        }
    }

    async fn reap(&self, path: &str, what: &str) {
        match self.registry.delete_path(path).await {
            Ok(removed) => debug!(%path, removed, "removed {}", what),
            Err(error) => {
                warn!(%path, %error, "failed to remove {}; object may be leaked", what)
            }
        }
    }
}
