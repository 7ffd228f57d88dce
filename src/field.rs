use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{FileError, FileResult};
use crate::file::Attachment;
use crate::processors::{Processor, ThumbnailGenerator};
use crate::types::FileValue;
use crate::validators::{ImageValidator, Validator};

/// Per-attribute configuration: which storage to upload to, whether the
/// attribute holds one file or many, and the validator/processor chains run
/// at flush time.
///
/// The field also coerces assigned values into pending [`Attachment`]s.
/// Coercion never performs I/O; everything physical is deferred to the
/// session flush.
pub struct FileField {
    /// Storage the content is uploaded to; registry default when `None`
    pub upload_storage: Option<String>,
    /// Whether the attribute holds a list of files
    pub multiple: bool,
    /// Reject empty/absent values at flush time
    pub required: bool,
    pub validators: Vec<Box<dyn Validator>>,
    pub processors: Vec<Box<dyn Processor>>,
    /// Default extra metadata, applied to attachments that carry none
    pub extra: Map<String, Value>,
    /// Default upload headers, applied to attachments that carry none
    pub headers: Option<BTreeMap<String, String>>,
}

impl Default for FileField {
    fn default() -> Self {
        Self {
            upload_storage: None,
            multiple: false,
            required: false,
            validators: Vec::new(),
            processors: Vec::new(),
            extra: Map::new(),
            headers: None,
        }
    }
}

impl FileField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field preset that validates the content as an image.
    ///
    /// Combine with [`with_thumbnail`](Self::with_thumbnail) to also generate
    /// a thumbnail after upload, or add a configured [`ImageValidator`] via
    /// [`with_validator`](Self::with_validator) for dimension bounds.
    pub fn image() -> Self {
        Self::new().with_validator(ImageValidator::new())
    }

    pub fn with_storage<S: Into<String>>(mut self, name: S) -> Self {
        self.upload_storage = Some(name.into());
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn with_processor<P: Processor + 'static>(mut self, processor: P) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Generate a thumbnail bounded by `size` after each upload
    pub fn with_thumbnail(self, size: (u32, u32)) -> Self {
        self.with_processor(ThumbnailGenerator::new(size))
    }

    pub fn with_extra<K: Into<String>, V: serde::Serialize>(mut self, key: K, value: V) -> Self {
        self.extra
            .insert(key.into(), serde_json::to_value(value).unwrap_or(Value::Null));
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Turn an assigned value into pending attachments.
    ///
    /// Pre-built attachments pass through with field defaults applied only
    /// where absent on the object. Lists are accepted only on multi-valued
    /// fields and must not nest.
    pub fn coerce(&self, value: FileValue, key: &str) -> FileResult<Vec<Attachment>> {
        match value {
            FileValue::Many(items) => {
                if !self.multiple {
                    return Err(FileError::invalid(format!(
                        "field {key} is single-valued but was assigned a list"
                    )));
                }
                items
                    .into_iter()
                    .map(|item| match item {
                        FileValue::Many(_) => {
                            Err(FileError::invalid("nested lists are not accepted"))
                        }
                        other => self.coerce_one(other),
                    })
                    .collect()
            }
            other => Ok(vec![self.coerce_one(other)?]),
        }
    }

    fn coerce_one(&self, value: FileValue) -> FileResult<Attachment> {
        let att = match value {
            FileValue::Attachment(att) => att,
            FileValue::Content(content) => Attachment::new(content),
            FileValue::Many(_) => unreachable!("handled by coerce"),
        };
        Ok(self.apply_defaults(att))
    }

    fn apply_defaults(&self, mut att: Attachment) -> Attachment {
        if att.upload_storage.is_none() {
            att.upload_storage = self.upload_storage.clone();
        }
        if att.extra.is_empty() && !self.extra.is_empty() {
            att.extra = self.extra.clone();
        }
        if att.headers.is_none() {
            att.headers = self.headers.clone();
        }
        att
    }
}
