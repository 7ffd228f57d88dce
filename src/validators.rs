//! Content validators.
//!
//! Validators run during flush, before any byte reaches a backend, in the
//! order they were declared on the field; the first failure short-circuits
//! the rest and aborts the flush. A validator may also enrich the attachment
//! metadata (the image validator records `width`/`height`).

use image::GenericImageView;
use serde_json::json;

use crate::error::{FileError, FileResult, ValidationError};
use crate::file::Attachment;

/// Machine-readable reason codes carried by [`ValidationError`]
pub mod codes {
    pub const REQUIRED: &str = "required";
    pub const SIZE_EXCEEDED: &str = "size_exceeded";
    pub const CONTENT_TYPE_REJECTED: &str = "content_type_rejected";
    pub const INVALID_IMAGE: &str = "invalid_image";
    pub const DIMENSION_OUT_OF_RANGE: &str = "dimension_out_of_range";
    pub const ASPECT_RATIO_OUT_OF_RANGE: &str = "aspect_ratio_out_of_range";
}

/// Checks one pending attachment against its buffered content.
///
/// `key` is the column key the attachment was assigned to; pass it through to
/// [`ValidationError`] so callers can map failures back to a form field.
pub trait Validator: Send + Sync {
    fn validate(
        &self,
        file: &mut Attachment,
        data: &[u8],
        key: &str,
    ) -> Result<(), ValidationError>;
}

/// Parse a size given as a byte count or human string.
///
/// | Suffix | Value           | Example |
/// |--------|-----------------|---------|
/// | (none) | 1 byte          | `4096`  |
/// | `k`/`K`| 1,000 bytes     | `200k`  |
/// | `M`    | 1,000,000 bytes | `2M`    |
/// | `Ki`   | 1,024 bytes     | `32Ki`  |
/// | `Mi`   | 1,048,576 bytes | `8Mi`   |
pub fn parse_size(size: &str) -> FileResult<u64> {
    let trimmed = size.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(digits_end);
    let value: u64 = digits
        .parse()
        .map_err(|_| FileError::invalid(format!("invalid size: {size}")))?;
    let multiplier = match suffix.trim_start() {
        "" => 1,
        "k" | "K" => 1_000,
        "M" => 1_000_000,
        "Ki" => 1_024,
        "Mi" => 1_048_576,
        _ => return Err(FileError::invalid(format!("invalid size: {size}"))),
    };
    Ok(value * multiplier)
}

/// Rejects content larger than a configured threshold
pub struct SizeValidator {
    max_bytes: u64,
    limit_label: String,
}

impl SizeValidator {
    /// Limit from a human string, e.g. `"500k"` or `"2M"`
    pub fn new(max_size: &str) -> FileResult<Self> {
        Ok(Self {
            max_bytes: parse_size(max_size)?,
            limit_label: max_size.to_string(),
        })
    }

    /// Limit as an exact byte count
    pub fn bytes(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            limit_label: max_bytes.to_string(),
        }
    }
}

impl Validator for SizeValidator {
    fn validate(
        &self,
        file: &mut Attachment,
        _data: &[u8],
        key: &str,
    ) -> Result<(), ValidationError> {
        if file.size > self.max_bytes {
            return Err(ValidationError::new(
                key,
                codes::SIZE_EXCEEDED,
                format!(
                    "the file is too large ({} bytes), allowed maximum size is {}",
                    file.size, self.limit_label
                ),
            ));
        }
        Ok(())
    }
}

fn content_type_allowed(allowed: &[String], content_type: &str) -> bool {
    allowed.iter().any(|entry| {
        if let Some(prefix) = entry.strip_suffix("/*") {
            content_type.split('/').next() == Some(prefix)
        } else {
            entry == content_type
        }
    })
}

/// Rejects content whose declared/sniffed type is not on the allow-list.
///
/// Entries ending in `/*` match the whole major type, e.g. `image/*`.
pub struct ContentTypeValidator {
    allowed: Vec<String>,
}

impl ContentTypeValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for ContentTypeValidator {
    fn validate(
        &self,
        file: &mut Attachment,
        _data: &[u8],
        key: &str,
    ) -> Result<(), ValidationError> {
        if !content_type_allowed(&self.allowed, &file.content_type) {
            return Err(ValidationError::new(
                key,
                codes::CONTENT_TYPE_REJECTED,
                format!(
                    "content type {} is not allowed, allowed content types are: {}",
                    file.content_type,
                    self.allowed.join(", ")
                ),
            ));
        }
        Ok(())
    }
}

/// Validates that the content decodes as an image and, optionally, that its
/// dimensions and aspect ratio fall within bounds.
///
/// Records `width` and `height` into the attachment metadata on success.
#[derive(Default)]
pub struct ImageValidator {
    allowed_content_types: Option<Vec<String>>,
    min_wh: Option<(u32, u32)>,
    max_wh: Option<(u32, u32)>,
    min_aspect_ratio: Option<f64>,
    max_aspect_ratio: Option<f64>,
}

impl ImageValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the declared content type beyond the default `image/*`
    pub fn with_allowed_content_types<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_content_types = Some(allowed.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_min_dimensions(mut self, width: u32, height: u32) -> Self {
        self.min_wh = Some((width, height));
        self
    }

    pub fn with_max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_wh = Some((width, height));
        self
    }

    pub fn with_aspect_ratio(mut self, min: f64, max: f64) -> Self {
        self.min_aspect_ratio = Some(min);
        self.max_aspect_ratio = Some(max);
        self
    }
}

impl Validator for ImageValidator {
    fn validate(
        &self,
        file: &mut Attachment,
        data: &[u8],
        key: &str,
    ) -> Result<(), ValidationError> {
        let type_ok = match &self.allowed_content_types {
            Some(allowed) => content_type_allowed(allowed, &file.content_type),
            None => file.content_type.starts_with("image/"),
        };
        if !type_ok {
            return Err(ValidationError::new(
                key,
                codes::CONTENT_TYPE_REJECTED,
                format!("content type {} is not an allowed image type", file.content_type),
            ));
        }

        let img = image::load_from_memory(data).map_err(|_| {
            ValidationError::new(key, codes::INVALID_IMAGE, "provide a valid image file")
        })?;
        let (width, height) = img.dimensions();

        if let Some((min_w, min_h)) = self.min_wh {
            if width < min_w || height < min_h {
                return Err(ValidationError::new(
                    key,
                    codes::DIMENSION_OUT_OF_RANGE,
                    format!(
                        "minimum allowed dimension is {min_w}x{min_h}, but {width}x{height} is given"
                    ),
                ));
            }
        }
        if let Some((max_w, max_h)) = self.max_wh {
            if width > max_w || height > max_h {
                return Err(ValidationError::new(
                    key,
                    codes::DIMENSION_OUT_OF_RANGE,
                    format!(
                        "maximum allowed dimension is {max_w}x{max_h}, but {width}x{height} is given"
                    ),
                ));
            }
        }

        let aspect_ratio = f64::from(width) / f64::from(height);
        let below = self.min_aspect_ratio.is_some_and(|min| aspect_ratio < min);
        let above = self.max_aspect_ratio.is_some_and(|max| aspect_ratio > max);
        if below || above {
            return Err(ValidationError::new(
                key,
                codes::ASPECT_RATIO_OUT_OF_RANGE,
                format!(
                    "invalid aspect ratio {width}/{height} = {aspect_ratio:.3}, accepted range: {:?} - {:?}",
                    self.min_aspect_ratio, self.max_aspect_ratio
                ),
            ));
        }

        file.extra.insert("width".to_string(), json!(width));
        file.extra.insert("height".to_string(), json!(height));
        Ok(())
    }
}
