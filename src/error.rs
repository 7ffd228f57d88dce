use thiserror::Error;

/// Result type for attachment operations
pub type FileResult<T> = Result<T, FileError>;

/// Errors that can occur while attaching, storing or retrieving files
#[derive(Error, Debug)]
pub enum FileError {
    /// Content rejected by a validator before any I/O happened
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unknown storage: {name}")]
    UnknownStorage { name: String },

    #[error("No default storage configured")]
    NoDefaultStorage,

    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Upload failed: {reason}")]
    Upload { reason: String },

    #[error("Invalid value: {message}")]
    Invalid { message: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl FileError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid value error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(path: S) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an unknown storage error
    pub fn unknown_storage<S: Into<String>>(name: S) -> Self {
        Self::UnknownStorage { name: name.into() }
    }

    /// Create an upload failure
    pub fn upload<S: Into<String>>(reason: S) -> Self {
        Self::Upload {
            reason: reason.into(),
        }
    }
}

/// A validator rejected the content of an attachment.
///
/// Carries the column key it was raised for, a machine-readable reason code
/// and a human message. Raised during flush, before any upload for that
/// attribute.
#[derive(Error, Debug, Clone)]
#[error("{key}: {message}")]
pub struct ValidationError {
    /// Column key the attachment was assigned to
    pub key: String,
    /// Machine-readable reason, e.g. `size_exceeded`
    pub code: String,
    /// Human message
    pub message: String,
}

impl ValidationError {
    pub fn new<K, C, M>(key: K, code: C, message: M) -> Self
    where
        K: Into<String>,
        C: Into<String>,
        M: Into<String>,
    {
        Self {
            key: key.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}
