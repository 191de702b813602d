use thiserror::Error;

/// Failures talking to the media repository (catalog or blob store).
///
/// These bubble up to the nearest user-facing status line; the shell shows
/// the `Display` text and logs the full error.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("background task failed: {0}")]
    Task(String),

    /// Backend-specific failure described by the backend itself.
    #[error("{0}")]
    Backend(String),
}

/// A candidate file that cannot join its upload batch.
///
/// Detected and resolved inside the ingestion pipeline: the file is dropped
/// and the reason reported, sibling files continue.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{name}: unsupported file type {content_type}")]
    UnsupportedType { name: String, content_type: String },

    #[error("{name}: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("{name}: video is {secs:.1}s long, limit is {limit}s")]
    TooLong { name: String, secs: f64, limit: u64 },

    #[error("{name}: could not read video duration ({reason})")]
    ProbeFailed { name: String, reason: String },
}

impl ValidationError {
    /// Name of the rejected file.
    pub fn file_name(&self) -> &str {
        match self {
            ValidationError::UnsupportedType { name, .. }
            | ValidationError::TooLarge { name, .. }
            | ValidationError::TooLong { name, .. }
            | ValidationError::ProbeFailed { name, .. } => name,
        }
    }
}

/// Batch-level upload failure. Aborts the rest of the batch.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("sign in to upload")]
    NotSignedIn,

    #[error("failed to read {file}: {source}")]
    Read {
        file: String,
        source: std::io::Error,
    },

    #[error("preparing {file} failed: {reason}")]
    Transcode { file: String, reason: String },

    #[error("upload of {file} failed: {source}")]
    Upload {
        file: String,
        source: RepositoryError,
    },

    #[error("saving details for {file} failed: {source}")]
    Persist {
        file: String,
        source: RepositoryError,
    },
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("only the uploader or an admin can delete this item")]
    PermissionDenied,

    #[error("no media with id {0}")]
    NotFound(String),

    #[error("delete failed: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("fetching {id} failed: {source}")]
    Fetch { id: String, source: RepositoryError },

    #[error("saving {path} failed: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parsing config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}
