use serde::Serialize;

/// Crate-wide error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required provider credential is not configured. Raised before any
    /// network call is attempted.
    #[error("missing credential: {0}")]
    Auth(String),
    /// Non-success HTTP response from an external provider.
    #[error("provider error: {status} - {message}")]
    Provider { status: u16, message: String },
    /// Malformed payload that could not be absorbed locally.
    #[error("parse error: {0}")]
    Parse(String),
    /// Extraction was requested for a file type the core does not decode
    /// and no registered extractor claimed.
    #[error("unsupported file type: .{0}")]
    UnsupportedFormat(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
