use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded document record.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Document {
    pub id: String,
    pub filename: String,
    /// Raw extracted text.
    pub text: String,
    pub uploaded_at: DateTime<Utc>,
    pub processed: bool,
    /// Number of chunks produced at processing time. Vector ids are
    /// reconstructed from this count on deletion.
    pub chunk_count: usize,
    pub file_type: String,
    pub file_size: u64,
}

impl Document {
    /// Vector-store id for chunk `index` of this document.
    pub fn chunk_id(&self, index: usize) -> String {
        format!("{}_chunk_{}", self.id, index)
    }
}

/// One entry of the chat transcript.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<DocumentSource>>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, true, None)
    }

    pub fn assistant(text: impl Into<String>, sources: Option<Vec<DocumentSource>>) -> Self {
        Self::new(text, false, sources)
    }

    fn new(text: impl Into<String>, is_user: bool, sources: Option<Vec<DocumentSource>>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("msg_{}", now.timestamp_millis()),
            text: text.into(),
            is_user,
            timestamp: now,
            sources,
        }
    }
}

/// A retrieval citation attached to an assistant message. Derived from a
/// vector match at query time, never persisted on its own.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DocumentSource {
    pub filename: String,
    pub chunk_id: String,
    pub score: f32,
    pub snippet: String,
}
