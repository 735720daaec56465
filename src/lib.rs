//! Document-ingestion and retrieval-augmented chat engine.
//!
//! Documents are extracted, chunked, embedded through a hosted
//! OpenAI-compatible API and upserted into a hosted vector index; questions
//! are answered by retrieving the nearest chunks and conditioning a chat
//! completion (optionally streamed) on their text.
//!
//! The UI, file picker and the vendor services themselves live outside this
//! crate; [`DocumentPipeline`](pipeline::DocumentPipeline) and
//! [`ChatEngine`](chat::ChatEngine) are the two entry points the
//! surrounding application drives.

pub mod ai;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod vector;

#[cfg(test)]
pub(crate) mod testutil;

pub use ai::{AiClient, AiProvider};
pub use chat::ChatEngine;
pub use config::{AiConfig, Settings, VectorConfig};
pub use db::models::{ChatMessage, Document, DocumentSource};
pub use db::Database;
pub use error::{Error, Result};
pub use extract::{PdfExtractor, TextExtractor};
pub use pipeline::{ChunkOutcome, DocumentPipeline, ProcessingReport, ProcessingStatus, Stage};
pub use vector::{VectorClient, VectorMatch, VectorStore};
