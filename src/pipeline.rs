//! Document ingestion pipeline: extract, chunk, embed, tag, upsert.
//!
//! Chunks are processed strictly one at a time; a failure on one chunk is
//! logged, recorded in the report and skipped so a single bad chunk cannot
//! abort an entire upload. The returned [`ProcessingReport`] carries the
//! per-chunk outcomes so callers can surface partial completion.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::ai::AiProvider;
use crate::db::models::Document;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::extract::{extract_text, ExtractedText, PdfExtractor, TextExtractor};
use crate::vector::VectorStore;

/// Default per-chunk budget in estimated tokens.
pub const DEFAULT_CHUNK_TOKENS: usize = 500;

/// Cheap token-count estimate: ceiling of character length over four.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split `text` into chunks of at most `max_tokens` estimated tokens.
///
/// Input that already fits the budget comes back as a single chunk equal
/// to the trimmed text. Longer input is split into sentences that are
/// accumulated greedily and joined with `". "`; a single sentence over the
/// budget becomes its own oversized chunk. That segmentation is lossy with
/// respect to original punctuation and whitespace. Zero produced chunks
/// yields the original text as a single chunk.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let trimmed = text.trim();
    if estimate_tokens(trimmed) <= max_tokens {
        return vec![trimmed.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let candidate = if current.is_empty() {
            sentence.to_string()
        } else {
            format!("{current}. {sentence}")
        };
        if !current.is_empty() && estimate_tokens(&candidate) > max_tokens {
            chunks.push(current.trim().to_string());
            current = sentence.to_string();
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        chunks.push(current.trim().to_string());
    }

    if chunks.is_empty() {
        return vec![text.to_string()];
    }
    chunks
}

/// Pipeline stage, reported through the progress callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Extracting,
    Chunking,
    Embedding { current: usize, total: usize },
    Completed,
    Error,
}

/// Transient progress report emitted during processing. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingStatus {
    pub filename: String,
    pub stage: Stage,
    /// Percentage, 0..=100.
    pub progress: u8,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ProcessingStatus {
    fn new(filename: &str, stage: Stage, progress: u8) -> Self {
        Self {
            filename: filename.to_string(),
            stage,
            progress,
            message: None,
            error: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Outcome of one chunk of the processing loop.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkOutcome {
    pub index: usize,
    pub error: Option<String>,
}

impl ChunkOutcome {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a document-processing run: the stored record plus the typed
/// per-chunk outcomes (actual-versus-expected, since failed chunks have no
/// stored vector even though `chunk_count` counts them).
#[derive(Debug, Serialize)]
pub struct ProcessingReport {
    pub document: Document,
    pub chunks: Vec<ChunkOutcome>,
}

impl ProcessingReport {
    pub fn succeeded(&self) -> usize {
        self.chunks.iter().filter(|c| c.ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.chunks.len() - self.succeeded()
    }
}

/// The document ingestion pipeline.
pub struct DocumentPipeline {
    ai: Arc<dyn AiProvider>,
    vector: Arc<dyn VectorStore>,
    db: Arc<Database>,
    extractors: Vec<Box<dyn TextExtractor>>,
    max_chunk_tokens: usize,
}

impl DocumentPipeline {
    pub fn new(ai: Arc<dyn AiProvider>, vector: Arc<dyn VectorStore>, db: Arc<Database>) -> Self {
        Self {
            ai,
            vector,
            db,
            extractors: vec![Box::new(PdfExtractor)],
            max_chunk_tokens: DEFAULT_CHUNK_TOKENS,
        }
    }

    /// Register an additional extraction plugin.
    pub fn with_extractor(mut self, extractor: Box<dyn TextExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn with_chunk_budget(mut self, max_tokens: usize) -> Self {
        self.max_chunk_tokens = max_tokens;
        self
    }

    /// Run the full pipeline on one file:
    /// `pending -> extracting -> chunking -> embedding(i/n) -> completed`.
    ///
    /// Extraction and credential failures abort and are also surfaced
    /// through the callback's `error` field; per-chunk failures are
    /// recorded in the report and skipped.
    pub async fn process_document(
        &self,
        path: &Path,
        mut on_progress: impl FnMut(ProcessingStatus) + Send,
    ) -> Result<ProcessingReport> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        on_progress(ProcessingStatus::new(&filename, Stage::Pending, 0));
        on_progress(
            ProcessingStatus::new(&filename, Stage::Extracting, 10)
                .with_message("extracting text"),
        );

        let extracted = match extract_text(path, &self.extractors) {
            Ok(extracted) => extracted,
            Err(e) => {
                on_progress(
                    ProcessingStatus::new(&filename, Stage::Error, 10).with_error(e.to_string()),
                );
                return Err(e);
            }
        };
        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        self.process_extracted(filename, extracted, file_size, &mut on_progress)
            .await
    }

    async fn process_extracted(
        &self,
        filename: String,
        extracted: ExtractedText,
        file_size: u64,
        on_progress: &mut (impl FnMut(ProcessingStatus) + Send),
    ) -> Result<ProcessingReport> {
        let chunks = chunk_text(&extracted.content, self.max_chunk_tokens);
        let total = chunks.len();
        on_progress(
            ProcessingStatus::new(&filename, Stage::Chunking, 30)
                .with_message(format!("split into {total} chunks")),
        );

        let mut document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.clone(),
            text: extracted.content.clone(),
            uploaded_at: chrono::Utc::now(),
            processed: false,
            chunk_count: total,
            file_type: extracted.file_type,
            file_size,
        };
        self.db.insert_document(&document)?;

        on_progress(ProcessingStatus::new(
            &filename,
            Stage::Embedding { current: 0, total },
            50,
        ));

        let mut outcomes = Vec::with_capacity(total);
        for (index, chunk) in chunks.iter().enumerate() {
            let outcome = match self.process_chunk(&document, index, chunk).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Missing credentials abort the whole run.
                    on_progress(
                        ProcessingStatus::new(&filename, Stage::Error, 50)
                            .with_error(e.to_string()),
                    );
                    return Err(e);
                }
            };
            if let Some(error) = &outcome.error {
                warn!(filename = %filename, chunk = index, error = %error, "chunk processing failed");
            }
            let progress = 50 + ((index + 1) * 40 / total) as u8;
            on_progress(ProcessingStatus::new(
                &filename,
                Stage::Embedding {
                    current: index + 1,
                    total,
                },
                progress,
            ));
            outcomes.push(outcome);
        }

        document.processed = true;
        self.db.update_document(&document)?;

        let succeeded = outcomes.iter().filter(|o| o.ok()).count();
        info!(filename = %filename, succeeded, total, "document processed");
        on_progress(
            ProcessingStatus::new(&filename, Stage::Completed, 100)
                .with_message(format!("processed {succeeded}/{total} chunks")),
        );

        Ok(ProcessingReport {
            document,
            chunks: outcomes,
        })
    }

    async fn process_chunk(
        &self,
        document: &Document,
        index: usize,
        text: &str,
    ) -> Result<ChunkOutcome> {
        let result = async {
            let embedding = self.ai.embed(text).await?;
            let tags = self.ai.generate_tags(text, &document.filename).await?;
            let metadata = json!({
                "filename": document.filename,
                "chunk_id": index,
                "text": text,
                "tags": tags,
                "document_id": document.id,
                "filetype": document.file_type,
            });
            self.vector
                .upsert(&document.chunk_id(index), &embedding, metadata)
                .await
        }
        .await;

        match result {
            Ok(true) => Ok(ChunkOutcome { index, error: None }),
            Ok(false) => Ok(ChunkOutcome {
                index,
                error: Some("vector upsert failed".into()),
            }),
            Err(e @ Error::Auth(_)) => Err(e),
            Err(e) => Ok(ChunkOutcome {
                index,
                error: Some(e.to_string()),
            }),
        }
    }

    /// Delete a document and its vectors. Chunk ids are reconstructed from
    /// `chunk_count`; ids of chunks that never made it into the index are
    /// tolerated by the store as no-ops.
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let Some(document) = self.db.get_document(id)? else {
            warn!(id, "delete requested for unknown document");
            return Ok(false);
        };

        let ids: Vec<String> = (0..document.chunk_count)
            .map(|i| document.chunk_id(i))
            .collect();
        let deleted = if ids.is_empty() {
            true
        } else {
            self.vector.delete(&ids).await?
        };

        self.db.remove_document(id)?;
        Ok(deleted)
    }
}
