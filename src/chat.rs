//! Retrieval-augmented chat orchestrator.
//!
//! Embeds the query, retrieves the nearest chunks, assembles a context
//! string and asks the completion API for an answer, optionally streaming
//! tokens through a caller-supplied sink. The resulting assistant message
//! is appended to the persisted transcript and returned.

use std::sync::Arc;

use serde_json::Value;

use crate::ai::AiProvider;
use crate::db::models::{ChatMessage, DocumentSource};
use crate::db::Database;
use crate::error::Result;
use crate::vector::{VectorMatch, VectorStore};

/// Default number of nearest chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;

const SNIPPET_CHARS: usize = 200;
const EMPTY_CONTEXT: &str = "No specific information found in the documents.";

pub struct ChatEngine {
    ai: Arc<dyn AiProvider>,
    vector: Arc<dyn VectorStore>,
    db: Arc<Database>,
    top_k: usize,
}

impl ChatEngine {
    pub fn new(ai: Arc<dyn AiProvider>, vector: Arc<dyn VectorStore>, db: Arc<Database>) -> Self {
        Self {
            ai,
            vector,
            db,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Persist a user-authored message. No retrieval is involved.
    pub fn save_user_message(&self, text: &str) -> Result<ChatMessage> {
        let message = ChatMessage::user(text);
        self.db.append_message(&message)?;
        Ok(message)
    }

    /// Answer `query` with a non-streamed completion.
    pub async fn ask(&self, query: &str) -> Result<ChatMessage> {
        self.answer(query, None).await
    }

    /// Answer `query`, streaming partial tokens through `on_token`.
    pub async fn ask_streaming(
        &self,
        query: &str,
        mut on_token: impl FnMut(&str) + Send,
    ) -> Result<ChatMessage> {
        self.answer(query, Some(&mut on_token)).await
    }

    async fn answer(
        &self,
        query: &str,
        on_token: Option<&mut (dyn for<'a> FnMut(&'a str) + Send)>,
    ) -> Result<ChatMessage> {
        let embedding = self.ai.embed(query).await?;
        let matches = self.vector.query(&embedding, self.top_k, None).await?;

        let context = build_context(&matches);
        let sources = build_sources(&matches);

        let text = match on_token {
            Some(sink) => self.ai.complete_stream(query, &context, sink).await?,
            None => self.ai.complete(query, &context).await?,
        };

        let sources = if sources.is_empty() {
            None
        } else {
            Some(sources)
        };
        let message = ChatMessage::assistant(text, sources);
        self.db.append_message(&message)?;
        Ok(message)
    }
}

fn match_text(m: &VectorMatch) -> Option<&str> {
    m.metadata.get("text").and_then(Value::as_str)
}

/// Concatenate retrieved chunk texts, separated by a blank line. Zero
/// usable matches yield a fixed placeholder so the completion still runs.
fn build_context(matches: &[VectorMatch]) -> String {
    let texts: Vec<&str> = matches.iter().filter_map(match_text).collect();
    if texts.is_empty() {
        EMPTY_CONTEXT.to_string()
    } else {
        texts.join("\n\n")
    }
}

/// Derive citations from the retrieval results. Matches without a `text`
/// metadata field carry nothing quotable and are skipped.
fn build_sources(matches: &[VectorMatch]) -> Vec<DocumentSource> {
    matches
        .iter()
        .filter_map(|m| {
            let text = match_text(m)?;
            let filename = m
                .metadata
                .get("filename")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            Some(DocumentSource {
                filename,
                chunk_id: m.id.clone(),
                score: m.score,
                snippet: snippet(text),
            })
        })
        .collect()
}

fn snippet(text: &str) -> String {
    let mut s: String = text.chars().take(SNIPPET_CHARS).collect();
    if text.chars().count() > SNIPPET_CHARS {
        s.push_str("...");
    }
    s
}
