//! OpenAI-compatible embedding, completion and tag-generation client.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::config::AiConfig;
use crate::error::{Error, Result};

/// Embedding requests are truncated to this many characters; the embedding
/// model has a hard token limit.
const MAX_EMBED_CHARS: usize = 8000;
/// Excerpt length handed to the tag-generation prompt.
const MAX_TAG_CHARS: usize = 2000;

const COMPLETION_TEMPERATURE: f32 = 0.7;
const COMPLETION_MAX_TOKENS: u32 = 1200;

/// Seam between the orchestration layers and the hosted AI API, so the
/// pipeline and chat flows can run against test doubles.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Turn `text` into a fixed-dimension embedding vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Non-streamed chat completion conditioned on `context`.
    async fn complete(&self, query: &str, context: &str) -> Result<String>;

    /// Streamed chat completion; `on_token` is invoked per content
    /// increment and the accumulated full text is returned.
    async fn complete_stream(
        &self,
        query: &str,
        context: &str,
        on_token: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String>;

    /// Short descriptive tag list for a document excerpt. Falls back to a
    /// deterministic extension-derived list when the reply cannot be parsed.
    async fn generate_tags(&self, text: &str, filename: &str) -> Result<Vec<String>>;
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// One parsed server-sent-events frame of a streamed completion.
#[derive(Debug, PartialEq)]
struct StreamFrame {
    delta: Option<String>,
    done: bool,
}

/// Parse a single line of a streamed response. Returns `None` for
/// non-`data:` lines and for malformed JSON frames, which are skipped.
fn parse_stream_frame(line: &str) -> Option<StreamFrame> {
    let data = line.strip_prefix("data: ")?;
    if data == "[DONE]" {
        return Some(StreamFrame {
            delta: None,
            done: true,
        });
    }
    let parsed: StreamResponse = serde_json::from_str(data).ok()?;
    let choice = parsed.choices.into_iter().next()?;
    Some(StreamFrame {
        delta: choice.delta.content,
        done: choice.finish_reason.is_some(),
    })
}

/// Deterministic tag fallback derived from the filename's extension.
fn fallback_tags(filename: &str) -> Vec<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "file".to_string());
    vec![ext, "document".to_string(), "untagged".to_string()]
}

/// Split a comma-separated tag reply into at most five non-empty tags.
/// Returns `None` when nothing usable remains.
fn parse_tag_reply(reply: &str) -> Option<Vec<String>> {
    let tags: Vec<String> = reply
        .split(',')
        .map(|t| t.trim().trim_matches(|c| c == '"' || c == '.').to_string())
        .filter(|t| !t.is_empty())
        .take(5)
        .collect();
    if tags.is_empty() {
        None
    } else {
        Some(tags)
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Client for the hosted embedding/completion API.
pub struct AiClient {
    config: AiConfig,
    http: Client,
}

impl AiClient {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn require_key(&self) -> Result<()> {
        if self.config.api_key.is_empty() {
            return Err(Error::Auth("AI provider API key is not set".into()));
        }
        Ok(())
    }

    fn prompt_messages(query: &str, context: &str) -> Vec<WireMessage> {
        vec![
            WireMessage {
                role: "system".into(),
                content: format!(
                    "You are a helpful assistant that answers questions about the \
                     user's documents. Base your answer on the excerpts below; if \
                     they do not contain the answer, say so.\n\nContext:\n{context}"
                ),
            },
            WireMessage {
                role: "user".into(),
                content: query.to_string(),
            },
        ]
    }

    async fn send_completion(&self, body: &ChatCompletionRequest) -> Result<reqwest::Response> {
        self.require_key()?;
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::Provider { status, message });
        }
        Ok(resp)
    }
}

#[async_trait]
impl AiProvider for AiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.require_key()?;
        let body = EmbeddingRequest {
            model: self.config.embedding_model.clone(),
            input: truncate_chars(text, MAX_EMBED_CHARS).to_string(),
        };

        let resp = self
            .http
            .post(format!("{}/embeddings", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::Provider { status, message });
        }

        let data: EmbeddingResponse = resp.json().await?;
        data.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Provider {
                status: 200,
                message: "embedding response contained no data".into(),
            })
    }

    async fn complete(&self, query: &str, context: &str) -> Result<String> {
        let body = ChatCompletionRequest {
            model: self.config.chat_model.clone(),
            messages: Self::prompt_messages(query, context),
            stream: false,
            temperature: COMPLETION_TEMPERATURE,
            max_tokens: COMPLETION_MAX_TOKENS,
        };

        let resp = self.send_completion(&body).await?;
        let data: ChatCompletionResponse = resp.json().await?;
        data.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Provider {
                status: 200,
                message: "completion response contained no choices".into(),
            })
    }

    async fn complete_stream(
        &self,
        query: &str,
        context: &str,
        on_token: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String> {
        let body = ChatCompletionRequest {
            model: self.config.chat_model.clone(),
            messages: Self::prompt_messages(query, context),
            stream: true,
            temperature: COMPLETION_TEMPERATURE,
            max_tokens: COMPLETION_MAX_TOKENS,
        };

        let resp = self.send_completion(&body).await?;

        let mut full_content = String::new();
        let mut stream = resp.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer = buffer[pos + 1..].to_string();

                if let Some(frame) = parse_stream_frame(&line) {
                    if let Some(delta) = &frame.delta {
                        full_content.push_str(delta);
                        on_token(delta);
                    }
                    if frame.done {
                        return Ok(full_content);
                    }
                }
            }
        }

        Ok(full_content)
    }

    async fn generate_tags(&self, text: &str, filename: &str) -> Result<Vec<String>> {
        let body = ChatCompletionRequest {
            model: self.config.chat_model.clone(),
            messages: vec![
                WireMessage {
                    role: "system".into(),
                    content: "You label document excerpts. Reply with 3 to 5 short, \
                              lowercase descriptive tags, comma-separated, and \
                              nothing else."
                        .into(),
                },
                WireMessage {
                    role: "user".into(),
                    content: format!(
                        "Filename: {filename}\n\n{}",
                        truncate_chars(text, MAX_TAG_CHARS)
                    ),
                },
            ],
            stream: false,
            temperature: COMPLETION_TEMPERATURE,
            max_tokens: 100,
        };

        let resp = self.send_completion(&body).await?;
        let data: ChatCompletionResponse = resp.json().await?;
        let reply = data
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(parse_tag_reply(&reply).unwrap_or_else(|| {
            warn!(filename, "tag reply unusable, using fallback tags");
            fallback_tags(filename)
        }))
    }
}
