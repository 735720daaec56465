//! Hosted vector index client (Pinecone-style HTTP API).
//!
//! Upsert and delete are best-effort side effects: losing one chunk must not
//! abort a whole document's processing, so they log and return `false`
//! instead of erroring. Query failures propagate because the caller cannot
//! proceed without results.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::VectorConfig;
use crate::error::{Error, Result};

/// One ranked result of a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Value,
}

/// Seam between the orchestration layers and the hosted vector index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store one vector with metadata. Soft-fails with `Ok(false)`; only a
    /// missing credential is an error.
    async fn upsert(&self, id: &str, values: &[f32], metadata: Value) -> Result<bool>;

    /// Top-k similarity query with optional metadata filter.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<VectorMatch>>;

    /// Best-effort delete. Ids that were never upserted are a provider
    /// no-op, not an error.
    async fn delete(&self, ids: &[String]) -> Result<bool>;

    /// Provider-defined index statistics, passed through opaquely.
    async fn stats(&self) -> Result<Value>;
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: Value,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
}

/// Client for the hosted vector index.
pub struct VectorClient {
    config: VectorConfig,
    http: Client,
}

impl VectorClient {
    pub fn new(config: VectorConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn require_key(&self) -> Result<()> {
        if self.config.api_key.is_empty() {
            return Err(Error::Auth("vector index API key is not set".into()));
        }
        Ok(())
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<reqwest::Response> {
        let resp = self
            .http
            .post(format!("{}{}", self.config.index_host, path))
            .header("Api-Key", &self.config.api_key)
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
impl VectorStore for VectorClient {
    async fn upsert(&self, id: &str, values: &[f32], metadata: Value) -> Result<bool> {
        self.require_key()?;
        let body = UpsertRequest {
            vectors: vec![UpsertVector {
                id,
                values,
                metadata,
            }],
        };
        match self.post("/vectors/upsert", &body).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!(id, error = %e, "vector upsert failed");
                Ok(false)
            }
        }
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<VectorMatch>> {
        self.require_key()?;
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            filter,
        };
        let resp = self.post("/query", &body).await?;
        let data: QueryResponse = resp.json().await?;
        Ok(data.matches)
    }

    async fn delete(&self, ids: &[String]) -> Result<bool> {
        self.require_key()?;
        match self.post("/vectors/delete", &DeleteRequest { ids }).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!(count = ids.len(), error = %e, "vector delete failed");
                Ok(false)
            }
        }
    }

    async fn stats(&self) -> Result<Value> {
        self.require_key()?;
        let resp = self
            .post("/describe_index_stats", &serde_json::json!({}))
            .await?;
        Ok(resp.json().await?)
    }
}
