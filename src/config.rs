use serde::{Deserialize, Serialize};

pub const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Persisted provider credentials and endpoints.
///
/// Loaded once at startup and replaced wholesale when the user updates
/// settings; clients never read credentials from ambient state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub ai_api_key: Option<String>,
    pub ai_base_url: Option<String>,
    pub vector_api_key: Option<String>,
    pub vector_index_host: Option<String>,
}

impl Settings {
    /// Presence-only readiness check: both provider keys are set and
    /// non-empty. No format validation.
    pub fn ready(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|k| !k.is_empty());
        present(&self.ai_api_key) && present(&self.vector_api_key)
    }

    pub fn ai_config(&self) -> AiConfig {
        AiConfig {
            api_key: self.ai_api_key.clone().unwrap_or_default(),
            base_url: self
                .ai_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_AI_BASE_URL.to_string()),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    pub fn vector_config(&self) -> VectorConfig {
        VectorConfig {
            api_key: self.vector_api_key.clone().unwrap_or_default(),
            index_host: self.vector_index_host.clone().unwrap_or_default(),
        }
    }
}

/// Configuration for the OpenAI-compatible embedding/completion client.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
}

impl AiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_AI_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

/// Configuration for the hosted vector index client.
#[derive(Debug, Clone)]
pub struct VectorConfig {
    pub api_key: String,
    /// Base URL of the index, e.g. `https://myindex-abc123.svc.pinecone.io`.
    pub index_host: String,
}

impl VectorConfig {
    pub fn new(api_key: impl Into<String>, index_host: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            index_host: index_host.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_requires_both_keys() {
        let mut settings = Settings::default();
        assert!(!settings.ready());
        settings.ai_api_key = Some("sk-test".into());
        assert!(!settings.ready());
        settings.vector_api_key = Some("pc-test".into());
        assert!(settings.ready());
    }

    #[test]
    fn empty_key_is_not_ready() {
        let settings = Settings {
            ai_api_key: Some(String::new()),
            vector_api_key: Some("pc-test".into()),
            ..Default::default()
        };
        assert!(!settings.ready());
    }

    #[test]
    fn ai_config_defaults() {
        let settings = Settings {
            ai_api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let config = settings.ai_config();
        assert_eq!(config.base_url, DEFAULT_AI_BASE_URL);
        assert_eq!(config.chat_model, DEFAULT_CHAT_MODEL);
    }
}
