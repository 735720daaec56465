//! In-memory stand-ins for the hosted providers, shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::ai::AiProvider;
use crate::error::{Error, Result};
use crate::vector::{VectorMatch, VectorStore};

#[derive(Default)]
pub struct FakeAi {
    embed_calls: AtomicUsize,
    tag_calls: AtomicUsize,
    /// 1-based embed call number that should fail, if any.
    fail_embed_call: Option<usize>,
    last_context: Mutex<Option<String>>,
}

impl FakeAi {
    pub fn fail_embed_call(mut self, call: usize) -> Self {
        self.fail_embed_call = Some(call);
        self
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn tag_calls(&self) -> usize {
        self.tag_calls.load(Ordering::SeqCst)
    }

    pub fn last_context(&self) -> Option<String> {
        self.last_context.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for FakeAi {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        let call = self.embed_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_embed_call == Some(call) {
            return Err(Error::Provider {
                status: 500,
                message: "embedding unavailable".into(),
            });
        }
        Ok(vec![0.1, 0.2, 0.3])
    }

    async fn complete(&self, query: &str, context: &str) -> Result<String> {
        *self.last_context.lock().unwrap() = Some(context.to_string());
        Ok(format!("answer to: {query}"))
    }

    async fn complete_stream(
        &self,
        query: &str,
        context: &str,
        on_token: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String> {
        *self.last_context.lock().unwrap() = Some(context.to_string());
        let full = format!("answer to: {query}");
        for token in ["answer ", "to: ", query] {
            on_token(token);
        }
        Ok(full)
    }

    async fn generate_tags(&self, _text: &str, _filename: &str) -> Result<Vec<String>> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec!["alpha".into(), "beta".into(), "gamma".into()])
    }
}

#[derive(Default)]
pub struct FakeVector {
    upserts: Mutex<Vec<(String, Value)>>,
    deletes: Mutex<Vec<String>>,
    matches: Mutex<Vec<VectorMatch>>,
}

impl FakeVector {
    pub fn with_matches(self, matches: Vec<VectorMatch>) -> Self {
        *self.matches.lock().unwrap() = matches;
        self
    }

    /// Ids upserted so far, in order.
    pub fn upserted(&self) -> Vec<String> {
        self.upserts
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn metadata_for(&self, id: &str) -> Option<Value> {
        self.upserts
            .lock()
            .unwrap()
            .iter()
            .find(|(stored, _)| stored == id)
            .map(|(_, meta)| meta.clone())
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for FakeVector {
    async fn upsert(&self, id: &str, _values: &[f32], metadata: Value) -> Result<bool> {
        self.upserts
            .lock()
            .unwrap()
            .push((id.to_string(), metadata));
        Ok(true)
    }

    async fn query(
        &self,
        _vector: &[f32],
        top_k: usize,
        _filter: Option<Value>,
    ) -> Result<Vec<VectorMatch>> {
        let matches = self.matches.lock().unwrap();
        Ok(matches.iter().take(top_k).cloned().collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<bool> {
        self.deletes.lock().unwrap().extend_from_slice(ids);
        Ok(true)
    }

    async fn stats(&self) -> Result<Value> {
        Ok(json!({ "totalVectorCount": self.upserts.lock().unwrap().len() }))
    }
}
