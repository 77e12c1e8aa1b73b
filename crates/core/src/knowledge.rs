//! Knowledge index trait: the semantic index behind retrieval.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A reference passage returned by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    /// Source label, e.g. "民法典第675条"
    pub source: String,
    /// Relevance score (higher = more relevant)
    #[serde(default)]
    pub score: f32,
}

impl Passage {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            score: 0.0,
        }
    }
}

/// A searchable passage index.
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    /// Backend name for logging ("keyword", "embedding").
    fn name(&self) -> &str;

    /// Up to `k` passages, most relevant first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError>;

    /// Add a passage to the index.
    async fn add(&self, passage: Passage) -> Result<(), RetrievalError>;

    /// Number of indexed passages.
    async fn count(&self) -> Result<usize, RetrievalError>;
}
