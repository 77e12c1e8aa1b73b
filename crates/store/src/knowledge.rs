//! In-process knowledge indexes.
//!
//! - [`KeywordKnowledgeIndex`] scores passages by character-bigram overlap,
//!   which works for CJK text without a tokenizer.
//! - [`EmbeddingKnowledgeIndex`] embeds passages through the generation
//!   service and ranks them by cosine similarity.

use crate::vector;
use async_trait::async_trait;
use parley_core::error::RetrievalError;
use parley_core::knowledge::{KnowledgeIndex, Passage};
use parley_core::provider::{EmbeddingRequest, Provider};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// The reference passages loaded into an empty index.
pub fn seed_passages() -> Vec<Passage> {
    vec![
        Passage::new(
            "《中华人民共和国民法典》第六百七十五条：借款人应当按照约定的期限返还借款。对借款期限没有约定或者约定不明确，依据本法第五百一十条的规定仍不能确定的，借款人可以随时返还；贷款人可以催告借款人在合理期限内返还。",
            "民法典",
        ),
        Passage::new(
            "《中华人民共和国刑法》第二百六十六条：诈骗公私财物，数额较大的，处三年以下有期徒刑、拘役或者管制，并处或者单处罚金。",
            "刑法",
        ),
        Passage::new(
            "最高人民法院关于审理民间借贷案件适用法律若干问题的规定：出借人向人民法院提起民间借贷诉讼时，应当提供借据、收据、欠条等债权凭证以及其他能够证明借贷法律关系存在的证据。",
            "司法解释",
        ),
        Passage::new(
            "《劳动合同法》第三十七条：劳动者提前三十日以书面形式通知用人单位，可以解除劳动合同。劳动者在试用期内提前三日通知用人单位，可以解除劳动合同。",
            "劳动合同法",
        ),
    ]
}

/// Character n-grams of the alphanumeric runs in `text`, lowercased.
/// Runs of one character contribute the character itself.
fn grams(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    let mut out = HashSet::new();
    for run in lowered.split(|c: char| !c.is_alphanumeric()) {
        let chars: Vec<char> = run.chars().collect();
        match chars.len() {
            0 => {}
            1 => {
                out.insert(chars[0].to_string());
            }
            _ => {
                for pair in chars.windows(2) {
                    out.insert(pair.iter().collect());
                }
            }
        }
    }
    out
}

struct Indexed {
    passage: Passage,
    grams: HashSet<String>,
}

/// Keyword index over character bigrams.
#[derive(Default)]
pub struct KeywordKnowledgeIndex {
    entries: RwLock<Vec<Indexed>>,
}

impl KeywordKnowledgeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// An index pre-loaded with [`seed_passages`].
    pub async fn seeded() -> Self {
        let index = Self::new();
        for passage in seed_passages() {
            index.insert(passage).await;
        }
        index
    }

    async fn insert(&self, passage: Passage) {
        let grams = grams(&format!("{} {}", passage.source, passage.text));
        self.entries.write().await.push(Indexed { passage, grams });
    }
}

#[async_trait]
impl KnowledgeIndex for KeywordKnowledgeIndex {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        let query_grams = grams(query);
        if query_grams.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().await;
        let mut scored: Vec<Passage> = entries
            .iter()
            .filter_map(|e| {
                let hits = query_grams.intersection(&e.grams).count();
                if hits == 0 {
                    return None;
                }
                let mut passage = e.passage.clone();
                passage.score = hits as f32 / query_grams.len() as f32;
                Some(passage)
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        debug!(hits = scored.len(), "Keyword search complete");
        Ok(scored)
    }

    async fn add(&self, passage: Passage) -> Result<(), RetrievalError> {
        self.insert(passage).await;
        Ok(())
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        Ok(self.entries.read().await.len())
    }
}

/// Vector index backed by the generation service's embedding endpoint.
pub struct EmbeddingKnowledgeIndex {
    provider: Arc<dyn Provider>,
    model: String,
    passages: RwLock<Vec<Passage>>,
    vectors: RwLock<Vec<Vec<f32>>>,
}

impl EmbeddingKnowledgeIndex {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            passages: RwLock::new(Vec::new()),
            vectors: RwLock::new(Vec::new()),
        }
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: vec![text.to_string()],
            })
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::EmbeddingFailed("empty embedding response".into()))
    }
}

#[async_trait]
impl KnowledgeIndex for EmbeddingKnowledgeIndex {
    fn name(&self) -> &str {
        "embedding"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embed_one(query).await?;

        let passages = self.passages.read().await;
        let vectors = self.vectors.read().await;
        let ranked = vector::top_k_by_similarity(&vectors, &query_vec, k);

        Ok(ranked
            .into_iter()
            .filter_map(|(i, score)| {
                let mut passage = passages.get(i)?.clone();
                passage.score = score;
                Some(passage)
            })
            .collect())
    }

    async fn add(&self, passage: Passage) -> Result<(), RetrievalError> {
        let embedding = self.embed_one(&passage.text).await?;
        // Take both locks together so indices stay aligned
        let mut passages = self.passages.write().await;
        let mut vectors = self.vectors.write().await;
        passages.push(passage);
        vectors.push(embedding);
        Ok(())
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        Ok(self.passages.read().await.len())
    }
}
