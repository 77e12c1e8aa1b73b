//! Knowledge retrieval with a hard time budget.

use parley_core::knowledge::{KnowledgeIndex, Passage};
use parley_core::outcome::CallOutcome;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const MIN_K: usize = 1;
pub const MAX_K: usize = 10;

/// Queries a [`KnowledgeIndex`] and never fails the caller.
#[derive(Clone)]
pub struct KnowledgeRetriever {
    index: Arc<dyn KnowledgeIndex>,
    default_k: usize,
    timeout: Duration,
}

impl KnowledgeRetriever {
    pub fn new(index: Arc<dyn KnowledgeIndex>, default_k: usize, timeout: Duration) -> Self {
        Self {
            index,
            default_k: default_k.clamp(MIN_K, MAX_K),
            timeout,
        }
    }

    pub fn index(&self) -> &Arc<dyn KnowledgeIndex> {
        &self.index
    }

    /// Up to `k` passages (default k when `None`, clamped to 1..=10).
    pub async fn search(&self, query: &str, k: Option<usize>) -> CallOutcome<Vec<Passage>> {
        let k = k.unwrap_or(self.default_k).clamp(MIN_K, MAX_K);
        let outcome = CallOutcome::within(self.timeout, self.index.search(query, k)).await;
        match &outcome {
            CallOutcome::Completed(passages) => {
                debug!(index = self.index.name(), k, hits = passages.len(), "Retrieval complete")
            }
            CallOutcome::Failed(reason) => {
                warn!(index = self.index.name(), reason = %reason, "Retrieval failed")
            }
            CallOutcome::TimedOut => {
                warn!(index = self.index.name(), timeout = ?self.timeout, "Retrieval timed out")
            }
        }
        outcome
    }
}

/// Render passages as the context block handed to the agents.
pub fn format_context(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| format!("【来源：{}】\n内容：{}", p.source, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Distinct passage sources in rank order, joined with "; ".
pub fn citations(passages: &[Passage]) -> Option<String> {
    let mut seen = HashSet::new();
    let sources: Vec<&str> = passages
        .iter()
        .map(|p| p.source.as_str())
        .filter(|s| !s.is_empty() && seen.insert(*s))
        .collect();
    if sources.is_empty() {
        None
    } else {
        Some(sources.join("; "))
    }
}
