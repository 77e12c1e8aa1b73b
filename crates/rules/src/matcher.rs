//! First-match-wins rule lookup.

use crate::cache::RuleCache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A matched rule's answer and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleHit {
    pub rule_id: i64,
    pub answer: String,
    pub source: String,
}

/// Matches text against the cache's current snapshot. No I/O.
#[derive(Clone)]
pub struct RuleMatcher {
    cache: Arc<RuleCache>,
}

impl RuleMatcher {
    pub fn new(cache: Arc<RuleCache>) -> Self {
        Self { cache }
    }

    /// The first rule, in ascending id order, with a pattern found in `text`.
    pub fn check(&self, text: &str) -> Option<RuleHit> {
        let snapshot = self.cache.snapshot();
        let hit = snapshot.rules.iter().find(|r| r.is_match(text))?;
        debug!(rule_id = hit.rule_id, generation = snapshot.generation, "Rule matched");
        Some(RuleHit {
            rule_id: hit.rule_id,
            answer: hit.answer.clone(),
            source: hit.source.clone(),
        })
    }

    pub fn cache(&self) -> &Arc<RuleCache> {
        &self.cache
    }
}
