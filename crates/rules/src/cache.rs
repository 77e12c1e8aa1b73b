//! Compiled rule snapshot with atomic wholesale replacement.

use chrono::{DateTime, Utc};
use parley_core::error::{RuleError, StoreError};
use parley_core::rule::Rule;
use parley_core::store::RuleStore;
use regex_lite::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Compile one pattern case-insensitively.
pub fn compile_pattern(pattern: &str) -> Result<Regex, RuleError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| RuleError::InvalidPattern {
            rule_id: None,
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// A rule ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule_id: i64,
    pub matchers: Vec<Regex>,
    pub answer: String,
    pub source: String,
}

impl CompiledRule {
    /// Compile every pattern of `rule`. Fails on the first bad pattern or an
    /// empty pattern list.
    pub fn compile(rule: &Rule) -> Result<Self, RuleError> {
        let matchers = rule
            .patterns
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| {
                compile_pattern(p).map_err(|e| match e {
                    RuleError::InvalidPattern { pattern, reason, .. } => RuleError::InvalidPattern {
                        rule_id: Some(rule.id),
                        pattern,
                        reason,
                    },
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if matchers.is_empty() {
            return Err(RuleError::NoPatterns);
        }

        Ok(Self {
            rule_id: rule.id,
            matchers,
            answer: rule.answer.clone(),
            source: rule.source.clone(),
        })
    }

    /// Regex search (not full match) against any pattern.
    pub fn is_match(&self, text: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(text))
    }
}

/// An immutable view of the active rules, in ascending id order.
#[derive(Debug, Default)]
pub struct RuleSnapshot {
    pub rules: Vec<CompiledRule>,
    pub generation: u64,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Summary of one successful reload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReloadReport {
    pub active: usize,
    pub skipped: Vec<i64>,
    pub generation: u64,
}

/// The shared rule cache.
///
/// Readers clone the current `Arc<RuleSnapshot>` and match against it without
/// holding any lock. A reload compiles the new set off to the side and then
/// swaps the pointer.
pub struct RuleCache {
    current: RwLock<Arc<RuleSnapshot>>,
    reloading: tokio::sync::Mutex<()>,
}

impl RuleCache {
    /// An empty cache (generation 0). Nothing matches until the first reload.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(RuleSnapshot::default())),
            reloading: tokio::sync::Mutex::new(()),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().generation
    }

    pub fn len(&self) -> usize {
        self.snapshot().rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuild from the store's active rules.
    ///
    /// Rules that fail to compile are skipped. If the store cannot be read the
    /// previous snapshot stays in place and the error is returned.
    pub async fn reload(&self, store: &dyn RuleStore) -> Result<ReloadReport, StoreError> {
        // Serialize reloads so generations are monotonic and the last writer wins
        let _guard = self.reloading.lock().await;

        let rules = match store.load_active_rules().await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(error = %e, "Rule reload failed; keeping previous rules");
                return Err(e);
            }
        };

        let report = self.install(&rules);
        info!(
            active = report.active,
            skipped = report.skipped.len(),
            generation = report.generation,
            "Rule cache reloaded"
        );
        Ok(report)
    }

    /// Compile `rules` and publish them as the next generation.
    fn install(&self, rules: &[Rule]) -> ReloadReport {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut skipped = Vec::new();

        for rule in rules.iter().filter(|r| r.active) {
            match CompiledRule::compile(rule) {
                Ok(c) => compiled.push(c),
                Err(e) => {
                    warn!(rule_id = rule.id, error = %e, "Skipping rule");
                    skipped.push(rule.id);
                }
            }
        }
        compiled.sort_by_key(|c| c.rule_id);

        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let generation = current.generation + 1;
        let active = compiled.len();
        *current = Arc::new(RuleSnapshot {
            rules: compiled,
            generation,
            loaded_at: Some(Utc::now()),
        });

        ReloadReport {
            active,
            skipped,
            generation,
        }
    }

    /// Build a cache directly from rules, bypassing a store.
    pub fn from_rules(rules: &[Rule]) -> Self {
        let cache = Self::new();
        cache.install(rules);
        cache
    }
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::new()
    }
}
