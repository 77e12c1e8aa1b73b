//! Administrative rule mutation. Every successful mutation reloads the cache.

use crate::cache::{ReloadReport, RuleCache, compile_pattern};
use chrono::Utc;
use parley_core::error::{RuleError, StoreError};
use parley_core::event::{DomainEvent, EventBus};
use parley_core::rule::{NewRule, Rule, RuleUpdate};
use parley_core::store::RuleStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Invalid(#[from] RuleError),

    #[error("Rule not found: {0}")]
    NotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of the cache reload that follows a mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReloadStatus {
    Reloaded(ReloadReport),
    Failed { error: String },
}

/// A committed mutation plus the reload outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMutation<T> {
    pub item: T,
    pub reload: ReloadStatus,
}

/// Rule CRUD over a store, keeping a cache in step.
#[derive(Clone)]
pub struct RuleAdmin {
    store: Arc<dyn RuleStore>,
    cache: Arc<RuleCache>,
    events: Option<Arc<EventBus>>,
}

impl RuleAdmin {
    pub fn new(store: Arc<dyn RuleStore>, cache: Arc<RuleCache>) -> Self {
        Self {
            store,
            cache,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cache(&self) -> &Arc<RuleCache> {
        &self.cache
    }

    pub async fn list(&self) -> Result<Vec<Rule>, AdminError> {
        Ok(self.store.list_rules().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Rule, AdminError> {
        self.store
            .get_rule(id)
            .await?
            .ok_or(AdminError::NotFound(id))
    }

    pub async fn create(&self, rule: NewRule) -> Result<RuleMutation<Rule>, AdminError> {
        rule.check_shape()?;
        validate_patterns(&rule.patterns)?;

        let created = self.store.create_rule(rule).await?;
        info!(rule_id = created.id, "Rule created");
        Ok(self.committed(created).await)
    }

    pub async fn update(&self, id: i64, update: RuleUpdate) -> Result<RuleMutation<Rule>, AdminError> {
        update.check_shape()?;
        if let Some(patterns) = &update.patterns {
            validate_patterns(patterns)?;
        }

        let updated = self
            .store
            .update_rule(id, update)
            .await?
            .ok_or(AdminError::NotFound(id))?;
        info!(rule_id = id, active = updated.active, "Rule updated");
        Ok(self.committed(updated).await)
    }

    pub async fn delete(&self, id: i64) -> Result<RuleMutation<i64>, AdminError> {
        if !self.store.delete_rule(id).await? {
            return Err(AdminError::NotFound(id));
        }
        info!(rule_id = id, "Rule deleted");
        Ok(self.committed(id).await)
    }

    /// Rebuild the cache from the store.
    pub async fn reload(&self) -> Result<ReloadReport, AdminError> {
        match self.cache.reload(self.store.as_ref()).await {
            Ok(report) => {
                self.publish_reload(&report);
                Ok(report)
            }
            Err(e) => {
                self.publish_failure(&e);
                Err(e.into())
            }
        }
    }

    async fn committed<T>(&self, item: T) -> RuleMutation<T> {
        let reload = match self.reload().await {
            Ok(report) => ReloadStatus::Reloaded(report),
            Err(e) => {
                error!(error = %e, "Cache reload after rule mutation failed");
                ReloadStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        RuleMutation { item, reload }
    }

    fn publish_reload(&self, report: &ReloadReport) {
        if let Some(events) = &self.events {
            events.publish(DomainEvent::RulesReloaded {
                active: report.active,
                skipped: report.skipped.len(),
                generation: report.generation,
                timestamp: Utc::now(),
            });
        }
    }

    fn publish_failure(&self, e: &StoreError) {
        if let Some(events) = &self.events {
            events.publish(DomainEvent::ErrorOccurred {
                context: "rule_reload".into(),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}

/// Every non-blank pattern must compile.
fn validate_patterns(patterns: &[String]) -> Result<(), RuleError> {
    for pattern in patterns.iter().filter(|p| !p.trim().is_empty()) {
        compile_pattern(pattern)?;
    }
    Ok(())
}
