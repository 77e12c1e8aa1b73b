//! Administratively managed canned-answer rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// A rule as owned by the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Store row id; cache order is ascending id
    pub id: i64,
    /// Regex patterns, matched case-insensitively
    pub patterns: Vec<String>,
    pub answer: String,
    /// Provenance label returned as the citation on a hit
    pub source: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRule {
    pub patterns: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewRule {
    pub fn new(patterns: Vec<String>, answer: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            patterns,
            answer: answer.into(),
            source: source.into(),
            active: true,
        }
    }

    /// Structural checks. Pattern compilation is checked by the rules crate.
    pub fn check_shape(&self) -> Result<(), RuleError> {
        if self.patterns.iter().all(|p| p.trim().is_empty()) {
            return Err(RuleError::NoPatterns);
        }
        if self.answer.trim().is_empty() {
            return Err(RuleError::EmptyAnswer);
        }
        Ok(())
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleUpdate {
    #[serde(default)]
    pub patterns: Option<Vec<String>>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl RuleUpdate {
    pub fn activate(active: bool) -> Self {
        Self {
            active: Some(active),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_none() && self.answer.is_none() && self.source.is_none() && self.active.is_none()
    }

    pub fn check_shape(&self) -> Result<(), RuleError> {
        if self
            .patterns
            .as_ref()
            .is_some_and(|ps| ps.iter().all(|p| p.trim().is_empty()))
        {
            return Err(RuleError::NoPatterns);
        }
        if self.answer.as_ref().is_some_and(|a| a.trim().is_empty()) {
            return Err(RuleError::EmptyAnswer);
        }
        Ok(())
    }

    /// Apply onto an existing rule, bumping `updated_at`.
    pub fn apply(&self, rule: &mut Rule) -> Result<(), RuleError> {
        self.check_shape()?;
        if let Some(patterns) = &self.patterns {
            rule.patterns = patterns.clone();
        }
        if let Some(answer) = &self.answer {
            rule.answer = answer.clone();
        }
        if let Some(source) = &self.source {
            rule.source = source.clone();
        }
        if let Some(active) = self.active {
            rule.active = active;
        }
        rule.updated_at = Utc::now();
        Ok(())
    }
}
