//! Backing store traits.
//!
//! The store owns durable state. The rule cache and the history window are
//! projections computed from it.

use async_trait::async_trait;

use crate::conversation::{ConversationTurn, FeedbackScore, NewTurn, Session, SessionId};
use crate::error::StoreError;
use crate::rule::{NewRule, Rule, RuleUpdate};

/// Durable rule storage.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Active rules in ascending id order.
    async fn load_active_rules(&self) -> Result<Vec<Rule>, StoreError>;

    /// All rules (active or not) in ascending id order.
    async fn list_rules(&self) -> Result<Vec<Rule>, StoreError>;

    async fn get_rule(&self, id: i64) -> Result<Option<Rule>, StoreError>;

    async fn create_rule(&self, rule: NewRule) -> Result<Rule, StoreError>;

    /// Apply a partial update. `Ok(None)` if no such rule.
    async fn update_rule(&self, id: i64, update: RuleUpdate) -> Result<Option<Rule>, StoreError>;

    /// Delete a rule. Returns whether it existed.
    async fn delete_rule(&self, id: i64) -> Result<bool, StoreError>;
}

/// Durable session and turn storage.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_session(&self) -> Result<Session, StoreError>;

    /// Return the session, creating it under the given id if missing.
    async fn ensure_session(&self, id: &SessionId) -> Result<Session, StoreError>;

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;

    async fn append_turn(&self, turn: NewTurn) -> Result<ConversationTurn, StoreError>;

    /// Turns ordered by creation time, ties broken by id.
    async fn load_turns(&self, id: &SessionId) -> Result<Vec<ConversationTurn>, StoreError>;

    async fn get_turn(&self, turn_id: i64) -> Result<Option<ConversationTurn>, StoreError>;

    /// Record a user's score on a turn. `Ok(None)` if no such turn.
    async fn set_feedback(
        &self,
        turn_id: i64,
        score: FeedbackScore,
    ) -> Result<Option<ConversationTurn>, StoreError>;

    /// Record an administrator's corrected answer. `Ok(None)` if no such turn.
    async fn set_correction(
        &self,
        turn_id: i64,
        correction: &str,
    ) -> Result<Option<ConversationTurn>, StoreError>;
}
