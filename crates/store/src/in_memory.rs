//! In-memory backend: useful for testing and ephemeral deployments.

use async_trait::async_trait;
use chrono::Utc;
use parley_core::conversation::{ConversationTurn, FeedbackScore, NewTurn, Session, SessionId};
use parley_core::error::StoreError;
use parley_core::rule::{NewRule, Rule, RuleUpdate};
use parley_core::store::{ConversationStore, RuleStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    rules: Vec<Rule>,
    next_rule_id: i64,
    sessions: HashMap<SessionId, Session>,
    turns: Vec<ConversationTurn>,
    next_turn_id: i64,
}

/// Stores rules, sessions and turns in process memory.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable store: every call fails until cleared.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RuleStore for InMemoryStore {
    async fn load_active_rules(&self) -> Result<Vec<Rule>, StoreError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables.rules.iter().filter(|r| r.active).cloned().collect())
    }

    async fn list_rules(&self) -> Result<Vec<Rule>, StoreError> {
        self.check_online()?;
        Ok(self.tables.read().await.rules.clone())
    }

    async fn get_rule(&self, id: i64) -> Result<Option<Rule>, StoreError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables.rules.iter().find(|r| r.id == id).cloned())
    }

    async fn create_rule(&self, rule: NewRule) -> Result<Rule, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        tables.next_rule_id += 1;
        let now = Utc::now();
        let created = Rule {
            id: tables.next_rule_id,
            patterns: rule.patterns,
            answer: rule.answer,
            source: rule.source,
            active: rule.active,
            created_at: now,
            updated_at: now,
        };
        // Ids are monotonic, so pushing keeps ascending order
        tables.rules.push(created.clone());
        Ok(created)
    }

    async fn update_rule(&self, id: i64, update: RuleUpdate) -> Result<Option<Rule>, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let Some(rule) = tables.rules.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        update
            .apply(rule)
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        Ok(Some(rule.clone()))
    }

    async fn delete_rule(&self, id: i64) -> Result<bool, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let before = tables.rules.len();
        tables.rules.retain(|r| r.id != id);
        Ok(tables.rules.len() < before)
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn create_session(&self) -> Result<Session, StoreError> {
        self.ensure_session(&SessionId::new()).await
    }

    async fn ensure_session(&self, id: &SessionId) -> Result<Session, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .entry(id.clone())
            .or_insert_with(|| Session {
                id: id.clone(),
                created_at: Utc::now(),
            });
        Ok(session.clone())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        self.check_online()?;
        Ok(self.tables.read().await.sessions.get(id).cloned())
    }

    async fn append_turn(&self, turn: NewTurn) -> Result<ConversationTurn, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        if !tables.sessions.contains_key(&turn.session_id) {
            return Err(StoreError::QueryFailed(format!(
                "unknown session {}",
                turn.session_id
            )));
        }
        tables.next_turn_id += 1;
        let stored = ConversationTurn {
            id: tables.next_turn_id,
            session_id: turn.session_id,
            role: turn.role,
            content: turn.content,
            kind: turn.kind,
            media_ref: turn.media_ref,
            citations: turn.citations,
            feedback_score: None,
            correction: None,
            created_at: Utc::now(),
        };
        tables.turns.push(stored.clone());
        Ok(stored)
    }

    async fn load_turns(&self, id: &SessionId) -> Result<Vec<ConversationTurn>, StoreError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let mut turns: Vec<ConversationTurn> = tables
            .turns
            .iter()
            .filter(|t| &t.session_id == id)
            .cloned()
            .collect();
        turns.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(turns)
    }

    async fn get_turn(&self, turn_id: i64) -> Result<Option<ConversationTurn>, StoreError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables.turns.iter().find(|t| t.id == turn_id).cloned())
    }

    async fn set_feedback(
        &self,
        turn_id: i64,
        score: FeedbackScore,
    ) -> Result<Option<ConversationTurn>, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        Ok(tables.turns.iter_mut().find(|t| t.id == turn_id).map(|turn| {
            turn.feedback_score = Some(score);
            turn.clone()
        }))
    }

    async fn set_correction(
        &self,
        turn_id: i64,
        correction: &str,
    ) -> Result<Option<ConversationTurn>, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        Ok(tables.turns.iter_mut().find(|t| t.id == turn_id).map(|turn| {
            turn.correction = Some(correction.to_string());
            turn.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::conversation::{InboundMessage, ReplyPayload, TurnKind};
    use parley_core::message::Role;

    #[tokio::test]
    async fn rules_keep_id_order_and_filter_inactive() {
        let store = InMemoryStore::new();
        let a = store
            .create_rule(NewRule::new(vec!["hotline".into()], "A", "faq"))
            .await
            .unwrap();
        let mut inactive = NewRule::new(vec!["x".into()], "B", "faq");
        inactive.active = false;
        let b = store.create_rule(inactive).await.unwrap();
        assert!(b.id > a.id);

        let active = store.load_active_rules().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].answer, "A");
        assert_eq!(store.list_rules().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_and_delete_rule() {
        let store = InMemoryStore::new();
        let rule = store
            .create_rule(NewRule::new(vec!["a".into()], "A", ""))
            .await
            .unwrap();

        let updated = store
            .update_rule(rule.id, RuleUpdate::activate(false))
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.active);
        assert!(store.update_rule(999, RuleUpdate::activate(true)).await.unwrap().is_none());

        assert!(store.delete_rule(rule.id).await.unwrap());
        assert!(!store.delete_rule(rule.id).await.unwrap());
        assert!(store.get_rule(rule.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn turns_are_ordered_per_session() {
        let store = InMemoryStore::new();
        let s1 = store.create_session().await.unwrap();
        let s2 = store.create_session().await.unwrap();

        store
            .append_turn(NewTurn::from_inbound(&s1.id, &InboundMessage::text("one")))
            .await
            .unwrap();
        store
            .append_turn(NewTurn::from_inbound(&s2.id, &InboundMessage::text("other")))
            .await
            .unwrap();
        store
            .append_turn(NewTurn::from_reply(&s1.id, &ReplyPayload::text("two")))
            .await
            .unwrap();

        let turns = store.load_turns(&s1.id).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "one");
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].kind, TurnKind::Text);
    }

    #[tokio::test]
    async fn ensure_session_is_idempotent() {
        let store = InMemoryStore::new();
        let id = SessionId::from("fixed");
        let first = store.ensure_session(&id).await.unwrap();
        let second = store.ensure_session(&id).await.unwrap();
        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn append_to_unknown_session_fails() {
        let store = InMemoryStore::new();
        let result = store
            .append_turn(NewTurn::from_inbound(&SessionId::from("nope"), &InboundMessage::text("x")))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn feedback_and_correction_are_recorded_on_the_turn() {
        let store = InMemoryStore::new();
        let session = store.create_session().await.unwrap();
        let reply = store
            .append_turn(NewTurn::from_reply(&session.id, &ReplyPayload::text("先协商")))
            .await
            .unwrap();
        assert!(reply.feedback_score.is_none());

        let rated = store
            .set_feedback(reply.id, FeedbackScore::Down)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rated.feedback_score, Some(FeedbackScore::Down));

        let corrected = store
            .set_correction(reply.id, "应先申请劳动仲裁")
            .await
            .unwrap()
            .unwrap();
        assert!(corrected.is_corrected());
        assert_eq!(corrected.feedback_score, Some(FeedbackScore::Down));

        let turns = store.load_turns(&session.id).await.unwrap();
        assert_eq!(turns[0].correction.as_deref(), Some("应先申请劳动仲裁"));
        assert!(store.set_feedback(999, FeedbackScore::Up).await.unwrap().is_none());
        assert!(store.get_turn(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn offline_store_rejects_calls() {
        let store = InMemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.load_active_rules().await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_offline(false);
        assert!(store.load_active_rules().await.is_ok());
    }
}
