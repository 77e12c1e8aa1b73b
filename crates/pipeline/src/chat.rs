//! The persistence boundary around the orchestrator.

use crate::orchestrator::{ResponseOrchestrator, Route};
use chrono::Utc;
use parley_core::conversation::{
    ConversationTurn, FeedbackError, FeedbackScore, InboundError, InboundMessage, NewTurn,
    ReplyPayload, Session, SessionId, TurnKind,
};
use parley_core::message::Role;
use parley_core::error::StoreError;
use parley_core::event::{DomainEvent, EventBus};
use parley_core::store::ConversationStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// A reply plus the tier that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    #[serde(flatten)]
    pub payload: ReplyPayload,
    #[serde(skip)]
    pub route: Route,
}

/// A session with its turns in creation order.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    #[serde(flatten)]
    pub session: Session,
    pub turns: Vec<ConversationTurn>,
}

pub struct ChatService {
    store: Arc<dyn ConversationStore>,
    orchestrator: Arc<ResponseOrchestrator>,
    events: Option<Arc<EventBus>>,
}

impl ChatService {
    pub fn new(store: Arc<dyn ConversationStore>, orchestrator: Arc<ResponseOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn orchestrator(&self) -> &Arc<ResponseOrchestrator> {
        &self.orchestrator
    }

    pub async fn open_session(&self) -> Result<Session, StoreError> {
        let session = self.store.create_session().await?;
        info!(session = %session.id, "Session opened");
        Ok(session)
    }

    pub async fn transcript(&self, id: &SessionId) -> Result<Option<Transcript>, StoreError> {
        let Some(session) = self.store.get_session(id).await? else {
            return Ok(None);
        };
        let turns = self.store.load_turns(id).await?;
        Ok(Some(Transcript { session, turns }))
    }

    /// Handle one inbound message for `session`.
    ///
    /// Invalid messages are rejected before anything is written. Store
    /// failures are logged and the reply is still produced.
    pub async fn send(
        &self,
        session: &SessionId,
        inbound: &InboundMessage,
    ) -> Result<ChatReply, InboundError> {
        inbound.validate()?;
        let started = Instant::now();

        self.emit(DomainEvent::MessageReceived {
            session_id: session.to_string(),
            kind: TurnKind::from(inbound.kind).as_str().to_string(),
            content_preview: inbound.content.chars().take(80).collect(),
            timestamp: Utc::now(),
        });

        if let Err(e) = self.store.ensure_session(session).await {
            self.store_failed("ensure_session", &e);
        }
        if let Err(e) = self
            .store
            .append_turn(NewTurn::from_inbound(session, inbound))
            .await
        {
            self.store_failed("append_user_turn", &e);
        }

        let turns = match self.store.load_turns(session).await {
            Ok(turns) => turns,
            Err(e) => {
                self.store_failed("load_turns", &e);
                Vec::new()
            }
        };

        let mut routed = self.orchestrator.respond(session, inbound, &turns).await;

        match self
            .store
            .append_turn(NewTurn::from_reply(session, &routed.payload))
            .await
        {
            Ok(turn) => routed.payload.message_id = Some(turn.id),
            Err(e) => self.store_failed("append_assistant_turn", &e),
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            session = %session,
            route = routed.route.as_str(),
            kind = ?routed.payload.kind,
            duration_ms,
            "Reply generated"
        );
        self.emit(DomainEvent::ReplyGenerated {
            session_id: session.to_string(),
            kind: TurnKind::from(routed.payload.kind).as_str().to_string(),
            duration_ms,
            timestamp: Utc::now(),
        });

        Ok(ChatReply {
            payload: routed.payload,
            route: routed.route,
        })
    }

    /// Record a user's rating of an assistant reply.
    pub async fn feedback(
        &self,
        turn_id: i64,
        score: FeedbackScore,
    ) -> Result<ConversationTurn, FeedbackError> {
        self.assistant_turn(turn_id).await?;
        let turn = self
            .store
            .set_feedback(turn_id, score)
            .await?
            .ok_or(FeedbackError::TurnNotFound(turn_id))?;

        info!(turn_id, score = i32::from(score), "Feedback recorded");
        self.emit(DomainEvent::FeedbackRecorded {
            session_id: turn.session_id.to_string(),
            turn_id,
            score: score.into(),
            timestamp: Utc::now(),
        });
        Ok(turn)
    }

    /// Record an administrator's corrected answer for an assistant reply.
    pub async fn correct(
        &self,
        turn_id: i64,
        correction: &str,
    ) -> Result<ConversationTurn, FeedbackError> {
        let correction = correction.trim();
        if correction.is_empty() {
            return Err(FeedbackError::EmptyCorrection);
        }
        self.assistant_turn(turn_id).await?;
        let turn = self
            .store
            .set_correction(turn_id, correction)
            .await?
            .ok_or(FeedbackError::TurnNotFound(turn_id))?;

        info!(turn_id, "Turn corrected");
        self.emit(DomainEvent::TurnCorrected {
            session_id: turn.session_id.to_string(),
            turn_id,
            timestamp: Utc::now(),
        });
        Ok(turn)
    }

    async fn assistant_turn(&self, turn_id: i64) -> Result<ConversationTurn, FeedbackError> {
        let turn = self
            .store
            .get_turn(turn_id)
            .await?
            .ok_or(FeedbackError::TurnNotFound(turn_id))?;
        if turn.role != Role::Assistant {
            return Err(FeedbackError::NotAssistantTurn(turn_id));
        }
        Ok(turn)
    }

    fn store_failed(&self, step: &str, error: &StoreError) {
        warn!(step, error = %error, "Conversation store call failed; continuing");
        self.emit(DomainEvent::ErrorOccurred {
            context: step.to_string(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}
