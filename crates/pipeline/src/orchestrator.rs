//! Per-message routing: rule check, retrieval, branch, post-process.
//!
//! # Flow
//!
//! ```text
//! inbound ──▶ rule check ──hit──▶ canned answer
//!               │ miss
//!               ▼
//!           retrieval (failure ⇒ empty context)
//!               │
//!      ┌────────┼──────────────┐
//!      ▼        ▼              ▼
//!   vision   simple     advocate ║ skeptic
//!      │        │              ╚═══╤═══╝
//!      │        │              synthesis
//!      └────────┴──────┬───────────┘
//!                 post-process ──▶ reply
//! ```
//!
//! External failures never escape: retrieval degrades to no context, a
//! failed debate call contributes nothing, and any other failed generation
//! turns into the configured busy message.

use crate::agent_unit::{AgentInferenceUnit, AgentReply, AgentRole};
use crate::classifier::ComplexityClassifier;
use crate::history;
use crate::postprocess::PostProcessor;
use crate::retriever::{self, KnowledgeRetriever};
use chrono::Utc;
use parley_config::PipelineConfig;
use parley_core::conversation::{ConversationTurn, InboundKind, InboundMessage, ReplyPayload, SessionId};
use parley_core::event::{DomainEvent, EventBus};
use parley_core::knowledge::Passage;
use parley_core::outcome::CallOutcome;
use parley_rules::RuleMatcher;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which tier produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "route", content = "rule_id")]
pub enum Route {
    Rule(i64),
    Simple,
    Debate,
    Vision,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Rule(_) => "rule",
            Route::Simple => "simple",
            Route::Debate => "debate",
            Route::Vision => "vision",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutedReply {
    pub payload: ReplyPayload,
    pub route: Route,
}

/// Tunables taken from `[pipeline]`.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub history_window: usize,
    pub drop_duplicate_trailing_turn: bool,
    pub busy_message: String,
}

impl From<&PipelineConfig> for OrchestratorSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            history_window: config.history_window,
            drop_duplicate_trailing_turn: config.drop_duplicate_trailing_turn,
            busy_message: config.busy_message.clone(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

pub struct ResponseOrchestrator {
    matcher: RuleMatcher,
    retriever: KnowledgeRetriever,
    classifier: ComplexityClassifier,
    agents: Arc<AgentInferenceUnit>,
    post: PostProcessor,
    settings: OrchestratorSettings,
    events: Option<Arc<EventBus>>,
}

impl ResponseOrchestrator {
    pub fn new(
        matcher: RuleMatcher,
        retriever: KnowledgeRetriever,
        classifier: ComplexityClassifier,
        agents: AgentInferenceUnit,
        post: PostProcessor,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            matcher,
            retriever,
            classifier,
            agents: Arc::new(agents),
            post,
            settings,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn matcher(&self) -> &RuleMatcher {
        &self.matcher
    }

    pub fn retriever(&self) -> &KnowledgeRetriever {
        &self.retriever
    }

    /// Produce the reply for one validated inbound message.
    ///
    /// `turns` is the session history in creation order, normally already
    /// including the user turn for `inbound`.
    pub async fn respond(
        &self,
        session: &SessionId,
        inbound: &InboundMessage,
        turns: &[ConversationTurn],
    ) -> RoutedReply {
        let query = inbound.content.as_str();

        if inbound.kind == InboundKind::Image {
            let image_ref = inbound.media_ref.as_deref().unwrap_or_default();
            return self.vision(session, query, image_ref).await;
        }

        let passages = if inbound.kind == InboundKind::Text {
            if let Some(hit) = self.matcher.check(query) {
                info!(session = %session, rule_id = hit.rule_id, "Answered by rule");
                self.emit(DomainEvent::RuleMatched {
                    session_id: session.to_string(),
                    rule_id: hit.rule_id,
                    timestamp: Utc::now(),
                });
                return self.routed(
                    session,
                    ReplyPayload::text(hit.answer).with_citations(Some(hit.source)),
                    Route::Rule(hit.rule_id),
                );
            }
            self.retrieve(session, query).await
        } else {
            Vec::new()
        };

        let context = retriever::format_context(&passages);
        let citations = retriever::citations(&passages);
        let history = history::window(
            turns,
            query,
            self.settings.history_window,
            self.settings.drop_duplicate_trailing_turn,
        );

        let (route, synthesis) = if self.classifier.is_complex(query) {
            let (advocate, skeptic) = self.debate(session, &context, query).await;
            let input = synthesis_input(query, &advocate, &skeptic);
            let reply = self
                .agents
                .infer_with_history(AgentRole::Synthesizer, &context, &input, &history)
                .await;
            (Route::Debate, reply)
        } else {
            let reply = self
                .agents
                .infer_with_history(AgentRole::Synthesizer, &context, query, &history)
                .await;
            (Route::Simple, reply)
        };

        match self.generated(session, synthesis) {
            Some(text) => {
                let payload = self.post.finish(text, query, citations).await;
                self.routed(session, payload, route)
            }
            None => self.routed(session, self.busy(), route),
        }
    }

    async fn retrieve(&self, session: &SessionId, query: &str) -> Vec<Passage> {
        let outcome = self.retriever.search(query, None).await;
        if !outcome.is_completed() {
            self.emit(DomainEvent::ExternalCallDegraded {
                session_id: session.to_string(),
                call: "retrieval".into(),
                outcome: outcome.label().into(),
                timestamp: Utc::now(),
            });
        }
        outcome.unwrap_or_empty()
    }

    async fn vision(&self, session: &SessionId, caption: &str, image_ref: &str) -> RoutedReply {
        let reply = self.agents.infer_vision("", caption, image_ref).await;
        match self.generated(session, reply) {
            Some(text) => {
                let payload = self.post.finish(text, caption, None).await;
                self.routed(session, payload, Route::Vision)
            }
            None => self.routed(session, self.busy(), Route::Vision),
        }
    }

    /// Run advocate and skeptic as separate tasks and wait for both.
    async fn debate(&self, session: &SessionId, context: &str, query: &str) -> (AgentReply, AgentReply) {
        let spawn_role = |role: AgentRole| {
            let agents = self.agents.clone();
            let context = context.to_string();
            let query = query.to_string();
            tokio::spawn(async move { agents.infer(role, &context, &query).await })
        };

        let (advocate, skeptic) = tokio::join!(
            spawn_role(AgentRole::Advocate),
            spawn_role(AgentRole::Skeptic)
        );

        let advocate = advocate.unwrap_or_else(|e| {
            warn!(error = %e, "Advocate task aborted");
            AgentReply::failed(AgentRole::Advocate, e.to_string())
        });
        let skeptic = skeptic.unwrap_or_else(|e| {
            warn!(error = %e, "Skeptic task aborted");
            AgentReply::failed(AgentRole::Skeptic, e.to_string())
        });

        for reply in [&advocate, &skeptic] {
            self.note_degraded(session, reply);
        }
        debug!(
            advocate = advocate.outcome.label(),
            skeptic = skeptic.outcome.label(),
            "Debate finished"
        );
        (advocate, skeptic)
    }

    /// The generated text, or `None` when the call did not complete.
    fn generated(&self, session: &SessionId, reply: AgentReply) -> Option<String> {
        self.note_degraded(session, &reply);
        reply.outcome.completed()
    }

    fn note_degraded(&self, session: &SessionId, reply: &AgentReply) {
        if let CallOutcome::Completed(_) = reply.outcome {
            return;
        }
        self.emit(DomainEvent::ExternalCallDegraded {
            session_id: session.to_string(),
            call: reply.role.as_str().into(),
            outcome: reply.outcome.label().into(),
            timestamp: Utc::now(),
        });
    }

    fn busy(&self) -> ReplyPayload {
        ReplyPayload::text(self.settings.busy_message.clone())
    }

    fn routed(&self, session: &SessionId, payload: ReplyPayload, route: Route) -> RoutedReply {
        self.emit(DomainEvent::RouteSelected {
            session_id: session.to_string(),
            route: route.as_str().into(),
            timestamp: Utc::now(),
        });
        RoutedReply { payload, route }
    }

    fn emit(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

/// The synthesizer's user message: the question and both debate positions.
pub fn synthesis_input(query: &str, advocate: &AgentReply, skeptic: &AgentReply) -> String {
    format!(
        "Question:\n{query}\n\n\
         Advocate's analysis:\n{}\n\n\
         Skeptic's analysis:\n{}\n\n\
         Weigh both analyses and give the user one balanced answer.",
        advocate.text(),
        skeptic.text()
    )
}
