//! End-to-end tests for the Parley pipeline.
//!
//! These exercise the full path from an inbound message through rule
//! matching, retrieval, debate and synthesis to persisted turns, using the
//! SQLite store and a scripted provider.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use parley_config::AppConfig;
use parley_core::conversation::{InboundMessage, ReplyKind, SessionId, TurnKind};
use parley_core::error::ProviderError;
use parley_core::message::{Message, Role};
use parley_core::provider::{ImageRequest, Provider, ProviderRequest, ProviderResponse, Usage};
use parley_core::rule::NewRule;
use parley_core::store::ConversationStore;
use parley_gateway::{Backends, Runtime};
use parley_pipeline::Route;
use parley_store::{KeywordKnowledgeIndex, SqliteStore};
use tower::ServiceExt;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Answers by role, recognised from the system prompt, and records every request.
struct RoleProvider {
    requests: Mutex<Vec<ProviderRequest>>,
    fail_advocate: bool,
}

impl RoleProvider {
    fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_advocate: false,
        }
    }

    fn failing_advocate() -> Self {
        Self {
            fail_advocate: true,
            ..Self::new()
        }
    }

    fn requests_for(&self, prefix: &str) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.system_prompt().is_some_and(|s| s.starts_with(prefix)))
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl Provider for RoleProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let system = request.system_prompt().unwrap_or_default().to_string();
        self.requests.lock().unwrap().push(request);

        let text = if system.starts_with("You are the advocate") {
            if self.fail_advocate {
                return Err(ProviderError::Network("connection reset".into()));
            }
            "ADVOCATE: 可以申请劳动仲裁"
        } else if system.starts_with("You are the skeptic") {
            "SKEPTIC: 需要保留工资条等证据"
        } else {
            "综合意见：先协商，再仲裁"
        };

        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }

    async fn generate_image(&self, _request: ImageRequest) -> Result<String, ProviderError> {
        Ok("https://images.test/generated.png".into())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

async fn runtime_at(path: &std::path::Path, provider: Arc<RoleProvider>) -> Runtime {
    let store = Arc::new(SqliteStore::open_file(path).await.unwrap());
    let backends = Backends {
        provider: provider.clone(),
        image_provider: Some(provider),
        rules: store.clone(),
        conversations: store,
        knowledge: Arc::new(KeywordKnowledgeIndex::new()),
    };
    Runtime::assemble(AppConfig::default(), backends).await.unwrap()
}

const COMPLEX: &str = "公司拖欠我三个月工资，我该怎么办？";

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn debate_round_trip_persists_turns() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(RoleProvider::new());
    let runtime = runtime_at(&dir.path().join("parley.db"), provider.clone()).await;
    let session = SessionId::from("e2e-debate");

    let reply = runtime
        .chat
        .send(&session, &InboundMessage::text(COMPLEX))
        .await
        .unwrap();

    assert_eq!(reply.route, Route::Debate);
    assert_eq!(reply.payload.content, "综合意见：先协商，再仲裁");

    let synth = provider.requests_for("You are the synthesizer");
    assert_eq!(synth.len(), 1);
    let input = &synth[0].messages.last().unwrap().content;
    assert!(input.contains("ADVOCATE"));
    assert!(input.contains("SKEPTIC"));

    let transcript = runtime.chat.transcript(&session).await.unwrap().unwrap();
    assert_eq!(transcript.turns.len(), 2);
    assert_eq!(transcript.turns[0].role, Role::User);
    assert_eq!(transcript.turns[1].role, Role::Assistant);
    assert_eq!(transcript.turns[1].citations, reply.payload.citations);
}

#[tokio::test]
async fn failed_advocate_still_synthesizes() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(RoleProvider::failing_advocate());
    let runtime = runtime_at(&dir.path().join("parley.db"), provider.clone()).await;

    let reply = runtime
        .chat
        .send(&SessionId::from("e2e-fail"), &InboundMessage::text(COMPLEX))
        .await
        .unwrap();

    assert!(!reply.payload.content.is_empty());
    let input = provider.requests_for("You are the synthesizer")[0]
        .messages
        .last()
        .unwrap()
        .content
        .clone();
    assert!(input.contains("SKEPTIC"));
    assert!(!input.contains("ADVOCATE"));
}

#[tokio::test]
async fn rules_survive_restart_and_answer_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("parley.db");

    let first = runtime_at(&db, Arc::new(RoleProvider::new())).await;
    let created = first
        .admin
        .create(NewRule::new(vec!["退货.*流程".into()], "七日内可无理由退货", "消费者权益保护法"))
        .await
        .unwrap();

    let reply = first
        .chat
        .send(&SessionId::from("r1"), &InboundMessage::text("退货的流程是什么"))
        .await
        .unwrap();
    assert_eq!(reply.route, Route::Rule(created.item.id));
    drop(first);

    // A fresh runtime over the same file loads the rule on startup and does not reseed
    let provider = Arc::new(RoleProvider::new());
    let second = runtime_at(&db, provider.clone()).await;
    assert_eq!(second.admin.list().await.unwrap().len(), 5);

    let reply = second
        .chat
        .send(&SessionId::from("r2"), &InboundMessage::text("退货的流程是什么"))
        .await
        .unwrap();
    assert_eq!(reply.payload.content, "七日内可无理由退货");
    assert_eq!(reply.payload.citations.as_deref(), Some("消费者权益保护法"));
    assert!(provider.requests_for("").is_empty());

    second.admin.delete(created.item.id).await.unwrap();
    let reply = second
        .chat
        .send(&SessionId::from("r2"), &InboundMessage::text("退货的流程是什么"))
        .await
        .unwrap();
    assert_ne!(reply.route, Route::Rule(created.item.id));
}

#[tokio::test]
async fn history_window_is_bounded_over_long_session() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(RoleProvider::new());
    let runtime = runtime_at(&dir.path().join("parley.db"), provider.clone()).await;
    let session = SessionId::from("long");

    for i in 0..7 {
        runtime
            .chat
            .send(&session, &InboundMessage::text(format!("问题{i}")))
            .await
            .unwrap();
    }

    let synth = provider.requests_for("You are the synthesizer");
    let last = synth.last().unwrap();
    // system + 10 history turns + current query
    assert_eq!(last.messages.len(), 12);
    let current = &last.messages.last().unwrap().content;
    assert_eq!(current, "问题6");
    assert_eq!(
        last.messages.iter().filter(|m| &m.content == current).count(),
        1
    );
}

#[tokio::test]
async fn drawing_request_returns_image_and_persists_media_ref() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = runtime_at(&dir.path().join("parley.db"), Arc::new(RoleProvider::new())).await;
    let session = SessionId::from("draw");

    let reply = runtime
        .chat
        .send(&session, &InboundMessage::text("画一张法院层级图"))
        .await
        .unwrap();
    assert_eq!(reply.payload.kind, ReplyKind::Image);
    assert_eq!(
        reply.payload.media_ref.as_deref(),
        Some("https://images.test/generated.png")
    );

    let store = SqliteStore::open_file(&dir.path().join("parley.db")).await.unwrap();
    let turns = store.load_turns(&session).await.unwrap();
    assert_eq!(turns[1].kind, TurnKind::Image);
    assert_eq!(turns[1].media_ref, reply.payload.media_ref);
}

#[tokio::test]
async fn concurrent_sessions_do_not_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = runtime_at(&dir.path().join("parley.db"), Arc::new(RoleProvider::new())).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let chat = runtime.chat.clone();
        handles.push(tokio::spawn(async move {
            let session = SessionId::from(format!("c{i}").as_str());
            for j in 0..3 {
                chat.send(&session, &InboundMessage::text(format!("s{i} m{j}")))
                    .await
                    .unwrap();
            }
            session
        }));
    }

    for handle in handles {
        let session = handle.await.unwrap();
        let turns = runtime.chat.transcript(&session).await.unwrap().unwrap().turns;
        assert_eq!(turns.len(), 6);
        let users: Vec<&str> = turns
            .iter()
            .filter(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .collect();
        let prefix = format!("{} m", session.as_str().replacen('c', "s", 1));
        assert_eq!(
            users,
            (0..3).map(|j| format!("{prefix}{j}")).collect::<Vec<_>>()
        );
    }
}

#[tokio::test]
async fn http_message_flow() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = runtime_at(&dir.path().join("parley.db"), Arc::new(RoleProvider::new())).await;
    let app = parley_gateway::build_router(&runtime);

    let req = Request::builder()
        .method("POST")
        .uri("/v1/sessions/http-1/messages")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({"type": "text", "content": "借款诉讼时效是多久"}).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let reply: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(reply["content"].as_str().unwrap().contains("三年"));
    assert_eq!(reply["citations"], "《民法典》第一百八十八条");
    assert_eq!(reply["type"], "text");
}
