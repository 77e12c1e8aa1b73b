//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST   /v1/sessions`               : Open a session
//! - `GET    /v1/sessions/{id}`          : Session with its ordered turns
//! - `POST   /v1/sessions/{id}/messages` : Send one message, get the reply payload
//! - `GET    /v1/ws/{id}`                : WebSocket: message frames in, payload frames out
//! - `GET    /v1/events`                 : SSE stream of domain events
//! - `POST   /v1/turns/{id}/feedback`    : Rate an assistant reply (1 or -1)
//! - `GET    /v1/admin/rules`            : List rules
//! - `POST   /v1/admin/rules`            : Create a rule
//! - `GET    /v1/admin/rules/{id}`       : Get a rule
//! - `PUT    /v1/admin/rules/{id}`       : Partially update a rule
//! - `DELETE /v1/admin/rules/{id}`       : Delete a rule
//! - `POST   /v1/admin/rules/reload`     : Rebuild the rule cache
//! - `POST   /v1/admin/rules/test`       : Match text against the live rule cache
//! - `POST   /v1/admin/turns/{id}/correction` : Record a corrected answer
//! - `GET    /v1/admin/cache`            : Inspect the live rule snapshot
//!
//! Admin routes require `Authorization: Bearer <token>` when a token is configured.

use axum::{
    Router,
    extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::runtime::Runtime;
use parley_core::conversation::{
    ConversationTurn, FeedbackError, FeedbackScore, InboundMessage, ReplyPayload, Session, SessionId,
};
use parley_core::error::StoreError;
use parley_core::event::{DomainEvent, EventBus};
use parley_core::rule::{NewRule, Rule, RuleUpdate};
use parley_pipeline::{ChatReply, ChatService, Transcript};
use parley_rules::{AdminError, ReloadReport, RuleAdmin, RuleHit, RuleMatcher, RuleMutation};

// ── State ─────────────────────────────────────────────────────────────────

pub struct ApiState {
    pub chat: Arc<ChatService>,
    pub admin: Arc<RuleAdmin>,
    pub events: Arc<EventBus>,
    pub admin_token: Option<String>,
}

impl From<&Runtime> for ApiState {
    fn from(runtime: &Runtime) -> Self {
        Self {
            chat: runtime.chat.clone(),
            admin: runtime.admin.clone(),
            events: runtime.events.clone(),
            admin_token: runtime.config.gateway.admin_token.clone(),
        }
    }
}

pub type SharedApiState = Arc<ApiState>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    let admin = Router::new()
        .route("/rules", get(list_rules_handler).post(create_rule_handler))
        .route("/rules/reload", post(reload_rules_handler))
        .route("/rules/test", post(test_rules_handler))
        .route(
            "/rules/{id}",
            get(get_rule_handler)
                .put(update_rule_handler)
                .delete(delete_rule_handler),
        )
        .route("/cache", get(cache_handler))
        .route("/turns/{id}/correction", post(correct_turn_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .route("/sessions", post(create_session_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/sessions/{id}/messages", post(send_message_handler))
        .route("/turns/{id}/feedback", post(feedback_handler))
        .route("/ws/{id}", get(ws_handler))
        .route("/events", get(event_stream_handler))
        .nest("/admin", admin)
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

fn store_error(e: StoreError) -> ApiError {
    warn!(error = %e, "Store request failed");
    api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
}

fn admin_error(e: AdminError) -> ApiError {
    match e {
        AdminError::Invalid(_) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        AdminError::NotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        AdminError::Store(inner) => store_error(inner),
    }
}

fn feedback_error(e: FeedbackError) -> ApiError {
    match e {
        FeedbackError::TurnNotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        FeedbackError::Store(inner) => store_error(inner),
        FeedbackError::InvalidScore(_)
        | FeedbackError::EmptyCorrection
        | FeedbackError::NotAssistantTurn(_) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// Admin routes require the configured bearer token; with no token they are open.
async fn admin_auth_middleware(
    State(state): State<SharedApiState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if provided == Some(expected) {
        Ok(next.run(req).await)
    } else {
        warn!("Unauthorized request to admin API");
        Err(StatusCode::UNAUTHORIZED)
    }
}

// ── Sessions & messages ───────────────────────────────────────────────────

async fn create_session_handler(
    State(state): State<SharedApiState>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let session = state.chat.open_session().await.map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn get_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<Transcript>, ApiError> {
    state
        .chat
        .transcript(&SessionId::from(id.as_str()))
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Session not found: {id}")))
}

/// The body is parsed by hand so malformed frames get the same 400 shape.
async fn send_message_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<ChatReply>, ApiError> {
    let inbound = InboundMessage::parse(&body)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid message: {e}")))?;
    let reply = state
        .chat
        .send(&SessionId::from(id.as_str()), &inbound)
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid message: {e}")))?;
    Ok(Json(reply))
}

// ── Feedback & corrections ────────────────────────────────────────────────

#[derive(Deserialize)]
struct FeedbackRequest {
    score: i32,
}

async fn feedback_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<i64>,
    Json(body): Json<FeedbackRequest>,
) -> Result<Json<ConversationTurn>, ApiError> {
    let score = FeedbackScore::try_from(body.score).map_err(feedback_error)?;
    state.chat.feedback(id, score).await.map(Json).map_err(feedback_error)
}

#[derive(Deserialize)]
struct CorrectionRequest {
    #[serde(alias = "correction_content")]
    correction: String,
}

async fn correct_turn_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<i64>,
    Json(body): Json<CorrectionRequest>,
) -> Result<Json<ConversationTurn>, ApiError> {
    state
        .chat
        .correct(id, &body.correction)
        .await
        .map(Json)
        .map_err(feedback_error)
}

// ── WebSocket ─────────────────────────────────────────────────────────────

/// `GET /v1/ws/{id}`: each text frame is one inbound message for session `id`.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, SessionId::from(id.as_str())))
}

async fn handle_ws_connection(mut socket: WebSocket, state: SharedApiState, session: SessionId) {
    info!(session = %session, "WebSocket connection established");

    while let Some(msg) = socket.recv().await {
        let text = match msg {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(_) => break,
        };

        let payload = match InboundMessage::parse(text.as_str()) {
            Ok(inbound) => match state.chat.send(&session, &inbound).await {
                Ok(reply) => reply.payload,
                Err(e) => ReplyPayload::rejection(&e),
            },
            Err(e) => ReplyPayload::rejection(&e),
        };

        let json = serde_json::to_string(&payload).unwrap_or_default();
        if socket.send(WsMessage::Text(json.into())).await.is_err() {
            break;
        }
    }

    info!(session = %session, "WebSocket connection closed");
}

// ── SSE event stream ──────────────────────────────────────────────────────

fn event_name(event: &DomainEvent) -> &'static str {
    match event {
        DomainEvent::MessageReceived { .. } => "message_received",
        DomainEvent::RuleMatched { .. } => "rule_matched",
        DomainEvent::RouteSelected { .. } => "route_selected",
        DomainEvent::RulesReloaded { .. } => "rules_reloaded",
        DomainEvent::ExternalCallDegraded { .. } => "external_call_degraded",
        DomainEvent::ReplyGenerated { .. } => "reply_generated",
        DomainEvent::FeedbackRecorded { .. } => "feedback_recorded",
        DomainEvent::TurnCorrected { .. } => "turn_corrected",
        DomainEvent::ErrorOccurred { .. } => "error_occurred",
    }
}

/// `GET /v1/events`: SSE stream of domain events.
async fn event_stream_handler(
    State(state): State<SharedApiState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .map(|event| {
            let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
            Ok(SseEvent::default().event(event_name(&event)).data(data))
        });

    Sse::new(stream)
}

// ── Rule administration ───────────────────────────────────────────────────

async fn list_rules_handler(State(state): State<SharedApiState>) -> Result<Json<Vec<Rule>>, ApiError> {
    state.admin.list().await.map(Json).map_err(admin_error)
}

async fn get_rule_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Rule>, ApiError> {
    state.admin.get(id).await.map(Json).map_err(admin_error)
}

async fn create_rule_handler(
    State(state): State<SharedApiState>,
    Json(rule): Json<NewRule>,
) -> Result<(StatusCode, Json<RuleMutation<Rule>>), ApiError> {
    let mutation = state.admin.create(rule).await.map_err(admin_error)?;
    Ok((StatusCode::CREATED, Json(mutation)))
}

async fn update_rule_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<i64>,
    Json(update): Json<RuleUpdate>,
) -> Result<Json<RuleMutation<Rule>>, ApiError> {
    state.admin.update(id, update).await.map(Json).map_err(admin_error)
}

async fn delete_rule_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<i64>,
) -> Result<Json<RuleMutation<i64>>, ApiError> {
    state.admin.delete(id).await.map(Json).map_err(admin_error)
}

async fn reload_rules_handler(
    State(state): State<SharedApiState>,
) -> Result<Json<ReloadReport>, ApiError> {
    state.admin.reload().await.map(Json).map_err(admin_error)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTestRequest {
    pub text: String,
}

async fn test_rules_handler(
    State(state): State<SharedApiState>,
    Json(request): Json<RuleTestRequest>,
) -> Json<Option<RuleHit>> {
    Json(RuleMatcher::new(state.admin.cache().clone()).check(&request.text))
}

#[derive(Serialize, Deserialize)]
struct CacheView {
    generation: u64,
    loaded_at: Option<DateTime<Utc>>,
    rules: Vec<CachedRuleDto>,
}

#[derive(Serialize, Deserialize)]
struct CachedRuleDto {
    rule_id: i64,
    patterns: Vec<String>,
    source: String,
}

async fn cache_handler(State(state): State<SharedApiState>) -> Json<CacheView> {
    let snapshot = state.admin.cache().snapshot();
    Json(CacheView {
        generation: snapshot.generation,
        loaded_at: snapshot.loaded_at,
        rules: snapshot
            .rules
            .iter()
            .map(|r| CachedRuleDto {
                rule_id: r.rule_id,
                patterns: r.matchers.iter().map(|m| m.as_str().to_string()).collect(),
                source: r.source.clone(),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Backends;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use parley_config::AppConfig;
    use parley_core::error::ProviderError;
    use parley_core::message::Message;
    use parley_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
    use parley_store::{InMemoryStore, KeywordKnowledgeIndex};
    use tower::ServiceExt;

    /// Lightweight mock provider for gateway tests.
    struct MockProvider {
        response_text: String,
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant(&self.response_text),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: "mock-model".into(),
            })
        }
    }

    async fn test_api_state_with(admin_token: Option<&str>) -> SharedApiState {
        let mut config = AppConfig::default();
        config.gateway.admin_token = admin_token.map(String::from);
        let store = Arc::new(InMemoryStore::new());
        let backends = Backends {
            provider: Arc::new(MockProvider {
                response_text: "Mock legal answer".into(),
            }),
            image_provider: None,
            rules: store.clone(),
            conversations: store,
            knowledge: Arc::new(KeywordKnowledgeIndex::new()),
        };
        let runtime = Runtime::assemble(config, backends).await.unwrap();
        Arc::new(ApiState::from(&runtime))
    }

    async fn test_api_state() -> SharedApiState {
        test_api_state_with(None).await
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn create_and_get_session() {
        let state = test_api_state().await;
        let app = v1_router(state.clone());

        let req = Request::builder()
            .method("POST")
            .uri("/sessions")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let id = created["id"].as_str().unwrap().to_string();

        let app = v1_router(state);
        let req = Request::builder()
            .uri(format!("/sessions/{id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let transcript = body_json(response).await;
        assert_eq!(transcript["id"], id.as_str());
        assert!(transcript["turns"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let app = v1_router(test_api_state().await);
        let req = Request::builder()
            .uri("/sessions/nonexistent")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn message_answered_by_seeded_rule() {
        let state = test_api_state().await;
        let app = v1_router(state.clone());

        let req = json_request(
            "POST",
            "/sessions/s1/messages",
            serde_json::json!({"type": "text", "content": "请问客服电话是多少"}),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let reply = body_json(response).await;
        assert!(reply["content"].as_str().unwrap().contains("400-888-8888"));
        assert_eq!(reply["type"], "text");
        assert_eq!(reply["citations"], "平台服务指南");

        // Session was created on first message and both turns persisted
        let app = v1_router(state);
        let req = Request::builder()
            .uri("/sessions/s1")
            .body(Body::empty())
            .unwrap();
        let transcript = body_json(app.oneshot(req).await.unwrap()).await;
        assert_eq!(transcript["turns"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn message_falls_through_to_model() {
        let app = v1_router(test_api_state().await);
        let req = json_request("POST", "/sessions/s2/messages", serde_json::json!({"content": "你好"}));
        let reply = body_json(app.oneshot(req).await.unwrap()).await;
        assert_eq!(reply["content"], "Mock legal answer");
    }

    #[tokio::test]
    async fn malformed_message_is_400() {
        let state = test_api_state().await;

        for body in [
            "not json".to_string(),
            serde_json::json!({"type": "video", "content": "x"}).to_string(),
            serde_json::json!({"type": "text", "content": "  "}).to_string(),
            serde_json::json!({"type": "image", "content": "look"}).to_string(),
        ] {
            let app = v1_router(state.clone());
            let req = Request::builder()
                .method("POST")
                .uri("/sessions/bad/messages")
                .body(Body::from(body))
                .unwrap();
            let response = app.oneshot(req).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let json = body_json(response).await;
            assert!(json["error"].as_str().unwrap().starts_with("Invalid message"));
        }

        // Nothing was written for the rejected session
        let app = v1_router(state);
        let req = Request::builder()
            .uri("/sessions/bad")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rule_round_trip_through_admin_api() {
        let state = test_api_state().await;

        let app = v1_router(state.clone());
        let req = json_request(
            "POST",
            "/admin/rules",
            serde_json::json!({"patterns": ["营业时间"], "answer": "周一至周五", "source": "指南"}),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let id = created["item"]["id"].as_i64().unwrap();
        assert_eq!(created["reload"]["status"], "reloaded");

        let app = v1_router(state.clone());
        let req = json_request("POST", "/sessions/r/messages", serde_json::json!({"content": "营业时间是？"}));
        let reply = body_json(app.oneshot(req).await.unwrap()).await;
        assert_eq!(reply["content"], "周一至周五");

        let app = v1_router(state.clone());
        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/admin/rules/{id}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::OK);

        let app = v1_router(state);
        let req = json_request("POST", "/sessions/r/messages", serde_json::json!({"content": "营业时间是？"}));
        let reply = body_json(app.oneshot(req).await.unwrap()).await;
        assert_eq!(reply["content"], "Mock legal answer");
    }

    #[tokio::test]
    async fn invalid_pattern_is_rejected() {
        let app = v1_router(test_api_state().await);
        let req = json_request(
            "POST",
            "/admin/rules",
            serde_json::json!({"patterns": ["(unclosed"], "answer": "x"}),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deactivate_via_put() {
        let state = test_api_state().await;
        let app = v1_router(state.clone());
        let req = json_request("PUT", "/admin/rules/3", serde_json::json!({"active": false}));
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["item"]["active"], false);

        let app = v1_router(state);
        let req = Request::builder().uri("/admin/cache").body(Body::empty()).unwrap();
        let cache = body_json(app.oneshot(req).await.unwrap()).await;
        let ids: Vec<i64> = cache["rules"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["rule_id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn missing_rule_is_404() {
        let app = v1_router(test_api_state().await);
        let req = Request::builder()
            .uri("/admin/rules/999")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_requires_token_when_configured() {
        let state = test_api_state_with(Some("s3cret")).await;

        let app = v1_router(state.clone());
        let req = Request::builder().uri("/admin/rules").body(Body::empty()).unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::UNAUTHORIZED);

        let app = v1_router(state.clone());
        let req = Request::builder()
            .uri("/admin/rules")
            .header("Authorization", "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::OK);

        // Chat routes stay open
        let app = v1_router(state);
        let req = json_request("POST", "/sessions/t/messages", serde_json::json!({"content": "hi"}));
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn reload_reports_generation() {
        let state = test_api_state().await;
        let before = state.admin.cache().generation();
        let app = v1_router(state);
        let req = Request::builder()
            .method("POST")
            .uri("/admin/rules/reload")
            .body(Body::empty())
            .unwrap();
        let report = body_json(app.oneshot(req).await.unwrap()).await;
        assert_eq!(report["generation"].as_u64().unwrap(), before + 1);
        assert_eq!(report["active"], 4);
    }

    #[tokio::test]
    async fn rule_test_uses_live_cache() {
        let state = test_api_state().await;

        let app = v1_router(state.clone());
        let req = json_request("POST", "/admin/rules/test", serde_json::json!({"text": "客服电话是多少"}));
        let hit = body_json(app.oneshot(req).await.unwrap()).await;
        assert_eq!(hit["rule_id"], 3);

        state.admin.delete(3).await.unwrap();
        let app = v1_router(state);
        let req = json_request("POST", "/admin/rules/test", serde_json::json!({"text": "客服电话是多少"}));
        assert!(body_json(app.oneshot(req).await.unwrap()).await.is_null());
    }

    async fn first_reply(state: &SharedApiState, session: &str) -> i64 {
        let app = v1_router(state.clone());
        let req = json_request(
            "POST",
            &format!("/sessions/{session}/messages"),
            serde_json::json!({"content": "你好"}),
        );
        let reply = body_json(app.oneshot(req).await.unwrap()).await;
        reply["messageId"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn feedback_on_reply_is_stored() {
        let state = test_api_state().await;
        let turn_id = first_reply(&state, "fb").await;

        let app = v1_router(state.clone());
        let req = json_request("POST", &format!("/turns/{turn_id}/feedback"), serde_json::json!({"score": -1}));
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["feedbackScore"], -1);

        let app = v1_router(state);
        let req = Request::builder().uri("/sessions/fb").body(Body::empty()).unwrap();
        let transcript = body_json(app.oneshot(req).await.unwrap()).await;
        assert_eq!(transcript["turns"][1]["feedbackScore"], -1);
        assert!(transcript["turns"][0]["feedbackScore"].is_null());
    }

    #[tokio::test]
    async fn feedback_validation() {
        let state = test_api_state().await;
        let turn_id = first_reply(&state, "fb2").await;

        let cases = [
            (turn_id, 3, StatusCode::BAD_REQUEST),
            (turn_id - 1, 1, StatusCode::BAD_REQUEST),
            (999, 1, StatusCode::NOT_FOUND),
        ];
        for (id, score, status) in cases {
            let app = v1_router(state.clone());
            let req = json_request("POST", &format!("/turns/{id}/feedback"), serde_json::json!({"score": score}));
            assert_eq!(app.oneshot(req).await.unwrap().status(), status);
        }
    }

    #[tokio::test]
    async fn correction_is_admin_only() {
        let state = test_api_state_with(Some("s3cret")).await;
        let turn_id = first_reply(&state, "fix").await;
        let uri = format!("/admin/turns/{turn_id}/correction");

        let app = v1_router(state.clone());
        let req = json_request("POST", &uri, serde_json::json!({"correction": "先协商再仲裁"}));
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::UNAUTHORIZED);

        let app = v1_router(state.clone());
        let mut req = json_request("POST", &uri, serde_json::json!({"correction_content": "先协商再仲裁"}));
        req.headers_mut()
            .insert("Authorization", "Bearer s3cret".parse().unwrap());
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["correction"], "先协商再仲裁");

        let app = v1_router(state);
        let mut req = json_request("POST", &uri, serde_json::json!({"correction": " "}));
        req.headers_mut()
            .insert("Authorization", "Bearer s3cret".parse().unwrap());
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ws_route_exists() {
        let app = v1_router(test_api_state().await);
        let req = Request::builder().uri("/ws/abc").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_ne!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn event_stream_returns_sse() {
        let app = v1_router(test_api_state().await);
        let req = Request::builder().uri("/events").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        assert!(
            content_type.contains("text/event-stream"),
            "Expected text/event-stream, got '{content_type}'"
        );
    }
}
