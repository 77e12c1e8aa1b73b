//! Conversation domain: sessions, persisted turns, and the inbound/outbound
//! message shapes exchanged with chat clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::StoreError;
use crate::message::{Message, Role};

/// Opaque session token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh random token.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A chat session. Never mutated except by appending turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
}

/// Content type tag carried by a persisted turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Text,
    Image,
    Audio,
    #[serde(rename = "mindmap", alias = "structured-diagram")]
    Diagram,
}

impl TurnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnKind::Text => "text",
            TurnKind::Image => "image",
            TurnKind::Audio => "audio",
            TurnKind::Diagram => "mindmap",
        }
    }

    /// Parse a stored tag. Unknown tags fall back to `Text`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "image" => TurnKind::Image,
            "audio" => TurnKind::Audio,
            "mindmap" | "structured-diagram" => TurnKind::Diagram,
            _ => TurnKind::Text,
        }
    }
}

/// A user's rating of an assistant turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum FeedbackScore {
    Up,
    Down,
}

impl TryFrom<i32> for FeedbackScore {
    type Error = FeedbackError;

    fn try_from(score: i32) -> Result<Self, Self::Error> {
        match score {
            1 => Ok(FeedbackScore::Up),
            -1 => Ok(FeedbackScore::Down),
            other => Err(FeedbackError::InvalidScore(other)),
        }
    }
}

impl From<FeedbackScore> for i32 {
    fn from(score: FeedbackScore) -> Self {
        match score {
            FeedbackScore::Up => 1,
            FeedbackScore::Down => -1,
        }
    }
}

/// Why feedback or a correction could not be recorded.
#[derive(Debug, Clone, Error)]
pub enum FeedbackError {
    #[error("score must be 1 or -1, got {0}")]
    InvalidScore(i32),

    #[error("correction must not be empty")]
    EmptyCorrection,

    #[error("turn not found: {0}")]
    TurnNotFound(i64),

    #[error("turn {0} is not an assistant reply")]
    NotAssistantTurn(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One persisted message in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: i64,
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: TurnKind,
    #[serde(rename = "mediaRef")]
    pub media_ref: Option<String>,
    pub citations: Option<String>,
    /// User rating, assistant turns only.
    #[serde(rename = "feedbackScore", default)]
    pub feedback_score: Option<FeedbackScore>,
    /// Administrator's corrected answer, assistant turns only.
    #[serde(default)]
    pub correction: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn is_corrected(&self) -> bool {
        self.correction.is_some()
    }

    /// Convert to a provider message for the history window.
    pub fn to_message(&self) -> Message {
        match self.role {
            Role::Assistant => Message::assistant(&self.content),
            Role::System => Message::system(&self.content),
            Role::User => Message::user(&self.content),
        }
    }
}

/// A turn about to be appended. The store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,
    pub kind: TurnKind,
    pub media_ref: Option<String>,
    pub citations: Option<String>,
}

impl NewTurn {
    pub fn from_inbound(session_id: &SessionId, inbound: &InboundMessage) -> Self {
        Self {
            session_id: session_id.clone(),
            role: Role::User,
            content: inbound.content.clone(),
            kind: inbound.kind.into(),
            media_ref: inbound.media_ref.clone(),
            citations: None,
        }
    }

    pub fn from_reply(session_id: &SessionId, reply: &ReplyPayload) -> Self {
        Self {
            session_id: session_id.clone(),
            role: Role::Assistant,
            content: reply.content.clone(),
            kind: reply.kind.into(),
            media_ref: reply.media_ref.clone(),
            citations: reply.citations.clone(),
        }
    }
}

/// Modality of an inbound client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboundKind {
    Text,
    Image,
    Audio,
}

impl From<InboundKind> for TurnKind {
    fn from(kind: InboundKind) -> Self {
        match kind {
            InboundKind::Text => TurnKind::Text,
            InboundKind::Image => TurnKind::Image,
            InboundKind::Audio => TurnKind::Audio,
        }
    }
}

/// Rejection reasons for a malformed inbound message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InboundError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("message content must not be empty")]
    EmptyContent,

    #[error("image message requires a media reference")]
    MissingMediaRef,
}

/// A message received from a chat client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type", default = "default_inbound_kind")]
    pub kind: InboundKind,

    #[serde(default)]
    pub content: String,

    #[serde(rename = "mediaRef", alias = "url", default)]
    pub media_ref: Option<String>,
}

fn default_inbound_kind() -> InboundKind {
    InboundKind::Text
}

impl InboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: InboundKind::Text,
            content: content.into(),
            media_ref: None,
        }
    }

    pub fn image(caption: impl Into<String>, media_ref: impl Into<String>) -> Self {
        Self {
            kind: InboundKind::Image,
            content: caption.into(),
            media_ref: Some(media_ref.into()),
        }
    }

    /// Parse and validate a raw JSON frame.
    pub fn parse(raw: &str) -> Result<Self, InboundError> {
        let msg: Self =
            serde_json::from_str(raw).map_err(|e| InboundError::Malformed(e.to_string()))?;
        msg.validate()?;
        Ok(msg)
    }

    /// Boundary validation. Image captions may be empty; everything else needs text.
    pub fn validate(&self) -> Result<(), InboundError> {
        match self.kind {
            InboundKind::Image => {
                let has_ref = self
                    .media_ref
                    .as_deref()
                    .is_some_and(|r| !r.trim().is_empty());
                if !has_ref {
                    return Err(InboundError::MissingMediaRef);
                }
            }
            InboundKind::Text | InboundKind::Audio => {
                if self.content.trim().is_empty() {
                    return Err(InboundError::EmptyContent);
                }
            }
        }
        Ok(())
    }
}

/// Content type of an outbound reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyKind {
    Text,
    Image,
    #[serde(rename = "mindmap", alias = "structured-diagram")]
    Diagram,
}

impl From<ReplyKind> for TurnKind {
    fn from(kind: ReplyKind) -> Self {
        match kind {
            ReplyKind::Text => TurnKind::Text,
            ReplyKind::Image => TurnKind::Image,
            ReplyKind::Diagram => TurnKind::Diagram,
        }
    }
}

/// The structured reply sent back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyPayload {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: ReplyKind,
    #[serde(rename = "mediaRef")]
    pub media_ref: Option<String>,
    pub citations: Option<String>,
    /// Id of the persisted assistant turn, the handle for feedback.
    #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
}

impl ReplyPayload {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: ReplyKind::Text,
            media_ref: None,
            citations: None,
            message_id: None,
        }
    }

    pub fn with_citations(mut self, citations: Option<String>) -> Self {
        self.citations = citations.filter(|c| !c.is_empty());
        self
    }

    /// Payload-shaped rejection for a malformed inbound message.
    pub fn rejection(err: &InboundError) -> Self {
        Self::text(format!("Invalid message: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_text_message() {
        let msg = InboundMessage::parse(r#"{"type":"text","content":"hello"}"#).unwrap();
        assert_eq!(msg.kind, InboundKind::Text);
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn url_is_alias_for_media_ref() {
        let msg =
            InboundMessage::parse(r#"{"type":"image","content":"","url":"http://x/a.png"}"#)
                .unwrap();
        assert_eq!(msg.media_ref.as_deref(), Some("http://x/a.png"));
    }

    #[test]
    fn reject_unknown_type() {
        let err = InboundMessage::parse(r#"{"type":"video","content":"x"}"#).unwrap_err();
        assert!(matches!(err, InboundError::Malformed(_)));
    }

    #[test]
    fn reject_empty_text_and_bare_image() {
        assert_eq!(
            InboundMessage::parse(r#"{"type":"text","content":"   "}"#).unwrap_err(),
            InboundError::EmptyContent
        );
        assert_eq!(
            InboundMessage::parse(r#"{"type":"image","content":"look"}"#).unwrap_err(),
            InboundError::MissingMediaRef
        );
    }

    #[test]
    fn reject_invalid_json() {
        assert!(matches!(
            InboundMessage::parse("not json").unwrap_err(),
            InboundError::Malformed(_)
        ));
    }

    #[test]
    fn reply_serializes_camel_case_with_nulls() {
        let json = serde_json::to_value(ReplyPayload::text("hi")).unwrap();
        assert_eq!(json["type"], "text");
        assert!(json["mediaRef"].is_null());
        assert!(json["citations"].is_null());
    }

    #[test]
    fn diagram_kind_uses_mindmap_on_the_wire() {
        let mut reply = ReplyPayload::text("# Plan");
        reply.kind = ReplyKind::Diagram;
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "mindmap");

        let back: ReplyKind = serde_json::from_str("\"structured-diagram\"").unwrap();
        assert_eq!(back, ReplyKind::Diagram);
    }

    #[test]
    fn turn_kind_tags_round_trip() {
        for kind in [TurnKind::Text, TurnKind::Image, TurnKind::Audio, TurnKind::Diagram] {
            assert_eq!(TurnKind::from_tag(kind.as_str()), kind);
        }
        assert_eq!(TurnKind::from_tag("bogus"), TurnKind::Text);
    }

    #[test]
    fn feedback_score_accepts_only_up_or_down() {
        assert_eq!(FeedbackScore::try_from(1).unwrap(), FeedbackScore::Up);
        assert_eq!(FeedbackScore::try_from(-1).unwrap(), FeedbackScore::Down);
        assert!(matches!(
            FeedbackScore::try_from(0),
            Err(FeedbackError::InvalidScore(0))
        ));

        assert_eq!(serde_json::to_value(FeedbackScore::Down).unwrap(), -1);
        assert!(serde_json::from_str::<FeedbackScore>("5").is_err());
    }

    #[test]
    fn message_id_only_serialized_once_persisted() {
        let mut reply = ReplyPayload::text("hi");
        assert!(serde_json::to_value(&reply).unwrap().get("messageId").is_none());
        reply.message_id = Some(7);
        assert_eq!(serde_json::to_value(&reply).unwrap()["messageId"], 7);
    }

    #[test]
    fn empty_citations_become_none() {
        let reply = ReplyPayload::text("x").with_citations(Some(String::new()));
        assert!(reply.citations.is_none());
    }
}
