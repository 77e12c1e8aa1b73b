//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley chat backend.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (generation service, backing store, semantic
//! index) is a trait here. Implementations live in their respective crates.
//! This enables:
//! - Swapping implementations via configuration
//! - Scripted mock implementations in tests
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod conversation;
pub mod rule;
pub mod knowledge;
pub mod store;
pub mod outcome;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use conversation::{
    ConversationTurn, FeedbackError, FeedbackScore, InboundError, InboundKind, InboundMessage, NewTurn,
    ReplyKind, ReplyPayload, Session, SessionId, TurnKind,
};
pub use rule::{NewRule, Rule, RuleUpdate};
pub use knowledge::{KnowledgeIndex, Passage};
pub use store::{ConversationStore, RuleStore};
pub use outcome::CallOutcome;
pub use event::{DomainEvent, EventBus};
