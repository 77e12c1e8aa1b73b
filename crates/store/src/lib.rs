//! Storage backends for Parley.
//!
//! - [`InMemoryStore`] and [`SqliteStore`] implement both
//!   [`RuleStore`](parley_core::RuleStore) and
//!   [`ConversationStore`](parley_core::ConversationStore).
//! - [`KeywordKnowledgeIndex`] and [`EmbeddingKnowledgeIndex`] implement
//!   [`KnowledgeIndex`](parley_core::KnowledgeIndex).

pub mod in_memory;
pub mod knowledge;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod vector;

pub use in_memory::InMemoryStore;
pub use knowledge::{EmbeddingKnowledgeIndex, KeywordKnowledgeIndex, seed_passages};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
