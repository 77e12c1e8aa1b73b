//! Canned-answer rules: the first tier of the response pipeline.
//!
//! Rules live in a [`RuleStore`](parley_core::RuleStore). The [`RuleCache`]
//! holds a compiled, immutable snapshot of the active ones and swaps it
//! wholesale on every reload, so matching never touches the store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  mutate  ┌─────────────┐  reload  ┌─────────────┐
//! │  RuleAdmin   │────────▶│  RuleStore   │────────▶│  RuleCache   │
//! │ (HTTP / CLI) │         │ (durable)    │         │ Arc snapshot │
//! └─────────────┘          └─────────────┘          └──────┬──────┘
//!                                                          │ read
//!                                                   ┌──────┴──────┐
//!                                                   │ RuleMatcher  │
//!                                                   └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let cache = Arc::new(RuleCache::new());
//! cache.reload(store.as_ref()).await?;
//! let matcher = RuleMatcher::new(cache.clone());
//! if let Some(hit) = matcher.check("客服电话是多少") {
//!     println!("{} ({})", hit.answer, hit.source);
//! }
//! ```

mod admin;
mod cache;
mod matcher;
mod seed;

pub use admin::{AdminError, ReloadStatus, RuleAdmin, RuleMutation};
pub use cache::{CompiledRule, ReloadReport, RuleCache, RuleSnapshot, compile_pattern};
pub use matcher::{RuleHit, RuleMatcher};
pub use seed::{default_rules, seed_if_empty};
