//! Tiered response routing for Parley.
//!
//! An inbound message is answered by the cheapest tier that can handle it:
//! a canned rule, a single synthesizer call, or an advocate/skeptic debate
//! followed by synthesis. Images go to a vision-capable model.
//!
//! [`ChatService`] is the entry point used by the gateway and the CLI; it
//! wraps [`ResponseOrchestrator`] with session persistence.

pub mod agent_unit;
pub mod chat;
pub mod classifier;
pub mod history;
pub mod orchestrator;
pub mod postprocess;
pub mod retriever;

#[cfg(test)]
mod test_helpers;

pub use agent_unit::{AgentInferenceUnit, AgentReply, AgentRole};
pub use chat::{ChatReply, ChatService, Transcript};
pub use classifier::ComplexityClassifier;
pub use orchestrator::{OrchestratorSettings, ResponseOrchestrator, Route, RoutedReply, synthesis_input};
pub use postprocess::PostProcessor;
pub use retriever::{KnowledgeRetriever, citations, format_context};
