//! Role-parameterised inference calls.
//!
//! Each call is stateless: a role-specific system instruction, the retrieved
//! context, and the query (the synthesizer also sees recent history). Every
//! call is bounded by the inference timeout and reduced to a [`CallOutcome`].

use parley_config::PromptConfig;
use parley_core::message::Message;
use parley_core::outcome::CallOutcome;
use parley_core::provider::{Provider, ProviderRequest};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Advocate,
    Skeptic,
    Synthesizer,
    Vision,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Advocate => "advocate",
            AgentRole::Skeptic => "skeptic",
            AgentRole::Synthesizer => "synthesizer",
            AgentRole::Vision => "vision",
        }
    }
}

/// One agent's contribution. Ephemeral; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub role: AgentRole,
    pub outcome: CallOutcome<String>,
}

impl AgentReply {
    pub fn failed(role: AgentRole, reason: impl Into<String>) -> Self {
        Self {
            role,
            outcome: CallOutcome::Failed(reason.into()),
        }
    }

    /// The generated text, or an empty contribution on failure or timeout.
    pub fn text(&self) -> &str {
        match &self.outcome {
            CallOutcome::Completed(text) => text,
            _ => "",
        }
    }
}

/// Issues role-specific completion calls against one provider.
pub struct AgentInferenceUnit {
    provider: Arc<dyn Provider>,
    model: String,
    vision_model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    prompts: PromptConfig,
}

impl AgentInferenceUnit {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, timeout: Duration) -> Self {
        let model = model.into();
        Self {
            provider,
            vision_model: model.clone(),
            model,
            temperature: 0.7,
            max_tokens: 2000,
            timeout,
            prompts: PromptConfig::default(),
        }
    }

    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptConfig) -> Self {
        self.prompts = prompts;
        self
    }

    fn system_prompt(&self, role: AgentRole, context: &str) -> String {
        let base = match role {
            AgentRole::Advocate => &self.prompts.advocate,
            AgentRole::Skeptic => &self.prompts.skeptic,
            AgentRole::Synthesizer => &self.prompts.synthesizer,
            AgentRole::Vision => &self.prompts.vision,
        };
        if context.trim().is_empty() {
            base.clone()
        } else {
            format!("{base}\n\nReference material:\n{context}")
        }
    }

    /// A single call for `role` with no history.
    pub async fn infer(&self, role: AgentRole, context: &str, query: &str) -> AgentReply {
        self.infer_with_history(role, context, query, &[]).await
    }

    /// A single call for `role`, with `history` placed before the query.
    pub async fn infer_with_history(
        &self,
        role: AgentRole,
        context: &str,
        query: &str,
        history: &[Message],
    ) -> AgentReply {
        let mut messages = history.to_vec();
        messages.push(Message::user(query));
        self.call(role, &self.model, context, messages).await
    }

    /// A vision call carrying the image reference on the user message.
    pub async fn infer_vision(&self, context: &str, caption: &str, image_ref: &str) -> AgentReply {
        let messages = vec![Message::user_with_image(caption, image_ref)];
        self.call(AgentRole::Vision, &self.vision_model, context, messages)
            .await
    }

    async fn call(
        &self,
        role: AgentRole,
        model: &str,
        context: &str,
        messages: Vec<Message>,
    ) -> AgentReply {
        let request = ProviderRequest::new(model, &self.system_prompt(role, context), messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        debug!(role = role.as_str(), model, "Agent inference");

        let outcome = CallOutcome::within(self.timeout, self.provider.complete(request))
            .await
            .map(|response| response.message.content);

        if !outcome.is_completed() {
            warn!(role = role.as_str(), outcome = outcome.label(), "Agent call degraded");
        }

        AgentReply { role, outcome }
    }
}
