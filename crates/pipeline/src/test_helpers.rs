//! Shared test helpers for pipeline tests.

use parley_core::error::ProviderError;
use parley_core::message::Message;
use parley_core::provider::{ImageRequest, Provider, ProviderRequest, ProviderResponse, Usage};
use std::sync::Mutex;
use std::time::Duration;

/// What the mock does for a matching request.
#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    Fail,
    Hang,
    Panic,
}

impl Script {
    pub fn reply(text: &str) -> Self {
        Script::Reply(text.to_string())
    }
}

/// A mock provider that picks its behaviour from the system prompt.
///
/// Concurrent debate calls arrive in any order, so responses are keyed by a
/// prefix of the role prompt rather than by call sequence. Requests with no
/// matching key get `"ok"`.
pub struct ScriptedProvider {
    scripts: Vec<(String, Script)>,
    image: Option<Script>,
    requests: Mutex<Vec<ProviderRequest>>,
    image_prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            scripts: Vec::new(),
            image: None,
            requests: Mutex::new(Vec::new()),
            image_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, prompt_prefix: &str, script: Script) -> Self {
        self.scripts.push((prompt_prefix.to_string(), script));
        self
    }

    pub fn on_image(mut self, script: Script) -> Self {
        self.image = Some(script);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests whose system prompt starts with `prefix`.
    pub fn requests_for(&self, prefix: &str) -> Vec<ProviderRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.system_prompt().is_some_and(|s| s.starts_with(prefix)))
            .collect()
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.image_prompts.lock().unwrap().clone()
    }

    async fn run(script: Script) -> Result<String, ProviderError> {
        match script {
            Script::Reply(text) => Ok(text),
            Script::Fail => Err(ProviderError::ApiError {
                status_code: 500,
                message: "scripted failure".into(),
            }),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("too late".into())
            }
            Script::Panic => panic!("scripted panic"),
        }
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let system = request.system_prompt().unwrap_or_default().to_string();
        self.requests.lock().unwrap().push(request);

        let script = self
            .scripts
            .iter()
            .find(|(prefix, _)| system.starts_with(prefix.as_str()))
            .map(|(_, s)| s.clone())
            .unwrap_or_else(|| Script::reply("ok"));

        let text = Self::run(script).await?;
        Ok(make_text_response(&text))
    }

    async fn generate_image(&self, request: ImageRequest) -> Result<String, ProviderError> {
        self.image_prompts.lock().unwrap().push(request.prompt);
        match self.image.clone() {
            Some(script) => Self::run(script).await,
            None => Err(ProviderError::NotConfigured("no image script".into())),
        }
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}
