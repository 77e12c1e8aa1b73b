//! Reply classification and optional image generation.

use parley_core::conversation::{ReplyKind, ReplyPayload};
use parley_core::outcome::CallOutcome;
use parley_core::provider::{ImageRequest, Provider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const IMAGE_PROMPT_LIMIT: usize = 1000;

pub struct PostProcessor {
    drawing_keywords: Vec<String>,
    image_provider: Option<Arc<dyn Provider>>,
    image_model: String,
    timeout: Duration,
}

impl PostProcessor {
    pub fn new(drawing_keywords: Vec<String>, timeout: Duration) -> Self {
        Self {
            drawing_keywords: drawing_keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            image_provider: None,
            image_model: "dall-e-3".into(),
            timeout,
        }
    }

    pub fn with_image_provider(mut self, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        self.image_provider = Some(provider);
        self.image_model = model.into();
        self
    }

    /// A leading Markdown heading marks a structured diagram.
    pub fn classify(text: &str) -> ReplyKind {
        if text.trim_start().starts_with('#') {
            ReplyKind::Diagram
        } else {
            ReplyKind::Text
        }
    }

    /// Whether `text` contains a drawing keyword.
    pub fn wants_image(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.drawing_keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    /// A drawing request in either the user's query or the generated reply
    /// triggers image generation.
    pub fn should_draw(&self, query: &str, generated: &str) -> bool {
        self.wants_image(query) || self.wants_image(generated)
    }

    /// Assemble the final payload for generated `text`.
    pub async fn finish(&self, text: String, query: &str, citations: Option<String>) -> ReplyPayload {
        let mut payload = ReplyPayload::text(text).with_citations(citations);
        payload.kind = Self::classify(&payload.content);

        if !self.should_draw(query, &payload.content) {
            return payload;
        }

        let Some(provider) = &self.image_provider else {
            warn!("Drawing requested but no image provider is configured");
            return payload;
        };

        let prompt: String = format!("{query}\n{}", payload.content)
            .chars()
            .take(IMAGE_PROMPT_LIMIT)
            .collect();
        let request = ImageRequest {
            model: self.image_model.clone(),
            prompt,
            size: "1024x1024".into(),
        };

        match CallOutcome::within(self.timeout, provider.generate_image(request)).await {
            CallOutcome::Completed(url) => {
                info!("Image generated for drawing request");
                payload.kind = ReplyKind::Image;
                payload.media_ref = Some(url);
            }
            other => {
                warn!(outcome = other.label(), "Image generation degraded; keeping text reply");
            }
        }
        payload
    }
}
