//! Wiring: configuration in, ready-to-serve services out.
//!
//! Shared subsystems (provider router, stores, rule cache, event bus) are
//! built once and handed to both the chat path and the rule admin.

use parley_config::AppConfig;
use parley_core::error::Error;
use parley_core::event::EventBus;
use parley_core::knowledge::KnowledgeIndex;
use parley_core::provider::Provider;
use parley_core::store::{ConversationStore, RuleStore};
use parley_pipeline::{
    AgentInferenceUnit, ChatService, ComplexityClassifier, KnowledgeRetriever, OrchestratorSettings,
    PostProcessor, ResponseOrchestrator,
};
use parley_rules::{RuleAdmin, RuleCache, RuleMatcher, seed_if_empty};
use parley_store::{EmbeddingKnowledgeIndex, InMemoryStore, KeywordKnowledgeIndex, SqliteStore, seed_passages};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// External dependencies of the pipeline, resolved from config or injected by tests.
pub struct Backends {
    pub provider: Arc<dyn Provider>,
    pub image_provider: Option<Arc<dyn Provider>>,
    pub rules: Arc<dyn RuleStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub knowledge: Arc<dyn KnowledgeIndex>,
}

impl Backends {
    /// Resolve providers, stores and the knowledge index from `config`.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let router = parley_providers::build_from_config(config);
        let provider = router.default().ok_or_else(|| Error::Config {
            message: format!("provider '{}' is not available", config.default_provider),
        })?;
        let image_provider = config
            .image_provider
            .as_deref()
            .and_then(|name| router.get(name))
            .or_else(|| Some(provider.clone()));

        let (rules, conversations) = open_stores(config).await?;

        let knowledge: Arc<dyn KnowledgeIndex> = match config.knowledge.backend.as_str() {
            "keyword" => Arc::new(KeywordKnowledgeIndex::new()),
            "embedding" => {
                let embedder = router
                    .get_or_default(config.knowledge.embedding_provider.as_deref())
                    .ok_or_else(|| Error::Config {
                        message: "no provider available for embeddings".into(),
                    })?;
                Arc::new(EmbeddingKnowledgeIndex::new(
                    embedder,
                    config.knowledge.embedding_model.clone(),
                ))
            }
            other => {
                return Err(Error::Config {
                    message: format!("unknown knowledge backend '{other}'"),
                });
            }
        };

        Ok(Self {
            provider,
            image_provider,
            rules,
            conversations,
            knowledge,
        })
    }
}

/// Open the configured rule and conversation store.
pub async fn open_stores(
    config: &AppConfig,
) -> Result<(Arc<dyn RuleStore>, Arc<dyn ConversationStore>), Error> {
    match config.store.backend.as_str() {
        "memory" => {
            let store = Arc::new(InMemoryStore::new());
            Ok((store.clone(), store))
        }
        "sqlite" => {
            let path = config.store.database_path();
            let store = Arc::new(SqliteStore::open_file(&path).await?);
            info!(path = %path.display(), "SQLite store opened");
            Ok((store.clone(), store))
        }
        other => Err(Error::Config {
            message: format!("unknown store backend '{other}'"),
        }),
    }
}

/// Everything the HTTP surface and the CLI need.
#[derive(Clone)]
pub struct Runtime {
    pub config: AppConfig,
    pub chat: Arc<ChatService>,
    pub admin: Arc<RuleAdmin>,
    pub events: Arc<EventBus>,
    pub knowledge: Arc<dyn KnowledgeIndex>,
}

impl Runtime {
    pub async fn from_config(config: AppConfig) -> Result<Self, Error> {
        let backends = Backends::from_config(&config).await?;
        Self::assemble(config, backends).await
    }

    /// Seed defaults, load the rule cache and wire the pipeline.
    pub async fn assemble(config: AppConfig, backends: Backends) -> Result<Self, Error> {
        let events = Arc::new(EventBus::default());

        if config.rules.seed_defaults {
            seed_if_empty(backends.rules.as_ref()).await?;
        }
        if config.knowledge.seed_defaults && backends.knowledge.count().await.unwrap_or(0) == 0 {
            for passage in seed_passages() {
                if let Err(e) = backends.knowledge.add(passage).await {
                    warn!(error = %e, "Failed to seed knowledge passage");
                }
            }
        }

        let cache = Arc::new(RuleCache::new());
        let admin = Arc::new(
            RuleAdmin::new(backends.rules.clone(), cache.clone()).with_events(events.clone()),
        );
        // An unreachable store leaves the cache empty; rules resume on the next reload.
        match admin.reload().await {
            Ok(report) => info!(active = report.active, skipped = report.skipped.len(), "Rule cache loaded"),
            Err(e) => warn!(error = %e, "Initial rule cache load failed"),
        }

        let pipeline = &config.pipeline;
        let inference_timeout = Duration::from_secs(pipeline.inference_timeout_secs);

        let mut agents = AgentInferenceUnit::new(
            backends.provider.clone(),
            config.default_model.clone(),
            inference_timeout,
        )
        .with_sampling(config.default_temperature, config.default_max_tokens)
        .with_prompts(pipeline.prompts.clone());
        if let Some(vision) = &config.vision_model {
            agents = agents.with_vision_model(vision.clone());
        }

        let mut post = PostProcessor::new(pipeline.drawing_keywords.clone(), inference_timeout);
        if let Some(image_provider) = backends.image_provider {
            post = post.with_image_provider(image_provider, config.image_model.clone());
        }

        let orchestrator = ResponseOrchestrator::new(
            RuleMatcher::new(cache),
            KnowledgeRetriever::new(
                backends.knowledge.clone(),
                config.knowledge.top_k,
                Duration::from_secs(pipeline.retrieval_timeout_secs),
            ),
            ComplexityClassifier::from_config(&pipeline.complexity),
            agents,
            post,
            OrchestratorSettings::from(pipeline),
        )
        .with_events(events.clone());

        let chat = Arc::new(
            ChatService::new(backends.conversations, Arc::new(orchestrator)).with_events(events.clone()),
        );

        Ok(Self {
            config,
            chat,
            admin,
            events,
            knowledge: backends.knowledge,
        })
    }
}
