//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default chat model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Model used for image-understanding requests (falls back to `default_model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_model: Option<String>,

    /// Provider used for image generation (falls back to `default_provider`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_provider: Option<String>,

    /// Image generation model
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_provider() -> String {
    "deepseek".into()
}
fn default_model() -> String {
    "deepseek-chat".into()
}
fn default_image_model() -> String {
    "dall-e-3".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("vision_model", &self.vision_model)
            .field("image_provider", &self.image_provider)
            .field("image_model", &self.image_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("gateway", &self.gateway)
            .field("store", &self.store)
            .field("knowledge", &self.knowledge)
            .field("rules", &self.rules)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Bearer token guarding `/v1/admin/*`. Admin routes are open when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,

    /// Maximum request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            admin_token: None,
            body_limit: default_body_limit(),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("host", &self.host)
            .field("admin_token", &redact(&self.admin_token))
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path; defaults to `~/.parley/parley.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl StoreConfig {
    pub fn database_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("parley.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// "keyword" or "embedding"
    #[serde(default = "default_knowledge_backend")]
    pub backend: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Load the built-in reference passages when the index is empty
    #[serde(default = "default_true")]
    pub seed_defaults: bool,

    /// Provider used for embeddings (falls back to `default_provider`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_knowledge_backend() -> String {
    "keyword".into()
}
fn default_top_k() -> usize {
    3
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            backend: default_knowledge_backend(),
            top_k: default_top_k(),
            seed_defaults: true,
            embedding_provider: None,
            embedding_model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Insert the built-in rules when the store has none
    #[serde(default = "default_true")]
    pub seed_defaults: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self { seed_defaults: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Most recent turns handed to the synthesizer
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Drop a trailing user turn identical to the message being answered
    #[serde(default = "default_true")]
    pub drop_duplicate_trailing_turn: bool,

    #[serde(default = "default_inference_timeout")]
    pub inference_timeout_secs: u64,

    #[serde(default = "default_retrieval_timeout")]
    pub retrieval_timeout_secs: u64,

    /// Reply used when generation is unavailable
    #[serde(default = "default_busy_message")]
    pub busy_message: String,

    /// Keywords in the user query that trigger image generation
    #[serde(default = "default_drawing_keywords")]
    pub drawing_keywords: Vec<String>,

    #[serde(default)]
    pub complexity: ComplexityConfig,

    #[serde(default)]
    pub prompts: PromptConfig,
}

fn default_history_window() -> usize {
    10
}
fn default_inference_timeout() -> u64 {
    45
}
fn default_retrieval_timeout() -> u64 {
    10
}
fn default_busy_message() -> String {
    "抱歉，我现在无法正常响应。请稍后再试。".into()
}
fn default_drawing_keywords() -> Vec<String> {
    ["画", "draw", "diagram of", "picture of", "生成图片"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            drop_duplicate_trailing_turn: true,
            inference_timeout_secs: default_inference_timeout(),
            retrieval_timeout_secs: default_retrieval_timeout(),
            busy_message: default_busy_message(),
            drawing_keywords: default_drawing_keywords(),
            complexity: ComplexityConfig::default(),
            prompts: PromptConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityConfig {
    /// Messages longer than this many characters are handled by debate
    #[serde(default = "default_length_threshold")]
    pub length_threshold: usize,

    #[serde(default = "default_complexity_keywords")]
    pub keywords: Vec<String>,
}

fn default_length_threshold() -> usize {
    15
}
fn default_complexity_keywords() -> Vec<String> {
    [
        "起诉",
        "怎么办",
        "合同",
        "file suit",
        "what should i do",
        "contract",
        "lawsuit",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            length_threshold: default_length_threshold(),
            keywords: default_complexity_keywords(),
        }
    }
}

/// Role-specific system instructions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_advocate_prompt")]
    pub advocate: String,

    #[serde(default = "default_skeptic_prompt")]
    pub skeptic: String,

    #[serde(default = "default_synthesizer_prompt")]
    pub synthesizer: String,

    #[serde(default = "default_vision_prompt")]
    pub vision: String,
}

fn default_advocate_prompt() -> String {
    "You are the advocate in a legal consultation. Using the reference material, \
     argue for the strongest position available to the user and list the legal \
     grounds that support it. Be concise."
        .into()
}
fn default_skeptic_prompt() -> String {
    "You are the skeptic in a legal consultation. Using the reference material, \
     identify the risks, counter-arguments and missing facts in the user's position. \
     Be concise."
        .into()
}
fn default_synthesizer_prompt() -> String {
    "You are the synthesizer, a professional legal assistant. Answer the user's \
     question accurately and plainly, cite the reference material where it applies, \
     and reply in the user's language. When the answer is a structured outline, \
     write it as a Markdown heading hierarchy."
        .into()
}
fn default_vision_prompt() -> String {
    "You are a legal assistant reviewing an image sent by the user, such as a \
     contract, notice or receipt. Describe what is legally relevant in it and \
     answer the user's caption."
        .into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            advocate: default_advocate_prompt(),
            skeptic: default_skeptic_prompt(),
            synthesizer: default_synthesizer_prompt(),
            vision: default_vision_prompt(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Also checks environment variables:
    /// - `PARLEY_API_KEY` (highest priority), then `DEEPSEEK_API_KEY`, `OPENAI_API_KEY`
    /// - `PARLEY_PROVIDER`, `PARLEY_MODEL`, `PARLEY_DATABASE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("PARLEY_API_KEY") {
            self.api_key = Some(key);
        } else if self.api_key.is_none() {
            self.api_key = var("DEEPSEEK_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }

        if let Some(provider) = var("PARLEY_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = var("PARLEY_MODEL") {
            self.default_model = model;
        }

        if let Some(db) = var("PARLEY_DATABASE") {
            self.store.path = Some(PathBuf::from(db));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !matches!(self.store.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be 'sqlite' or 'memory', got '{}'",
                self.store.backend
            )));
        }

        if !matches!(self.knowledge.backend.as_str(), "keyword" | "embedding") {
            return Err(ConfigError::ValidationError(format!(
                "knowledge.backend must be 'keyword' or 'embedding', got '{}'",
                self.knowledge.backend
            )));
        }

        if !(1..=10).contains(&self.knowledge.top_k) {
            return Err(ConfigError::ValidationError(
                "knowledge.top_k must be between 1 and 10".into(),
            ));
        }

        if self.pipeline.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.history_window must be > 0".into(),
            ));
        }

        if self.pipeline.inference_timeout_secs == 0 || self.pipeline.retrieval_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline timeouts must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            vision_model: None,
            image_provider: None,
            image_model: default_image_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            gateway: GatewayConfig::default(),
            store: StoreConfig::default(),
            knowledge: KnowledgeConfig::default(),
            rules: RulesConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "deepseek");
        assert_eq!(config.pipeline.history_window, 10);
        assert_eq!(config.pipeline.complexity.length_threshold, 15);
        assert_eq!(config.knowledge.top_k, 3);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.pipeline.drawing_keywords, config.pipeline.drawing_keywords);
    }

    #[test]
    fn invalid_values_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.store.backend = "postgres".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.knowledge.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_model, "deepseek-chat");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_model = "gpt-4o-mini"

[pipeline]
history_window = 4

[pipeline.complexity]
length_threshold = 40
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.pipeline.history_window, 4);
        assert_eq!(config.pipeline.complexity.length_threshold, 40);
        assert!(config.pipeline.complexity.keywords.contains(&"合同".to_string()));
        assert_eq!(config.pipeline.inference_timeout_secs, 45);
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_model = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            "DEEPSEEK_API_KEY" => Some("sk-deep".into()),
            "PARLEY_MODEL" => Some("deepseek-reasoner".into()),
            "PARLEY_DATABASE" => Some("/tmp/p.db".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("sk-deep"));
        assert_eq!(config.default_model, "deepseek-reasoner");
        assert_eq!(config.store.database_path(), PathBuf::from("/tmp/p.db"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.gateway.admin_token = Some("hunter2".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("deepseek"));
        assert!(toml_str.contains("history_window"));
    }
}
