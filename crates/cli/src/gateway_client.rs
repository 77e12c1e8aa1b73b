//! HTTP client for a running gateway's `/v1/admin` API.
//!
//! Rule edits made through the gateway reload its live cache, so the CLI
//! prefers this path over writing to the store directly.

use parley_config::AppConfig;
use parley_core::rule::{NewRule, Rule, RuleUpdate};
use parley_gateway::api_v1::{ErrorResponse, RuleTestRequest};
use parley_rules::{ReloadReport, RuleHit, RuleMutation};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("cannot reach the gateway at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("gateway rejected the admin token (HTTP {0}); set gateway.admin_token")]
    Unauthorized(u16),

    #[error("gateway returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected gateway response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

/// Admin API client bound to one gateway.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// `url` when given, else the configured listen address. A wildcard bind
    /// address is reached over loopback.
    pub fn from_config(config: &AppConfig, url: Option<&str>) -> Self {
        let base_url = match url {
            Some(url) => url.to_string(),
            None => {
                let host = match config.gateway.host.as_str() {
                    "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
                    host => host,
                };
                format!("http://{host}:{}", config.gateway.port)
            }
        };
        Self::new(base_url, config.gateway.admin_token.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}/v1/admin{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await.map_err(|e| ClientError::Unreachable {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<Rule>, ClientError> {
        self.send(self.request(Method::GET, "/rules")).await
    }

    pub async fn create(&self, rule: &NewRule) -> Result<RuleMutation<Rule>, ClientError> {
        self.send(self.request(Method::POST, "/rules").json(rule)).await
    }

    pub async fn update(&self, id: i64, update: &RuleUpdate) -> Result<RuleMutation<Rule>, ClientError> {
        self.send(self.request(Method::PUT, &format!("/rules/{id}")).json(update))
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<RuleMutation<i64>, ClientError> {
        self.send(self.request(Method::DELETE, &format!("/rules/{id}")))
            .await
    }

    pub async fn reload(&self) -> Result<ReloadReport, ClientError> {
        self.send(self.request(Method::POST, "/rules/reload")).await
    }

    /// The rule the gateway's live cache would answer `text` with.
    pub async fn test(&self, text: &str) -> Result<Option<RuleHit>, ClientError> {
        let body = RuleTestRequest { text: text.to_string() };
        self.send(self.request(Method::POST, "/rules/test").json(&body))
            .await
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = status.as_u16();
    if code == 401 || code == 403 {
        return Err(ClientError::Unauthorized(code));
    }
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };
    Err(ClientError::Api { status: code, message })
}
