use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::{ChatMessage, GatewayReply, Pricing};

/// Errors that can occur while talking to a language model
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Model API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode model response: {0}")]
    Decode(String),

    #[error("Model returned no choices")]
    EmptyResponse,

    #[error("No API key configured (set {0})")]
    MissingApiKey(&'static str),

    #[error("Gateway configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Whether a fresh request has a chance of succeeding
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            GatewayError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Provider {
    #[default]
    OpenAi,
    Azure,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Azure => write!(f, "azure"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "open-ai" => Ok(Provider::OpenAi),
            "azure" | "azure-openai" => Ok(Provider::Azure),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

impl Provider {
    /// Provider selected by `OPENAI_API_TYPE`, if set to something we know
    pub fn from_env() -> Option<Self> {
        std::env::var("OPENAI_API_TYPE").ok()?.parse().ok()
    }

    /// Environment variable holding the API key for this provider
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Azure => "AZURE_OPENAI_API_KEY",
        }
    }
}

/// Configuration for gateway requests
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub provider: Provider,
    /// Model name (also used to look up token prices)
    pub model: String,
    /// API root; for Azure this is the resource endpoint
    pub base_url: Option<String>,
    /// Explicit API key; falls back to the provider's environment variable
    pub api_key: Option<String>,
    pub azure_deployment: Option<String>,
    pub azure_api_version: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout (None = no limit)
    pub timeout: Option<Duration>,
    /// Transport-level retries for 429/5xx/timeouts within one submit
    pub max_retries: u8,
    pub retry_base_ms: u64,
    /// Price override; None = built-in table
    pub pricing: Option<Pricing>,
}

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_AZURE_API_VERSION: &str = "2023-05-15";

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: "gpt-4".to_string(),
            base_url: None,
            api_key: None,
            azure_deployment: None,
            azure_api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            temperature: 0.0,
            max_tokens: 1000,
            timeout: Some(Duration::from_secs(120)),
            max_retries: 2,
            retry_base_ms: 1000,
            pricing: None,
        }
    }
}

impl GatewayConfig {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn with_retries(mut self, max_retries: u8, retry_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_base_ms = retry_base_ms;
        self
    }

    /// Resolve the API key: explicit value first, then the environment
    pub fn resolve_api_key(&self) -> Result<String, GatewayError> {
        if let Some(ref key) = self.api_key {
            if !key.trim().is_empty() {
                return Ok(key.clone());
            }
        }
        let var = self.provider.api_key_var();
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(GatewayError::MissingApiKey(var)),
        }
    }

    /// Price table in effect for this configuration
    pub fn effective_pricing(&self) -> Pricing {
        self.pricing
            .unwrap_or_else(|| Pricing::for_model(&self.model))
    }
}

/// The boundary to a text-generation service
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Human-readable name (e.g., "OpenAI")
    fn name(&self) -> &str;

    /// Model the gateway submits to
    fn model(&self) -> &str;

    /// Submit an ordered conversation and wait for the full reply
    async fn submit(&self, messages: &[ChatMessage]) -> Result<GatewayReply, GatewayError>;
}
