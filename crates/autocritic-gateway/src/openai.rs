use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{
    ChatMessage, Gateway, GatewayConfig, GatewayError, GatewayReply, Pricing, Provider, Usage,
    DEFAULT_OPENAI_BASE_URL,
};

/// Longest wait between transport retries
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Chat-completions gateway for OpenAI and Azure OpenAI
pub struct OpenAiGateway {
    client: reqwest::Client,
    config: GatewayConfig,
    endpoint: String,
    api_key: String,
    pricing: Pricing,
}

impl OpenAiGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let api_key = config.resolve_api_key()?;
        let endpoint = Self::endpoint(&config)?;
        let pricing = config.effective_pricing();

        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(10));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            config,
            endpoint,
            api_key,
            pricing,
        })
    }

    /// Full chat-completions URL for the configured provider
    fn endpoint(config: &GatewayConfig) -> Result<String, GatewayError> {
        match config.provider {
            Provider::OpenAi => {
                let base = config
                    .base_url
                    .clone()
                    .or_else(|| std::env::var("OPENAI_API_BASE").ok())
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
                Ok(format!("{}/chat/completions", base.trim_end_matches('/')))
            }
            Provider::Azure => {
                let base = config
                    .base_url
                    .clone()
                    .or_else(|| std::env::var("AZURE_OPENAI_ENDPOINT").ok())
                    .or_else(|| std::env::var("OPENAI_API_BASE").ok())
                    .ok_or_else(|| {
                        GatewayError::Config(
                            "Azure requires an endpoint (gateway.base_url or AZURE_OPENAI_ENDPOINT)"
                                .into(),
                        )
                    })?;
                let deployment = config
                    .azure_deployment
                    .as_deref()
                    .unwrap_or(config.model.as_str());
                Ok(format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    base.trim_end_matches('/'),
                    deployment,
                    config.azure_api_version
                ))
            }
        }
    }

    fn build_payload(&self, messages: &[ChatMessage]) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.as_wire(), "content": m.content }))
            .collect();
        json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        })
    }

    async fn send_once(&self, payload: &Value) -> Result<String, GatewayError> {
        let request = self.client.post(&self.endpoint).json(payload);
        let request = match self.config.provider {
            Provider::OpenAi => request.bearer_auth(&self.api_key),
            Provider::Azure => request.header("api-key", &self.api_key),
        };

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn parse_reply(&self, body: &str) -> Result<(String, Usage), GatewayError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))?;

        let choice = value
            .get("choices")
            .and_then(|v| v.as_array())
            .ok_or_else(|| GatewayError::Decode("missing choices".into()))?
            .first()
            .ok_or(GatewayError::EmptyResponse)?;

        // Blank or null content is still a reply
        let text = match choice.get("message").and_then(|m| m.get("content")) {
            Some(Value::String(text)) => text.as_str(),
            Some(Value::Null) => "",
            _ => {
                return Err(GatewayError::Decode(
                    "missing choices[0].message.content".into(),
                ))
            }
        };

        let usage = match value.get("usage") {
            Some(usage) if usage.is_object() => {
                let prompt = usage
                    .get("prompt_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                let completion = usage
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                self.pricing.usage(prompt, completion)
            }
            _ => Usage::default(),
        };

        Ok((text.to_string(), usage))
    }
}

#[async_trait]
impl Gateway for OpenAiGateway {
    fn name(&self) -> &str {
        match self.config.provider {
            Provider::OpenAi => "OpenAI",
            Provider::Azure => "Azure OpenAI",
        }
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn submit(&self, messages: &[ChatMessage]) -> Result<GatewayReply, GatewayError> {
        let start = Instant::now();
        let payload = self.build_payload(messages);

        debug!(
            gateway = self.name(),
            model = %self.config.model,
            messages = messages.len(),
            "Submitting conversation"
        );

        let mut attempt: u8 = 0;
        let body = loop {
            match self.send_once(&payload).await {
                Ok(body) => break body,
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = retry_delay(self.config.retry_base_ms, attempt);
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Transient gateway failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let (text, usage) = self.parse_reply(&body)?;
        let duration = start.elapsed();

        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost_usd = usage.cost_usd,
            duration_secs = duration.as_secs_f64(),
            "Gateway call completed"
        );

        Ok(GatewayReply::new(text, usage, duration))
    }
}

fn retry_delay(base_ms: u64, attempt: u8) -> Duration {
    let exponential = base_ms.saturating_mul(2_u64.saturating_pow(u32::from(attempt)));
    Duration::from_millis(exponential.min(MAX_RETRY_DELAY_MS))
}
