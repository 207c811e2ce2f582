//! Project configuration file support for autocritic.
//!
//! Loads configuration from `autocritic.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use autocritic_critic::RepairPolicy;
use autocritic_gateway::{GatewayConfig, Pricing, Provider};
use autocritic_ledger::DEFAULT_LEDGER_FILE;

/// Project-level configuration loaded from `autocritic.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Model provider ("openai" or "azure")
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Ledger file, relative to the working directory
    pub ledger: Option<PathBuf>,
    /// Event log file, relative to the working directory
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub repair: RepairSection,
    /// Token price override
    pub pricing: Option<PricingSection>,
}

/// Connection settings for the model gateway
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    pub base_url: Option<String>,
    pub azure_deployment: Option<String>,
    pub azure_api_version: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u8>,
}

/// Repair exchange settings
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RepairSection {
    pub max_attempts: Option<usize>,
    pub backoff_ms: Option<u64>,
}

/// USD per 1K tokens
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct PricingSection {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "autocritic.toml";

/// Default event log, written beside the ledger
pub const DEFAULT_LOG_FILE: &str = "add_memory.log";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Get the effective provider.
    /// Priority: CLI > config file > OPENAI_API_TYPE > openai
    pub fn provider(&self, cli: Option<&str>) -> Result<Provider> {
        match cli.or(self.provider.as_deref()) {
            Some(name) => name.parse().map_err(|e: String| anyhow::anyhow!(e)),
            None => Ok(Provider::from_env().unwrap_or_default()),
        }
    }

    /// Build the gateway configuration with CLI overrides applied
    pub fn gateway_config(
        &self,
        cli_provider: Option<&str>,
        cli_model: Option<&str>,
    ) -> Result<GatewayConfig> {
        let provider = self.provider(cli_provider)?;
        let defaults = GatewayConfig::default();
        let model = cli_model
            .or(self.model.as_deref())
            .unwrap_or(defaults.model.as_str())
            .to_string();

        let mut config = GatewayConfig::new(provider, model);
        config.temperature = self.temperature.unwrap_or(defaults.temperature);
        config.max_tokens = self.max_tokens.unwrap_or(defaults.max_tokens);
        config.base_url = self.gateway.base_url.clone();
        config.azure_deployment = self.gateway.azure_deployment.clone();
        if let Some(ref version) = self.gateway.azure_api_version {
            config.azure_api_version = version.clone();
        }
        if let Some(secs) = self.gateway.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = self.gateway.max_retries {
            config.max_retries = retries;
        }
        if let Some(pricing) = self.pricing {
            config = config.with_pricing(Pricing::new(
                pricing.prompt_per_1k,
                pricing.completion_per_1k,
            ));
        }
        Ok(config)
    }

    pub fn repair_policy(&self) -> RepairPolicy {
        let defaults = RepairPolicy::default();
        RepairPolicy {
            max_attempts: self.repair.max_attempts.unwrap_or(defaults.max_attempts),
            backoff: self
                .repair
                .backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff),
        }
    }

    /// Get the effective ledger path.
    /// Priority: CLI > config file > `reflection.json`
    pub fn ledger_path(&self, working_dir: &Path, cli: Option<&Path>) -> PathBuf {
        let path = cli
            .map(Path::to_path_buf)
            .or_else(|| self.ledger.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_FILE));
        resolve(working_dir, path)
    }

    /// Event log path; defaults to `add_memory.log` beside the ledger
    pub fn log_path(&self, working_dir: &Path, ledger_path: &Path) -> PathBuf {
        match self.log_file {
            Some(ref path) => resolve(working_dir, path.clone()),
            None => ledger_path
                .parent()
                .unwrap_or(working_dir)
                .join(DEFAULT_LOG_FILE),
        }
    }
}

fn resolve(working_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        working_dir.join(path)
    }
}
