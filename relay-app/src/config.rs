//! Relay configuration loader.
//!
//! Resolved once at startup from a TOML file plus environment overrides, then
//! shared read-only by every invocation.

use relay_channels::{DEFAULT_BOT_NAME, DEFAULT_MAX_ANSWER_CHARS, HmacVerifier};
use relay_llm::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, SamplingParams};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "teamsrelay.toml";
pub const DEFAULT_INFERENCE_ENDPOINT: &str = "https://bedrock-runtime.us-east-1.amazonaws.com";
pub const DEFAULT_WEBHOOK_PATH: &str = "/api/v1/teams/messages";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub teams: TeamsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Route the connector posts to.
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Larger bodies are acknowledged without being relayed.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            webhook_path: default_webhook_path(),
            request_timeout_seconds: default_request_timeout_seconds(),
            max_in_flight: default_max_in_flight(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_webhook_path() -> String {
    DEFAULT_WEBHOOK_PATH.to_string()
}

fn default_request_timeout_seconds() -> u64 {
    120
}

fn default_max_in_flight() -> usize {
    64
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

#[derive(Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Base64 shared key issued by the connector.
    #[serde(default)]
    pub hmac_secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("hmac_secret_set", &!self.hmac_secret.trim().is_empty())
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_inference_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_inference_endpoint(),
            model: default_model(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_seconds: default_inference_timeout_seconds(),
        }
    }
}

impl std::fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key_set", &self.api_key.is_some())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

fn default_inference_endpoint() -> String {
    DEFAULT_INFERENCE_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_inference_timeout_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamsConfig {
    /// Incoming-webhook URL that receives the answer card.
    #[serde(default)]
    pub webhook_url: String,
    /// Mention stripped from the start of each question.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    #[serde(default = "default_max_answer_chars")]
    pub max_answer_chars: usize,
    #[serde(default = "default_teams_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for TeamsConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            bot_name: default_bot_name(),
            max_answer_chars: default_max_answer_chars(),
            timeout_seconds: default_teams_timeout_seconds(),
        }
    }
}

fn default_bot_name() -> String {
    DEFAULT_BOT_NAME.to_string()
}

fn default_max_answer_chars() -> usize {
    DEFAULT_MAX_ANSWER_CHARS
}

fn default_teams_timeout_seconds() -> u64 {
    30
}

impl RelayConfig {
    /// Loads `path`, or the default path when `None`. Only an explicit path must exist;
    /// without one the relay may be configured from the environment alone.
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(default_config_path);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    config_path = %path.display(),
                    "config file not found; using defaults and environment"
                );
                String::new()
            }
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };

        let mut cfg = Self::from_toml(&contents)
            .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?;
        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("TEAMSRELAY_HMAC_SECRET") {
            self.auth.hmac_secret = v;
        }
        if let Some(v) = var("TEAMSRELAY_TEAMS_WEBHOOK_URL") {
            self.teams.webhook_url = v;
        }
        if let Some(v) = var("TEAMSRELAY_BOT_NAME") {
            self.teams.bot_name = v;
        }
        if let Some(v) = var("TEAMSRELAY_INFERENCE_API_KEY") {
            self.inference.api_key = Some(v);
        }
        if let Some(v) = var("TEAMSRELAY_INFERENCE_ENDPOINT") {
            self.inference.endpoint = v;
        }
        if let Some(v) = var("TEAMSRELAY_MODEL") {
            self.inference.model = v;
        }
        if let Some(v) = var("TEAMSRELAY_BIND_ADDR") {
            match v.trim().parse() {
                Ok(addr) => self.server.bind_addr = addr,
                Err(e) => {
                    tracing::warn!(value = %v, error = %e, "ignoring invalid TEAMSRELAY_BIND_ADDR")
                }
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        HmacVerifier::from_base64(&self.auth.hmac_secret)
            .map_err(|e| anyhow::anyhow!("auth.hmac_secret: {e}"))?;
        if self.teams.webhook_url.trim().is_empty() {
            return Err(anyhow::anyhow!("teams.webhook_url is required"));
        }
        if self.teams.max_answer_chars == 0 {
            return Err(anyhow::anyhow!("teams.max_answer_chars must be > 0"));
        }
        if self.teams.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("teams.timeout_seconds must be > 0"));
        }
        if self.inference.model.trim().is_empty() {
            return Err(anyhow::anyhow!("inference.model is required"));
        }
        if self.inference.max_tokens == 0 {
            return Err(anyhow::anyhow!("inference.max_tokens must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.inference.temperature) {
            return Err(anyhow::anyhow!(
                "inference.temperature must be within 0.0..=1.0"
            ));
        }
        if self.inference.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("inference.timeout_seconds must be > 0"));
        }
        if !self.server.webhook_path.starts_with('/') {
            return Err(anyhow::anyhow!("server.webhook_path must start with '/'"));
        }
        let outbound_seconds = self
            .inference
            .timeout_seconds
            .saturating_add(self.teams.timeout_seconds);
        if self.server.request_timeout_seconds <= outbound_seconds {
            return Err(anyhow::anyhow!(
                "server.request_timeout_seconds ({}) must exceed inference.timeout_seconds + \
                 teams.timeout_seconds ({outbound_seconds})",
                self.server.request_timeout_seconds
            ));
        }
        if self.server.max_in_flight == 0 {
            return Err(anyhow::anyhow!("server.max_in_flight must be > 0"));
        }
        if self.server.max_body_bytes == 0 {
            return Err(anyhow::anyhow!("server.max_body_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            max_tokens_to_sample: self.inference.max_tokens,
            temperature: self.inference.temperature,
        }
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference.timeout_seconds)
    }

    pub fn teams_timeout(&self) -> Duration {
        Duration::from_secs(self.teams.timeout_seconds)
    }
}

pub fn default_config_path() -> PathBuf {
    Path::new(DEFAULT_CONFIG_FILE).to_path_buf()
}
