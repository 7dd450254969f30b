//! Shared types used across the nyaya crates.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Identity used when the caller's address cannot be determined.
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Environment variable consulted when `llm_api_key` is not set in config.
const ENV_GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";

/// Per-request caller context. `identity` partitions conversation memory; it carries
/// no authentication meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerContext {
    /// Opaque, per-caller stable key (typically the peer IP).
    pub identity: String,
    /// Optional correlation id for request tracing.
    #[serde(default)]
    pub correlation_id: Option<String>,
}

impl CallerContext {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Resolved identity (never empty).
    pub fn resolved_identity(&self) -> &str {
        let id = self.identity.trim();
        if id.is_empty() {
            ANONYMOUS_IDENTITY
        } else {
            id
        }
    }
}

/// Mode for the generative fallback: a live remote model or the offline mock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LlmMode {
    Mock,
    #[default]
    Live,
}

impl LlmMode {
    /// `"mock"` (any case) selects the mock; everything else is live.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("mock") {
            LlmMode::Mock
        } else {
            LlmMode::Live
        }
    }
}

/// Global application configuration for the gateway. Load from TOML or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Application identity shown in logs and the health endpoint.
    pub app_name: String,
    /// Bind address for the gateway.
    pub host: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Path of the CSV knowledge source (`question,answer,law_reference`).
    pub knowledge_path: String,
    /// LLM mode ("live" or "mock").
    pub llm_mode: String,
    /// Remote model id used in live mode.
    pub llm_model: String,
    /// Base URL of the generative API.
    pub llm_api_url: String,
    /// Credential for the generative API. Falls back to `GOOGLE_API_KEY`.
    #[serde(default)]
    pub llm_api_key: Option<String>,
    /// Upper bound for one fallback generation call, in seconds.
    pub generation_timeout_secs: u64,
    /// Per-caller `/chat` requests allowed per minute. 0 disables the limiter.
    pub rate_limit_per_minute: u32,
    /// If true, the gateway serves static files from `frontend_dir`. (Config alias: `ui_enabled`)
    #[serde(default, alias = "ui_enabled")]
    pub frontend_enabled: bool,
    /// Root directory of the static frontend.
    pub frontend_dir: String,
    /// Derive caller identity from `X-Forwarded-For` (only behind a trusted proxy).
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            app_name: "Nyaya Legal Assistant".to_string(),
            host: "0.0.0.0".to_string(),
            port: 5000,
            knowledge_path: "legal_faq.csv".to_string(),
            llm_mode: "live".to_string(),
            llm_model: "gemini-1.5-flash".to_string(),
            llm_api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            llm_api_key: None,
            generation_timeout_secs: 30,
            rate_limit_per_minute: 40,
            frontend_enabled: true,
            frontend_dir: "public".to_string(),
            trust_forwarded_for: false,
        }
    }
}

impl CoreConfig {
    /// Load config from file and environment. Precedence: env `NYAYA__*` > file named by
    /// `NYAYA_CONFIG` (default `config/gateway`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("NYAYA_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let d = Self::default();
        let builder = config::Config::builder()
            .set_default("app_name", d.app_name)?
            .set_default("host", d.host)?
            .set_default("port", i64::from(d.port))?
            .set_default("knowledge_path", d.knowledge_path)?
            .set_default("llm_mode", d.llm_mode)?
            .set_default("llm_model", d.llm_model)?
            .set_default("llm_api_url", d.llm_api_url)?
            .set_default("generation_timeout_secs", d.generation_timeout_secs as i64)?
            .set_default("rate_limit_per_minute", i64::from(d.rate_limit_per_minute))?
            .set_default("frontend_enabled", d.frontend_enabled)?
            .set_default("frontend_dir", d.frontend_dir)?
            .set_default("trust_forwarded_for", d.trust_forwarded_for)?;

        // `config` resolves "config/gateway" to config/gateway.toml; an explicit path is used as-is.
        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder.add_source(config::File::with_name(&config_path).required(false))
        };

        let built = builder
            .add_source(config::Environment::with_prefix("NYAYA").separator("__"))
            .build()?;

        built.try_deserialize()
    }

    /// Credential for the generative API: config value first, then `GOOGLE_API_KEY`.
    /// Blank values count as absent.
    pub fn api_key(&self) -> Option<String> {
        self.llm_api_key
            .clone()
            .or_else(|| std::env::var(ENV_GOOGLE_API_KEY).ok())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    pub fn llm_mode(&self) -> LlmMode {
        LlmMode::parse(&self.llm_mode)
    }

    /// Generation timeout, never below one second.
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs.max(1))
    }
}
