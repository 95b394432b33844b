//! Configuration loading for the Sentinel X CLI.
//!
//! One YAML document covers every tunable: the signature table, the
//! detector cadence, queue capacity, per-stage backend priority lists
//! with timeouts, the policy document path, the API bind address, and
//! the operation mode. The file is read once at startup; changing it
//! requires a restart.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use sx_analysis::OperationMode;
use sx_sentry::Signature;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Supervised (default) or autonomous operation.
    #[serde(default)]
    pub operation_mode: OperationMode,

    /// Hostname stamped onto locally detected alerts. Defaults to the
    /// machine's own hostname.
    #[serde(default)]
    pub hostname: Option<String>,

    /// Detector tuning.
    #[serde(default)]
    pub detector: DetectorSection,

    /// Threat queue tuning.
    #[serde(default)]
    pub queue: QueueSection,

    /// Analyst and Expert stage backends.
    #[serde(default)]
    pub analysis: AnalysisSection,

    /// Policy document location and evaluation bound.
    #[serde(default)]
    pub policy: PolicySection,

    /// HTTP API bind address.
    #[serde(default)]
    pub api: ApiSection,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Loads the file when given, otherwise returns defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Creates a copy with backend API keys redacted.
    pub fn redact_secrets(&self) -> Self {
        let mut config = self.clone();
        for backend in config
            .analysis
            .analyst
            .iter_mut()
            .chain(config.analysis.expert.iter_mut())
        {
            if !backend.api_key.is_empty() {
                backend.api_key = "***REDACTED***".to_string();
            }
        }
        config
    }
}

/// Detector loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorSection {
    /// Poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive scan errors before backing off.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,

    /// Upper bound on a backoff pause, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Ordered signature table. Empty means the built-in table.
    #[serde(default)]
    pub signatures: Vec<Signature>,
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_error_threshold() -> u32 {
    3
}

fn default_max_backoff_ms() -> u64 {
    5000
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            error_threshold: default_error_threshold(),
            max_backoff_ms: default_max_backoff_ms(),
            signatures: Vec::new(),
        }
    }
}

/// Threat queue tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSection {
    /// Maximum queued events before the oldest is evicted.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

fn default_queue_capacity() -> usize {
    sx_core::DEFAULT_QUEUE_CAPACITY
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
        }
    }
}

/// Analysis pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSection {
    /// How often the consumer polls an empty queue, in milliseconds.
    #[serde(default = "default_consume_interval_ms")]
    pub consume_interval_ms: u64,

    /// Analyst stage backends, in priority order (fast/shallow first).
    #[serde(default)]
    pub analyst: Vec<BackendConfig>,

    /// Expert stage backends, in priority order (slow/deep first).
    #[serde(default)]
    pub expert: Vec<BackendConfig>,
}

fn default_consume_interval_ms() -> u64 {
    200
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            consume_interval_ms: default_consume_interval_ms(),
            analyst: Vec::new(),
            expert: Vec::new(),
        }
    }
}

/// Supported analysis service providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendProvider {
    Gemini,
    Openai,
}

/// One backend slot in a stage's priority list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Which provider client to use.
    pub provider: BackendProvider,

    /// Model name passed to the provider.
    pub model: String,

    /// Inline API key. Prefer `api_key_env` in committed configs.
    #[serde(default)]
    pub api_key: String,

    /// Environment variable to read the API key from when `api_key` is
    /// empty.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Override for the provider's base URL.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Fixed per-call timeout in seconds.
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend_timeout_secs() -> u64 {
    30
}

impl BackendConfig {
    /// Resolves the API key from the inline value or the named
    /// environment variable.
    pub fn resolve_api_key(&self) -> Result<String> {
        if !self.api_key.is_empty() {
            return Ok(self.api_key.clone());
        }
        if let Some(var) = &self.api_key_env {
            return std::env::var(var)
                .with_context(|| format!("API key environment variable {} is not set", var));
        }
        bail!(
            "backend {}:{} has neither api_key nor api_key_env",
            match self.provider {
                BackendProvider::Gemini => "gemini",
                BackendProvider::Openai => "openai",
            },
            self.model
        )
    }
}

/// Policy engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySection {
    /// Path to the YAML rule document. Absent means the built-in
    /// safety policy.
    #[serde(default)]
    pub document: Option<PathBuf>,

    /// Bound on one policy evaluation, in seconds.
    #[serde(default = "default_policy_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_policy_timeout_secs() -> u64 {
    5
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            document: None,
            timeout_secs: default_policy_timeout_secs(),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    /// Host to bind to.
    #[serde(default = "default_api_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl ApiSection {
    /// The configured bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid API bind address {}:{}", self.host, self.port))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
