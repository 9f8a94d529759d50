//! Common types and utilities shared across Mender crates.
//!
//! This crate defines configuration, observability helpers, and the shared
//! error type used throughout the Mender workspace. It stays dependency‑light
//! so that every crate can depend on it.
//!
//! # Overview
//!
//! - [`MenderConfig`]: Top‑level runtime configuration
//! - [`AiConfig`]: Provider‑agnostic AI backend configuration
//! - [`CacheConfig`]: Which cache backend to build and how to bound it
//! - [`ExecutionStrategy`]: Ordering of AI healing sub‑attempts
//! - [`LocatorOptions`]: Per‑request knobs for a resolution
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`MenderError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use mender_common::{ExecutionStrategy, MenderConfig};
//!
//! let cfg = MenderConfig::default();
//! assert_eq!(cfg.strategy, ExecutionStrategy::SmartSequential);
//! assert_eq!(cfg.cache.capacity, 1000);
//! assert!(cfg.locator.enable_caching);
//! ```
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod observability;

/// AI backend used for DOM and screenshot analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[serde(alias = "open_ai")]
    OpenAi,
    Ollama,
    Gemini,
    None,
}

/// Configuration for the AI provider used by the healer.
///
/// See the `mender-llm` crate for concrete client implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: AiProvider,
    /// Empty picks the provider's default model.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Override for the provider base URL (gateways, self-hosted servers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    /// Retry budget for rate-limited or 5xx responses; handled by the transport.
    pub max_retries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::OpenAi,
            model: String::new(),
            api_key: None,
            endpoint: None,
            timeout_secs: 30,
            max_retries: 2,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which cache backend backs healed selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Bounded, process-local, least-recently-used.
    Memory,
    /// JSON document on disk, rewritten on every mutation.
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub capacity: usize,
    pub ttl_secs: u64,
    /// Directory holding the file backend's document.
    pub directory: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            capacity: 1000,
            ttl_secs: 24 * 60 * 60,
            directory: default_cache_dir(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("mender"))
        .unwrap_or_else(|| PathBuf::from(".mender-cache"))
}

/// Ordering and fallback policy among AI healing sub-attempts.
///
/// Chosen once per orchestrator, never per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// One DOM analysis, returned whether or not it resolves.
    DomOnly,
    /// Visual analysis, DOM analysis if the visual selector does not resolve.
    VisualFirst,
    /// DOM analysis, visual analysis if the DOM selector does not resolve.
    SmartSequential,
    /// Same behavior as [`ExecutionStrategy::SmartSequential`].
    Sequential,
    /// Visual analysis only. Nothing runs concurrently.
    Parallel,
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        Self::SmartSequential
    }
}

/// Per-request knobs for a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorOptions {
    /// Consult and update the selector cache.
    pub enable_caching: bool,
    /// Budget the adapter may spend waiting for a selector to match.
    pub timeout_ms: u64,
    /// How many times the adapter polls within `timeout_ms`.
    pub retry_attempts: u32,
    /// Fail instead of disambiguating when several elements match.
    pub strict_mode: bool,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            enable_caching: true,
            timeout_ms: 5000,
            retry_attempts: 3,
            strict_mode: false,
        }
    }
}

/// Logging knobs read from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
    pub stderr: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            stderr: true,
            dir: None,
        }
    }
}

/// Configuration for a Mender process.
///
/// Every field has a default so partial config files stay valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MenderConfig {
    pub ai: AiConfig,
    pub cache: CacheConfig,
    pub strategy: ExecutionStrategy,
    /// Default options applied by `locate`.
    pub locator: LocatorOptions,
    pub webdriver: WebDriverConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    pub url: String,
    pub headless: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9515".to_string(),
            headless: true,
        }
    }
}

/// Error types used across the Mender system.
#[derive(thiserror::Error, Debug)]
pub enum MenderError {
    /// Every healing stage ran and nothing on the page matched.
    #[error("Element not found after healing: {description}")]
    NotFound { description: String },

    /// Strict mode refused to pick among several matches.
    #[error("Selector {selector} matched {count} elements in strict mode")]
    Ambiguous { selector: String, count: usize },

    /// The AI backend failed or replied with something unusable.
    #[error("AI error: {0}")]
    Ai(String),

    /// A driver (browser, network, etc.) reported an error.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),

    /// The selector cache could not be read or written.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation exceeded the configured timeout.
    #[error("Timeout occurred")]
    Timeout,
}

/// Convenient alias for results that use [`MenderError`].
pub type Result<T> = std::result::Result<T, MenderError>;
