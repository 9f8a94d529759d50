//! Provider-agnostic LLM integration for Mender.
//!
//! This crate exposes a common [`traits::LlmClient`] interface, concrete
//! provider implementations for Ollama, OpenAI, and Gemini, and
//! [`healer::LlmHealer`], which turns any of them into the
//! [`mender_core::AiService`] the healing orchestrator consumes.
//!
//! # Examples
//! ```no_run
//! use mender_common::{AiConfig, AiProvider, Result};
//! use mender_llm::ensure_ai_ready;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let cfg = AiConfig {
//!     provider: AiProvider::Ollama,
//!     ..AiConfig::default()
//! };
//! let ai = ensure_ai_ready(&cfg).await?;
//! # let _ = ai;
//! # Ok(())
//! # }
//! ```
pub mod gemini;
pub mod healer;
pub mod ollama;
pub mod openai;
pub mod traits;

use mender_common::{AiConfig, AiProvider, MenderError};
use mender_core::AiService;
use mender_http::HttpError;
use std::sync::Arc;
use traits::LlmClient;

/// Default model recommendations per provider
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2-vision:11b";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Build the LLM client named in `config`.
pub async fn ensure_llm_ready(
    config: &AiConfig,
) -> mender_common::Result<Arc<dyn LlmClient>> {
    let model = |fallback: &str| {
        if config.model.trim().is_empty() {
            fallback.to_string()
        } else {
            config.model.clone()
        }
    };
    let api_key = || {
        config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                MenderError::Config(format!("{:?} requires ai.api_key", config.provider))
            })
    };

    match config.provider {
        #[cfg(feature = "ollama")]
        AiProvider::Ollama => {
            let base = config
                .endpoint
                .as_deref()
                .unwrap_or(ollama::OLLAMA_DEFAULT_URL);
            let client = ollama::OllamaClient::new(base, model(DEFAULT_OLLAMA_MODEL))
                .await?
                .with_transport(config.timeout(), config.max_retries);
            Ok(Arc::new(client))
        }
        #[cfg(feature = "gemini")]
        AiProvider::Gemini => {
            let base = config.endpoint.as_deref().unwrap_or(gemini::GEMINI_BASE_URL);
            let client = gemini::GeminiClient::with_base_url(
                base,
                &api_key()?,
                model(DEFAULT_GEMINI_MODEL),
            )?
            .with_transport(config.timeout(), config.max_retries);
            Ok(Arc::new(client))
        }
        #[cfg(feature = "openai")]
        AiProvider::OpenAi => {
            let base = config.endpoint.as_deref().unwrap_or(openai::OPENAI_API_BASE);
            let client =
                openai::OpenAiClient::with_base_url(base, api_key()?, model(DEFAULT_OPENAI_MODEL))?
                    .with_transport(config.timeout(), config.max_retries);
            Ok(Arc::new(client))
        }
        AiProvider::None => Err(MenderError::Config("No AI provider configured".to_string())),
        #[allow(unreachable_patterns)]
        _ => Err(MenderError::Config("AI provider not enabled".to_string())),
    }
}

/// Build the [`AiService`] the orchestrator uses from `config`.
pub async fn ensure_ai_ready(config: &AiConfig) -> mender_common::Result<Arc<dyn AiService>> {
    let client = ensure_llm_ready(config).await?;
    tracing::info!(
        provider = ?config.provider,
        model = client.model_name(),
        "llm.ready"
    );
    let healer =
        healer::LlmHealer::new(client).with_sampling(config.max_tokens, config.temperature);
    Ok(Arc::new(healer))
}

pub(crate) fn http_to_mender(e: HttpError) -> MenderError {
    MenderError::Ai(e.to_string())
}
