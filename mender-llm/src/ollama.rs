use crate::http_to_mender;
use crate::traits::{LlmClient, LlmResponse};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use mender_common::{MenderError, Result};
use mender_http::{Auth, HttpClient};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";

/// Ollama client for local model inference.
///
/// Expects a running Ollama server (see https://github.com/ollama/ollama).
pub struct OllamaClient {
    client: HttpClient,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl OllamaClient {
    /// Create a new client and verify server/model availability.
    pub async fn new(base_url: &str, model: String) -> Result<Self> {
        let ollama_client = Self::unchecked(base_url, model)?;

        // Verify server is reachable
        ollama_client.probe_server().await?;

        // Ensure model is available
        ollama_client.ensure_model_available().await?;

        Ok(ollama_client)
    }

    /// Build without talking to the server.
    pub fn unchecked(base_url: &str, model: String) -> Result<Self> {
        let client = HttpClient::new(base_url)
            .map_err(|e| MenderError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, model })
    }

    pub fn with_transport(mut self, timeout: Duration, max_retries: usize) -> Self {
        self.client = self.client.with_timeout(timeout).with_retries(max_retries);
        self
    }

    async fn probe_server(&self) -> Result<()> {
        self.client
            .get_json::<JsonValue>("api/tags", Auth::None)
            .await
            .map(|_| ())
            .map_err(|_| MenderError::Ai(OLLAMA_CONNECTION_ERROR.to_string()))
    }

    async fn ensure_model_available(&self) -> Result<()> {
        let models = self.fetch_available_models().await?;

        if !models.contains(&self.model) {
            tracing::info!(model = %self.model, "llm.ollama.pulling_model");
            self.pull_model(&self.model).await?;
        }

        Ok(())
    }

    async fn fetch_available_models(&self) -> Result<Vec<String>> {
        let val: JsonValue = self
            .client
            .get_json("api/tags", Auth::None)
            .await
            .map_err(|e| MenderError::Ai(format!("Failed to fetch models: {e}")))?;

        let models = val
            .get("models")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.get("name").and_then(|n| n.as_str()))
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }

    async fn pull_model(&self, model: &str) -> Result<()> {
        let payload = json!({
            "model": model,
            "stream": false
        });

        self.client
            .post_json::<_, JsonValue>("api/pull", &payload, Auth::None)
            .await
            .map_err(|e| MenderError::Ai(format!("Failed to pull model: {e}")))?;
        tracing::info!(%model, "llm.ollama.pulled_model");
        Ok(())
    }

    async fn run(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        images: Option<Vec<String>>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let mut options = serde_json::Map::new();
        if let Some(temp) = temperature {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tok) = max_tokens {
            options.insert("num_predict".to_string(), json!(max_tok));
        }

        let mut payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": options
        });
        if let Some(system) = system_prompt {
            payload["system"] = json!(system);
        }
        if let Some(images) = images {
            payload["images"] = json!(images);
        }

        let resp: GenerateResponse = self
            .client
            .post_json("api/generate", &payload, Auth::None)
            .await
            .map_err(http_to_mender)?;

        let tokens_used = match (resp.prompt_eval_count, resp.eval_count) {
            (None, None) => None,
            (p, e) => Some(p.unwrap_or(0) + e.unwrap_or(0)),
        };

        Ok(LlmResponse {
            text: resp.response,
            model: Some(self.model.clone()),
            tokens_used,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        self.run(prompt, system_prompt, None, max_tokens, temperature)
            .await
    }

    async fn generate_with_image(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        image_png: &[u8],
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let images = vec![STANDARD.encode(image_png)];
        self.run(prompt, system_prompt, Some(images), max_tokens, temperature)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.probe_server().await.map(|_| true).or(Ok(false))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
