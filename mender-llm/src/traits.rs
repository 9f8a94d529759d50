use async_trait::async_trait;
use mender_common::{MenderError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    /// Total tokens the provider billed for the call, when reported.
    pub tokens_used: Option<u32>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response to the given prompt with optional system prompt
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse>;

    /// Same as [`generate`](Self::generate) with a PNG attached.
    async fn generate_with_image(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        image_png: &[u8],
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let _ = (prompt, system_prompt, image_png, max_tokens, temperature);
        Err(MenderError::Ai(format!(
            "model {} does not accept images",
            self.model_name()
        )))
    }

    /// Check if the LLM service is available
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used
    fn model_name(&self) -> &str;
}
