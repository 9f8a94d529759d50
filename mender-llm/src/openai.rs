use crate::http_to_mender;
use crate::traits::{LlmClient, LlmResponse};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use mender_common::{MenderError, Result};
use mender_http::{Auth, HttpClient};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";

const DEFAULT_INSTRUCTIONS: &str = "You are a precise assistant for browser test automation.";

/// Client for the OpenAI Responses API.
pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
pub struct ResponsesApiRequest<'a> {
    model: &'a str,
    input: ResponsesInput<'a>,
    instructions: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ResponsesInput<'a> {
    Text(&'a str),
    Messages(Vec<InputMessage<'a>>),
}

#[derive(Serialize)]
struct InputMessage<'a> {
    role: &'static str,
    content: Vec<InputContent<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputContent<'a> {
    InputText { text: &'a str },
    InputImage { image_url: String },
}

#[derive(Debug, Deserialize)]
pub struct ResponsesApiResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub output: Vec<ResponseMessage>,
    pub usage: Option<ResponseUsage>,
}

/// One element in the `output` array
#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Vec<ResponseContent>,
}

/// One part of the message `content`
#[derive(Debug, Deserialize)]
pub struct ResponseContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ResponseUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    pub total_tokens: Option<u32>,
}

impl OpenAiClient {
    /// Create a new client for the given API key and model.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_base_url(OPENAI_API_BASE, api_key, model)
    }

    /// Point the client at an OpenAI-compatible gateway.
    pub fn with_base_url(base_url: &str, api_key: String, model: String) -> Result<Self> {
        let client = HttpClient::new(base_url)
            .map_err(|e| MenderError::Config(format!("HttpClient init failed: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    pub fn with_transport(mut self, timeout: Duration, max_retries: usize) -> Self {
        self.client = self.client.with_timeout(timeout).with_retries(max_retries);
        self
    }

    async fn send(&self, req: &ResponsesApiRequest<'_>) -> Result<LlmResponse> {
        let resp: ResponsesApiResponse = self
            .client
            .post_json("responses", req, Auth::Bearer(&self.api_key))
            .await
            .map_err(http_to_mender)?;

        let text = resp
            .output
            .iter()
            .flat_map(|msg| &msg.content)
            .find(|c| c.kind == "output_text")
            .map(|c| c.text.clone())
            .unwrap_or_default();
        let tokens_used = resp
            .usage
            .map(|u| u.total_tokens.unwrap_or(u.input_tokens + u.output_tokens));
        tracing::debug!(
            response_id = %resp.id,
            status = %resp.status,
            tokens_used = tokens_used.unwrap_or(0),
            "llm.openai.response"
        );

        Ok(LlmResponse {
            text,
            model: Some(resp.model).filter(|m| !m.is_empty()),
            tokens_used,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let req = ResponsesApiRequest {
            model: &self.model,
            input: ResponsesInput::Text(prompt),
            instructions: system_prompt.unwrap_or(DEFAULT_INSTRUCTIONS),
            max_output_tokens: max_tokens,
            temperature,
        };
        self.send(&req).await
    }

    async fn generate_with_image(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        image_png: &[u8],
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let image_url = format!("data:image/png;base64,{}", STANDARD.encode(image_png));
        let req = ResponsesApiRequest {
            model: &self.model,
            input: ResponsesInput::Messages(vec![InputMessage {
                role: "user",
                content: vec![
                    InputContent::InputText { text: prompt },
                    InputContent::InputImage { image_url },
                ],
            }]),
            instructions: system_prompt.unwrap_or(DEFAULT_INSTRUCTIONS),
            max_output_tokens: max_tokens,
            temperature,
        };
        self.send(&req).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let test_prompt = "Respond with just 'OK'";

        match self.generate(test_prompt, None, Some(16), None).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "llm.openai.health_check_failed");
                Ok(false)
            }
        }
    }
}
