//! [`AiService`] on top of any [`LlmClient`].
//!
//! Every reply is expected to be one JSON object. Models that wrap it in a
//! ```json fence or add prose around it are tolerated; anything else is a
//! loud [`MenderError::Ai`].
use async_trait::async_trait;
use mender_common::{MenderError, Result};
use mender_core::{AiAnalysis, AiService, ElementContext, Selection};
use regex::Regex;
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};

use crate::traits::LlmClient;

/// Characters of cleaned HTML sent with a DOM analysis prompt.
pub const DEFAULT_HTML_BUDGET: usize = 30_000;

const HEALER_SYSTEM_PROMPT: &str = r#"You are an expert in web UI test automation. You repair broken element selectors.

Guidelines:
- Prefer stable hooks: id, data-testid, name, aria-label, role with accessible name
- Avoid positional selectors (nth-child, absolute XPath) unless nothing else is unique
- The selector must match exactly the element described, and only that element
- Answer with a single JSON object and nothing else"#;

static STRIP_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->|<svg\b.*?</svg\s*>")
        .expect("strip pattern")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fence pattern"));

static JSON_BRACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(\{.*\})").expect("brace pattern"));

#[derive(Debug, Deserialize)]
struct AnalysisWire {
    #[serde(default)]
    selector: String,
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    alternatives: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SelectionWire {
    index: i64,
    #[serde(default)]
    reasoning: String,
}

pub struct LlmHealer {
    client: Arc<dyn LlmClient>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    html_budget: usize,
}

impl LlmHealer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            max_tokens: None,
            temperature: Some(0.1),
            html_budget: DEFAULT_HTML_BUDGET,
        }
    }

    pub fn with_sampling(mut self, max_tokens: Option<u32>, temperature: Option<f32>) -> Self {
        self.max_tokens = max_tokens;
        if temperature.is_some() {
            self.temperature = temperature;
        }
        self
    }

    pub fn with_html_budget(mut self, chars: usize) -> Self {
        self.html_budget = chars;
        self
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    fn analysis_from_reply(&self, text: &str, tokens_used: u32) -> Result<AiAnalysis> {
        let wire: AnalysisWire = parse_reply(text)?;
        let selector = wire.selector.trim().to_string();
        if selector.is_empty() {
            return Err(MenderError::Ai(format!(
                "model {} recommended an empty selector",
                self.client.model_name()
            )));
        }
        Ok(AiAnalysis {
            selector,
            confidence: wire.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
            reasoning: wire.reasoning,
            alternatives: wire
                .alternatives
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            tokens_used,
        })
    }
}

#[async_trait]
impl AiService for LlmHealer {
    async fn analyze_dom(
        &self,
        html: &str,
        description: &str,
        original_selector: &str,
        framework: &str,
    ) -> Result<AiAnalysis> {
        let page = clean_html(html, self.html_budget);
        let prompt = format!(
            "The selector `{original_selector}` no longer matches anything on the page.\n\
             Element wanted: \"{description}\"\n\
             Automation framework: {framework}\n\n\
             PAGE HTML:\n{page}\n\n\
             Reply with JSON: {{\"selector\": \"<css selector>\", \"confidence\": <0.0-1.0>, \
             \"reasoning\": \"<one sentence>\", \"alternatives\": [\"<css selector>\"]}}"
        );
        tracing::debug!(
            model = self.client.model_name(),
            html_chars = page.len(),
            "llm.healer.analyze_dom"
        );

        let response = self
            .client
            .generate(
                &prompt,
                Some(HEALER_SYSTEM_PROMPT),
                self.max_tokens,
                self.temperature,
            )
            .await?;
        self.analysis_from_reply(&response.text, response.tokens_used.unwrap_or(0))
    }

    async fn analyze_visual(&self, screenshot: &[u8], description: &str) -> Result<AiAnalysis> {
        let prompt = format!(
            "The screenshot shows the current page. Find the element described as \
             \"{description}\" and give a CSS selector that would match it, inferred from its \
             visible label, placeholder or role.\n\n\
             Reply with JSON: {{\"selector\": \"<css selector>\", \"confidence\": <0.0-1.0>, \
             \"reasoning\": \"<one sentence>\", \"alternatives\": [\"<css selector>\"]}}"
        );
        tracing::debug!(
            model = self.client.model_name(),
            image_bytes = screenshot.len(),
            "llm.healer.analyze_visual"
        );

        let response = self
            .client
            .generate_with_image(
                &prompt,
                Some(HEALER_SYSTEM_PROMPT),
                screenshot,
                self.max_tokens,
                self.temperature,
            )
            .await?;
        self.analysis_from_reply(&response.text, response.tokens_used.unwrap_or(0))
    }

    async fn select_best_matching_element(
        &self,
        candidates: &[ElementContext],
        description: &str,
    ) -> Result<Selection> {
        let mut listing = String::new();
        for (i, candidate) in candidates.iter().enumerate() {
            let _ = write!(listing, "[{i}] {}", candidate.describe());
            if let Some(parent) = candidate.parent_descriptor.as_deref() {
                let _ = write!(listing, " inside {parent}");
            }
            listing.push('\n');
        }
        let prompt = format!(
            "Several elements match. Which one is \"{description}\"?\n\n\
             {listing}\n\
             Reply with JSON: {{\"index\": <number from the list>, \"reasoning\": \"<one sentence>\"}}"
        );

        let response = self
            .client
            .generate(
                &prompt,
                Some(HEALER_SYSTEM_PROMPT),
                self.max_tokens,
                self.temperature,
            )
            .await?;
        let wire: SelectionWire = parse_reply(&response.text)?;
        let index = usize::try_from(wire.index)
            .ok()
            .filter(|i| *i < candidates.len())
            .unwrap_or_else(|| {
                tracing::warn!(
                    index = wire.index,
                    candidates = candidates.len(),
                    "llm.healer.index_out_of_range"
                );
                0
            });

        Ok(Selection {
            index,
            reasoning: wire.reasoning,
            tokens_used: response.tokens_used.unwrap_or(0),
        })
    }
}

/// Drop scripts, styles, comments and inline SVG, collapse whitespace, and
/// cut to `budget` characters.
pub fn clean_html(html: &str, budget: usize) -> String {
    let stripped = STRIP_BLOCKS.replace_all(html, "");
    let collapsed = WHITESPACE.replace_all(&stripped, " ");
    let trimmed = collapsed.trim();
    if trimmed.chars().count() <= budget {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(budget).collect();
    cut.push_str(" <!-- truncated -->");
    cut
}

/// Locate the JSON object in a model reply: a fenced block first, then the
/// outermost braces.
pub fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(caps) = JSON_FENCE.captures(text) {
        return caps.get(1).map(|m| m.as_str());
    }
    JSON_BRACES
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn parse_reply<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    let text = text.trim();
    let json = extract_json_block(text).unwrap_or(text);
    serde_json::from_str(json).map_err(|e| {
        let snippet: String = text.chars().take(200).collect();
        MenderError::Ai(format!("unparseable model reply: {e}; reply: {snippet}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::LlmResponse;
    use std::sync::Mutex;

    struct CannedClient {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedClient {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn generate(
            &self,
            prompt: &str,
            _system_prompt: Option<&str>,
            _max_tokens: Option<u32>,
            _temperature: Option<f32>,
        ) -> Result<LlmResponse> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(LlmResponse {
                text: self.reply.clone(),
                model: None,
                tokens_used: Some(42),
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    #[test]
    fn clean_html_strips_noise_and_truncates() {
        let html = "<html>\n<script>var x = 1;</script><style>p{}</style><!-- hi -->\n\n<input   id=\"user-name\"></html>";
        assert_eq!(clean_html(html, 1000), r#"<html> <input id="user-name"></html>"#);

        let long = clean_html(&"a".repeat(50), 10);
        assert!(long.starts_with("aaaaaaaaaa <!--"));
    }

    #[test]
    fn json_block_is_found_in_fences_and_prose() {
        let fenced = "Sure!\n```json\n{\"selector\": \"#a\"}\n```";
        assert_eq!(extract_json_block(fenced), Some("{\"selector\": \"#a\"}"));
        let prose = "Here you go: {\"selector\": \"#b\"} hope that helps";
        assert_eq!(extract_json_block(prose), Some("{\"selector\": \"#b\"}"));
        assert_eq!(extract_json_block("no json"), None);
    }

    #[tokio::test]
    async fn dom_reply_becomes_analysis() {
        let client = CannedClient::new(
            r##"```json
{"selector": "#user-name", "confidence": 1.4, "reasoning": "id matches", "alternatives": ["input[name=user]", " "]}
```"##,
        );
        let healer = LlmHealer::new(client.clone());

        let analysis = healer
            .analyze_dom(
                "<input id=\"user-name\">",
                "Username input field",
                "#username-field",
                "webdriver",
            )
            .await
            .unwrap();

        assert_eq!(analysis.selector, "#user-name");
        assert_eq!(analysis.confidence, 1.0);
        assert_eq!(analysis.alternatives, vec!["input[name=user]".to_string()]);
        assert_eq!(analysis.tokens_used, 42);
        let prompt = client.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("#username-field"));
        assert!(prompt.contains("Username input field"));
    }

    #[tokio::test]
    async fn garbage_reply_is_a_loud_failure() {
        let healer = LlmHealer::new(CannedClient::new("I could not find it, sorry."));
        let err = healer
            .analyze_dom("<p></p>", "thing", "#x", "webdriver")
            .await
            .unwrap_err();
        assert!(matches!(err, MenderError::Ai(_)));
    }

    #[tokio::test]
    async fn empty_selector_is_a_loud_failure() {
        let healer = LlmHealer::new(CannedClient::new(r#"{"selector": "  ", "confidence": 0.2}"#));
        assert!(healer
            .analyze_dom("<p></p>", "thing", "#x", "webdriver")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn visual_needs_an_image_capable_client() {
        let healer = LlmHealer::new(CannedClient::new(r##"{"selector": "#a"}"##));
        let err = healer.analyze_visual(b"png", "thing").await.unwrap_err();
        assert!(err.to_string().contains("does not accept images"));
    }

    #[tokio::test]
    async fn selection_index_out_of_range_degrades_to_first() {
        let candidates = vec![ElementContext::default(), ElementContext::default()];

        let healer = LlmHealer::new(CannedClient::new(r#"{"index": 1, "reasoning": "second"}"#));
        let pick = healer
            .select_best_matching_element(&candidates, "Save button")
            .await
            .unwrap();
        assert_eq!(pick.index, 1);

        for reply in [r#"{"index": 7}"#, r#"{"index": -1}"#] {
            let healer = LlmHealer::new(CannedClient::new(reply));
            let pick = healer
                .select_best_matching_element(&candidates, "Save button")
                .await
                .unwrap();
            assert_eq!(pick.index, 0);
        }
    }
}
