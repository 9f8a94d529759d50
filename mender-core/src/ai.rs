//! Capability interface for AI backends.
use async_trait::async_trait;
use mender_common::Result;
use serde::{Deserialize, Serialize};

use crate::adapter::ElementContext;

/// A selector recommendation from DOM or screenshot analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub selector: String,
    /// Model's own confidence, 0.0..=1.0.
    pub confidence: f64,
    pub reasoning: String,
    pub alternatives: Vec<String>,
    pub tokens_used: u32,
}

/// Which candidate the AI picked, by position in the supplied list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub index: usize,
    pub reasoning: String,
    pub tokens_used: u32,
}

/// AI capabilities the orchestrator relies on.
///
/// Implementations fail loudly on transport or parse errors rather than
/// returning an empty analysis. Retrying, if any, is internal to the
/// implementation's transport.
#[async_trait]
pub trait AiService: Send + Sync {
    async fn analyze_dom(
        &self,
        html: &str,
        description: &str,
        original_selector: &str,
        framework: &str,
    ) -> Result<AiAnalysis>;

    async fn analyze_visual(&self, screenshot: &[u8], description: &str) -> Result<AiAnalysis>;

    /// Pick exactly one of `candidates` for `description`.
    async fn select_best_matching_element(
        &self,
        candidates: &[ElementContext],
        description: &str,
    ) -> Result<Selection>;
}
