use mender_common::LocatorOptions;
use serde::{Deserialize, Serialize};

/// Which stage produced the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStrategy {
    OriginalSelector,
    Cached,
    DomAnalysis,
    VisualAnalysis,
}

impl ResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OriginalSelector => "ORIGINAL_SELECTOR",
            Self::Cached => "CACHED",
            Self::DomAnalysis => "DOM_ANALYSIS",
            Self::VisualAnalysis => "VISUAL_ANALYSIS",
        }
    }
}

/// One resolution request. `selector` may be a native expression or a raw
/// selector; it is normalized before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorRequest {
    pub selector: String,
    /// Free text naming the element; part of the cache key and the AI prompt.
    pub description: String,
    pub options: LocatorOptions,
}

impl LocatorRequest {
    pub fn new(selector: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            description: description.into(),
            options: LocatorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LocatorOptions) -> Self {
        self.options = options;
        self
    }
}

/// The element found plus how it was found.
#[derive(Debug, Clone)]
pub struct LocatorResult<E> {
    pub element: E,
    /// Selector (engine form) that produced `element`.
    pub actual_selector: String,
    pub strategy: ResolutionStrategy,
    /// Wall-clock time from the first stage to completion.
    pub execution_time_ms: u64,
    pub from_cache: bool,
    pub confidence: f64,
    pub reasoning: Option<String>,
    /// Tokens spent across every AI call made for this resolution.
    pub tokens_used: u32,
}

/// Everything in a [`LocatorResult`] except the element handle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    pub actual_selector: String,
    pub strategy: ResolutionStrategy,
    pub execution_time_ms: u64,
    pub from_cache: bool,
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub tokens_used: u32,
}

impl<E> LocatorResult<E> {
    pub fn report(&self) -> ResolutionReport {
        ResolutionReport {
            actual_selector: self.actual_selector.clone(),
            strategy: self.strategy,
            execution_time_ms: self.execution_time_ms,
            from_cache: self.from_cache,
            confidence: self.confidence,
            reasoning: self.reasoning.clone(),
            tokens_used: self.tokens_used,
        }
    }
}
