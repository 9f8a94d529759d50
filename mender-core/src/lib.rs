//! Self-healing element location.
//!
//! A [`HealingOrchestrator`] resolves a selector in three stages: the selector
//! as written, a trust-scored cache of earlier repairs, and finally an AI
//! service asked to recommend a replacement from the page's DOM or a
//! screenshot. Browser automation and AI access are supplied through the
//! [`AutomationAdapter`] and [`AiService`] traits.

pub mod adapter;
pub mod ai;
pub mod cache;
pub mod locator;
pub mod orchestrator;
pub mod recorder;
mod strategy;
pub mod translator;

pub use adapter::{AutomationAdapter, ElementContext, FindOptions, Position};
pub use ai::{AiAnalysis, AiService, Selection};
pub use cache::{
    cache_key, open_cache_store, CacheMetrics, CacheStore, CachedSelector, FileCacheStore,
    MemoryCacheStore, TRUST_THRESHOLD,
};
pub use locator::{LocatorRequest, LocatorResult, ResolutionReport, ResolutionStrategy};
pub use orchestrator::{HealingOrchestrator, OrchestratorBuilder};
pub use recorder::{MemoryRecorder, TracingRecorder, UsageEvent, UsageRecorder, UsageSummary};
pub use translator::{is_native, to_engine_format, to_native_format, Accessor};
