//! Usage events: one per top-level resolution, success or failure.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::locator::ResolutionStrategy;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    /// Selector as the caller wrote it, in native display form.
    pub original_selector: String,
    pub description: String,
    /// Stage that produced the element, or the last one tried on failure.
    pub strategy: ResolutionStrategy,
    pub duration_ms: u64,
    pub success: bool,
    pub resolved_selector: Option<String>,
    pub element_description: Option<String>,
    pub reasoning: Option<String>,
    pub tokens_used: u32,
    pub timestamp: DateTime<Utc>,
}

/// Sink for usage events.
pub trait UsageRecorder: Send + Sync {
    fn record(&self, event: UsageEvent);
}

/// Default recorder: every event becomes an `info!` on `mender.usage`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl UsageRecorder for TracingRecorder {
    fn record(&self, event: UsageEvent) {
        tracing::info!(
            target: "mender.usage",
            original = %event.original_selector,
            description = %event.description,
            strategy = ?event.strategy,
            duration_ms = event.duration_ms,
            success = event.success,
            resolved = event.resolved_selector.as_deref().unwrap_or("-"),
            element = event.element_description.as_deref().unwrap_or("-"),
            tokens_used = event.tokens_used,
            "locator.resolved"
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub by_strategy: BTreeMap<String, usize>,
    pub tokens_used: u64,
    pub average_duration_ms: f64,
}

/// Keeps events in memory for end-of-run summaries.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<UsageEvent>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UsageEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn summary(&self) -> UsageSummary {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let mut summary = UsageSummary {
            total: events.len(),
            ..Default::default()
        };
        let mut total_ms = 0u64;
        for event in events.iter() {
            if event.success {
                summary.succeeded += 1;
                *summary
                    .by_strategy
                    .entry(event.strategy.as_str().to_string())
                    .or_default() += 1;
            } else {
                summary.failed += 1;
            }
            summary.tokens_used += u64::from(event.tokens_used);
            total_ms += event.duration_ms;
        }
        if !events.is_empty() {
            summary.average_duration_ms = total_ms as f64 / events.len() as f64;
        }
        summary
    }
}

impl UsageRecorder for MemoryRecorder {
    fn record(&self, event: UsageEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(strategy: ResolutionStrategy, success: bool, tokens: u32, ms: u64) -> UsageEvent {
        UsageEvent {
            original_selector: "#a".into(),
            description: "thing".into(),
            strategy,
            duration_ms: ms,
            success,
            resolved_selector: None,
            element_description: None,
            reasoning: None,
            tokens_used: tokens,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn summary_counts_by_successful_strategy() {
        let recorder = MemoryRecorder::new();
        recorder.record(event(ResolutionStrategy::OriginalSelector, true, 0, 10));
        recorder.record(event(ResolutionStrategy::DomAnalysis, true, 120, 30));
        recorder.record(event(ResolutionStrategy::DomAnalysis, false, 80, 20));

        let summary = recorder.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.by_strategy.get("DOM_ANALYSIS"), Some(&1));
        assert_eq!(summary.tokens_used, 200);
        assert_eq!(summary.average_duration_ms, 20.0);
    }
}
