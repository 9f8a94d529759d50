use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Success rate a cached selector must exceed to be reused.
pub const TRUST_THRESHOLD: f64 = 0.7;

/// A healed selector together with how well it has worked since.
///
/// Serialized as `{selector, timestamp, successCount, failureCount}` with the
/// timestamp in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSelector {
    pub selector: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub success_count: u64,
    pub failure_count: u64,
}

impl CachedSelector {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            timestamp: Utc::now(),
            success_count: 0,
            failure_count: 0,
        }
    }

    /// `successes / observations`, or 1.0 before anything was observed.
    pub fn current_success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            1.0
        } else {
            self.success_count as f64 / total as f64
        }
    }

    pub fn update_success(&mut self, success: bool) {
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
    }

    pub fn is_trusted(&self) -> bool {
        self.current_success_rate() > TRUST_THRESHOLD
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match TimeDelta::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(self.timestamp) > ttl,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_fully_trusted() {
        let entry = CachedSelector::new("#user-name");
        assert_eq!(entry.current_success_rate(), 1.0);
        assert!(entry.is_trusted());
    }

    #[test]
    fn failures_drag_rate_to_threshold() {
        let mut entry = CachedSelector::new("#a");
        for _ in 0..7 {
            entry.update_success(true);
        }
        for _ in 0..3 {
            entry.update_success(false);
        }
        // exactly 0.7 is not enough
        assert!((entry.current_success_rate() - 0.7).abs() < f64::EPSILON);
        assert!(!entry.is_trusted());
        entry.update_success(true);
        assert!(entry.is_trusted());
    }

    #[test]
    fn expiry_is_relative_to_creation() {
        let mut entry = CachedSelector::new("#a");
        entry.timestamp = Utc::now() - TimeDelta::seconds(120);
        assert!(entry.is_expired(Duration::from_secs(60), Utc::now()));
        assert!(!entry.is_expired(Duration::from_secs(600), Utc::now()));
    }

    #[test]
    fn serializes_with_camel_case_and_millis() {
        let mut entry = CachedSelector::new("#user-name");
        entry.timestamp = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        entry.update_success(true);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["selector"], "#user-name");
        assert_eq!(json["timestamp"], 1_700_000_000_123i64);
        assert_eq!(json["successCount"], 1);
        assert_eq!(json["failureCount"], 0);
    }
}
