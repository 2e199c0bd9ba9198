//! Runtime configuration.
//!
//! Consolidates session-lifecycle deadlines and storage-retention limits
//! into typed structs with clamped validation. Both are plain values handed
//! to the components that need them; there is no ambient global state, so
//! multiple configurations (e.g. in tests) can coexist.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Deadlines and grace periods for the session lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// How long `start` waits for the capture collaborator to acknowledge
    /// initialization before failing with a timeout.
    pub start_ack_timeout_ms: u64,

    /// How long `stop` waits for trailing chunks after asking the capture
    /// collaborator to finalize.
    pub stop_grace_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_ack_timeout_ms: 15_000,
            stop_grace_ms: 2_000,
        }
    }
}

impl SessionConfig {
    /// Validate and clamp settings to acceptable ranges.
    pub fn validate(&mut self) {
        self.start_ack_timeout_ms = self.start_ack_timeout_ms.clamp(1_000, 60_000);
        self.stop_grace_ms = self.stop_grace_ms.clamp(100, 30_000);
    }

    pub fn start_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.start_ack_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

/// Storage-retention limits driving quota-aware eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfig {
    /// Fraction of store capacity at which eviction starts reclaiming space.
    pub quota_threshold: f64,

    /// Projects whose `updated_at` is older than this many days become
    /// eviction candidates once the threshold is crossed.
    pub max_project_age_days: u32,

    /// Hard ceiling on the number of persisted projects.
    pub max_projects: usize,

    /// Entries kept in the most-recent-first project index. The one
    /// authoritative retention count for summaries.
    pub recent_projects_cap: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            quota_threshold: 0.80,
            max_project_age_days: 30,
            max_projects: 50,
            recent_projects_cap: 20,
        }
    }
}

impl RetentionConfig {
    /// Validate and clamp settings to acceptable ranges.
    pub fn validate(&mut self) {
        if !self.quota_threshold.is_finite() {
            self.quota_threshold = 0.80;
        }
        self.quota_threshold = self.quota_threshold.clamp(0.05, 1.0);
        self.max_project_age_days = self.max_project_age_days.clamp(1, 365);
        self.max_projects = self.max_projects.clamp(1, 10_000);
        self.recent_projects_cap = self.recent_projects_cap.clamp(1, 100);
    }

    pub fn max_project_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.max_project_age_days as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_config() {
        let config = SessionConfig::default();
        assert_eq!(config.start_ack_timeout_ms, 15_000);
        assert_eq!(config.stop_grace_ms, 2_000);
    }

    #[test]
    fn test_session_config_validation() {
        let mut config = SessionConfig {
            start_ack_timeout_ms: 500_000, // Over max
            stop_grace_ms: 0,              // Under min
        };
        config.validate();

        assert_eq!(config.start_ack_timeout_ms, 60_000);
        assert_eq!(config.stop_grace_ms, 100);
    }

    #[test]
    fn test_default_retention_config() {
        let config = RetentionConfig::default();
        assert!((config.quota_threshold - 0.80).abs() < f64::EPSILON);
        assert_eq!(config.recent_projects_cap, 20);
    }

    #[test]
    fn test_retention_config_validation() {
        let mut config = RetentionConfig {
            quota_threshold: 7.5,
            max_project_age_days: 0,
            max_projects: 0,
            recent_projects_cap: 500,
        };
        config.validate();

        assert!((config.quota_threshold - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.max_project_age_days, 1);
        assert_eq!(config.max_projects, 1);
        assert_eq!(config.recent_projects_cap, 100);
    }

    #[test]
    fn test_retention_config_nan_threshold() {
        let mut config = RetentionConfig {
            quota_threshold: f64::NAN,
            ..Default::default()
        };
        config.validate();
        assert!((config.quota_threshold - 0.80).abs() < f64::EPSILON);
    }
}
