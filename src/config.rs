use crate::constants::{DEFAULT_CONCURRENCY_LEVELS, DEFAULT_LEVEL_DURATION_SECS};
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// What a worker failure does to the level it happens in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// First failing `run_once` stops every worker and discards the level
    #[default]
    AbortLevel,
    /// A failing worker logs the error and stops; the others keep running
    LogAndContinue,
}

/// Configuration for a scaling run
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Worker counts, executed in this order
    pub levels: Vec<usize>,
    /// Measured window of every level
    pub duration: Duration,
    pub failure_policy: FailurePolicy,
    /// Free-form label stamped into every result record
    pub label: Option<String>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_CONCURRENCY_LEVELS.to_vec(),
            duration: Duration::from_secs(DEFAULT_LEVEL_DURATION_SECS),
            failure_policy: FailurePolicy::default(),
            label: None,
        }
    }
}

impl BenchConfig {
    pub fn new(levels: Vec<usize>, duration: Duration) -> Self {
        Self {
            levels,
            duration,
            ..Self::default()
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Largest worker count of the run, i.e. how many connections must be provisioned
    pub fn max_workers(&self) -> usize {
        self.levels.iter().copied().max().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.levels.is_empty() {
            return Err(BenchError::Config(
                "at least one concurrency level is required".to_string(),
            ));
        }

        if self.levels.contains(&0) {
            return Err(BenchError::Config(
                "concurrency levels must be positive".to_string(),
            ));
        }

        // Levels label the result map, so they must be unique
        let mut seen = HashSet::new();
        if let Some(dup) = self.levels.iter().find(|level| !seen.insert(**level)) {
            return Err(BenchError::Config(format!(
                "concurrency level {} is listed more than once",
                dup
            )));
        }

        if self.duration.is_zero() {
            return Err(BenchError::Config(
                "level duration must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BenchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.levels.first(), Some(&1));
        assert_eq!(config.max_workers(), 500);
        assert_eq!(config.failure_policy, FailurePolicy::AbortLevel);
    }

    #[test]
    fn test_rejects_empty_levels() {
        let config = BenchConfig::new(vec![], Duration::from_secs(1));
        assert!(matches!(config.validate(), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_level() {
        let config = BenchConfig::new(vec![1, 0, 4], Duration::from_secs(1));
        assert!(matches!(config.validate(), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_rejects_duplicate_levels() {
        let config = BenchConfig::new(vec![1, 4, 1], Duration::from_secs(1));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("level 1"));
    }

    #[test]
    fn test_rejects_zero_duration() {
        let config = BenchConfig::new(vec![1], Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_workers_ignores_order() {
        let config = BenchConfig::new(vec![10, 250, 50], Duration::from_secs(1));
        assert_eq!(config.max_workers(), 250);
    }
}
