#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::utils::error::Result;
use crate::utils::validation::{validate_non_zero_duration, validate_positive_number, Validate};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_INTER_START_DELAY: Duration = Duration::from_millis(500);

/// 排程參數：並發上限、兩次派發間的最短間隔、單筆逾時
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub concurrency: usize,
    pub inter_start_delay: Duration,
    pub per_item_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            inter_start_delay: DEFAULT_INTER_START_DELAY,
            per_item_timeout: None,
        }
    }
}

impl RunnerConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_inter_start_delay(mut self, delay: Duration) -> Self {
        self.inter_start_delay = delay;
        self
    }

    pub fn with_per_item_timeout(mut self, timeout: Duration) -> Self {
        self.per_item_timeout = Some(timeout);
        self
    }
}

impl Validate for RunnerConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("runner.concurrency", self.concurrency, 1)?;
        if let Some(timeout) = self.per_item_timeout {
            validate_non_zero_duration("runner.per_item_timeout", timeout)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_runner_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.inter_start_delay, Duration::from_millis(500));
        assert!(config.per_item_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = RunnerConfig::default().with_concurrency(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("runner.concurrency"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = RunnerConfig::default().with_per_item_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_delay_allowed() {
        let config = RunnerConfig::default().with_inter_start_delay(Duration::ZERO);
        assert!(config.validate().is_ok());
    }
}
