use crate::config::RunnerConfig;
use crate::utils::error::{DiscoveryError, Result};
use crate::utils::validation::{
    validate_one_of, validate_path, validate_positive_number, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub runner: RunnerSection,
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerSection {
    pub concurrency: Option<usize>,
    pub inter_start_delay_ms: Option<u64>,
    pub per_item_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub endpoint: String,
    pub method: Option<String>,
    pub identifier_param: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub cost_field: Option<String>,
    pub profile_field: Option<String>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    pub path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            path: None,
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl DiscoveryConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DiscoveryError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DiscoveryError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DISCOVERY_API_KEY})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| DiscoveryError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_url("source.endpoint", &self.source.endpoint)?;

        if let Some(method) = &self.source.method {
            validate_one_of("source.method", method, &["GET", "POST"])?;
        }

        if let Some(timeout) = self.source.timeout_seconds {
            validate_positive_number("source.timeout_seconds", timeout as usize, 1)?;
        }

        if self.cache.enabled {
            if let Some(path) = &self.cache.path {
                validate_path("cache.path", path)?;
            }
        }

        if let Some(level) = self.logging.as_ref().and_then(|l| l.level.as_deref()) {
            validate_one_of(
                "logging.level",
                level,
                &["trace", "debug", "info", "warn", "error"],
            )?;
        }

        self.runner_config().validate()
    }

    /// 未設定的欄位沿用 `RunnerConfig::default()`
    pub fn runner_config(&self) -> RunnerConfig {
        let defaults = RunnerConfig::default();
        RunnerConfig {
            concurrency: self.runner.concurrency.unwrap_or(defaults.concurrency),
            inter_start_delay: self
                .runner
                .inter_start_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.inter_start_delay),
            per_item_timeout: self
                .runner
                .per_item_timeout_ms
                .map(Duration::from_millis)
                .or(defaults.per_item_timeout),
        }
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn json_logs(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.json)
            .unwrap_or(false)
    }
}

impl Validate for DiscoveryConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
