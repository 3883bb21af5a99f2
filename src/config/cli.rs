use crate::config::toml_config::DiscoveryConfig;
use crate::utils::error::{DiscoveryError, Result};
use crate::utils::input::{read_identifiers_csv, split_identifier_list};
use crate::utils::validation::{validate_path, Validate};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "discovery-engine")]
#[command(about = "Resolve organization profiles in bounded, cache-aware batches")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "discovery.toml")]
    pub config: String,

    /// Comma separated identifiers to resolve
    #[arg(long)]
    pub identifiers: Vec<String>,

    /// CSV file with one identifier per row
    #[arg(long)]
    pub input: Option<String>,

    /// CSV column holding the identifiers (defaults to the first column)
    #[arg(long)]
    pub column: Option<String>,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    #[arg(long)]
    pub concurrency: Option<usize>,

    #[arg(long)]
    pub delay_ms: Option<u64>,

    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Skip the profile cache for this run
    #[arg(long)]
    pub no_cache: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    /// Show what would be processed without executing
    #[arg(long)]
    pub dry_run: bool,
}

impl CliConfig {
    /// 命令列參數覆蓋設定檔
    pub fn apply_overrides(&self, config: &mut DiscoveryConfig) {
        if let Some(concurrency) = self.concurrency {
            config.runner.concurrency = Some(concurrency);
            tracing::info!("🔧 Concurrency overridden to: {}", concurrency);
        }
        if let Some(delay) = self.delay_ms {
            config.runner.inter_start_delay_ms = Some(delay);
            tracing::info!("🔧 Inter-start delay overridden to: {}ms", delay);
        }
        if let Some(timeout) = self.timeout_ms {
            config.runner.per_item_timeout_ms = Some(timeout);
            tracing::info!("🔧 Per-item timeout overridden to: {}ms", timeout);
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
    }

    /// `--identifiers` first, then the CSV rows, in order.
    pub fn collect_identifiers(&self) -> Result<Vec<String>> {
        let mut identifiers = split_identifier_list(&self.identifiers);
        if let Some(input) = &self.input {
            identifiers.extend(read_identifiers_csv(input, self.column.as_deref())?);
        }
        Ok(identifiers)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("config", &self.config)?;

        if self.identifiers.is_empty() && self.input.is_none() {
            return Err(DiscoveryError::MissingConfigError {
                field: "--identifiers or --input".to_string(),
            });
        }

        if let Some(input) = &self.input {
            validate_path("input", input)?;
        }
        if let Some(output) = &self.output {
            validate_path("output", output)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_identifier_source() {
        let cli = CliConfig::parse_from(["discovery-engine"]);
        assert!(matches!(
            cli.validate(),
            Err(DiscoveryError::MissingConfigError { .. })
        ));

        let cli = CliConfig::parse_from(["discovery-engine", "--identifiers", "ACLU,Sierra Club"]);
        tokio_test::assert_ok!(cli.validate());
        assert_eq!(cli.collect_identifiers().unwrap(), vec!["ACLU", "Sierra Club"]);
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = DiscoveryConfig::from_toml_str(
            r#"
[source]
endpoint = "https://research.example.com"
"#,
        )
        .unwrap();

        let cli = CliConfig::parse_from([
            "discovery-engine",
            "--identifiers",
            "ACLU",
            "--concurrency",
            "8",
            "--delay-ms",
            "0",
            "--no-cache",
        ]);
        cli.apply_overrides(&mut config);

        let runner = config.runner_config();
        assert_eq!(runner.concurrency, 8);
        assert!(runner.inter_start_delay.is_zero());
        assert!(!config.cache.enabled);
    }
}
