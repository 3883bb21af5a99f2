use anyhow::Context;
use clap::Parser;
use discovery_engine::utils::error::ErrorSeverity;
use discovery_engine::utils::{logger, validation::Validate};
use discovery_engine::{
    BatchOrchestrator, CacheBackend, CliConfig, DiscoveryConfig, DiscoveryError,
    HttpProfileLookup, LoggingObserver,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 設定檔載入失敗時仍需要日誌，先讀檔再初始化
    let loaded = DiscoveryConfig::from_file(&cli.config);
    let (level, json) = match &loaded {
        Ok(config) => (config.log_level().map(str::to_string), config.json_logs()),
        Err(_) => (None, false),
    };
    if cli.json_logs || json {
        logger::init_json_logger(cli.verbose, level.as_deref());
    } else {
        logger::init_cli_logger(cli.verbose, level.as_deref());
    }

    tracing::info!("🚀 Starting discovery-engine");
    tracing::info!("📁 Loading configuration from: {}", cli.config);

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    cli.apply_overrides(&mut config);

    if let Err(e) = cli.validate().and_then(|_| config.validate()) {
        fail(&e);
    }

    let identifiers = match cli.collect_identifiers() {
        Ok(identifiers) => identifiers,
        Err(e) => fail(&e),
    };

    display_config_summary(&config, identifiers.len());

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No lookups will be performed");
        for identifier in &identifiers {
            println!("{}", identifier);
        }
        return Ok(());
    }

    let cache = match CacheBackend::from_config(&config.cache) {
        Ok(cache) => cache,
        Err(e) => {
            tracing::warn!("⚠️ Cache unavailable, continuing without it: {}", e);
            CacheBackend::Disabled
        }
    };
    tracing::info!("💾 Profile cache: {}", cache.describe());

    let lookup = HttpProfileLookup::from_config(&config.source)
        .context("failed to build HTTP client")?;

    let orchestrator = BatchOrchestrator::new(cache, Arc::new(lookup), config.runner_config());

    let result = match orchestrator.resolve_batch(&identifiers, &LoggingObserver).await {
        Ok(result) => result,
        Err(e) => fail(&e),
    };

    let report = serde_json::to_string_pretty(&result).context("failed to serialize report")?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, &report).with_context(|| format!("failed to write {}", path))?;
            tracing::info!("📁 Report saved to: {}", path);
        }
        None => println!("{}", report),
    }

    for failure in &result.failures {
        tracing::warn!("❌ {}: {}", failure.identifier, failure.error);
    }

    Ok(())
}

fn display_config_summary(config: &DiscoveryConfig, identifier_count: usize) {
    let runner = config.runner_config();
    tracing::info!("📋 Configuration Summary:");
    tracing::info!("   Endpoint: {}", config.source.endpoint);
    tracing::info!("   Identifiers: {}", identifier_count);
    tracing::info!("   Concurrency: {}", runner.concurrency);
    tracing::info!("   Inter-start delay: {:?}", runner.inter_start_delay);
    if let Some(timeout) = runner.per_item_timeout {
        tracing::info!("   Per-item timeout: {:?}", timeout);
    }
}

fn fail(e: &DiscoveryError) -> ! {
    tracing::error!(
        "❌ Discovery failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
