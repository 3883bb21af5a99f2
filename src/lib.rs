pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::{
    cache::{CacheBackend, InMemoryCache, JsonFileCache},
    http::HttpProfileLookup,
};
pub use config::{toml_config::DiscoveryConfig, RunnerConfig};
pub use crate::core::{orchestrator::BatchOrchestrator, runner::BoundedBatchRunner};
pub use domain::progress::{ChannelObserver, LoggingObserver, NoopObserver};
pub use utils::error::{DiscoveryError, Result};
