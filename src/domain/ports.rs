use crate::domain::model::{LookupResult, Profile};
use crate::domain::progress::BatchProgress;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Key-value profile cache. Errors are never fatal to a batch.
pub trait ProfileCache: Send + Sync {
    fn get(
        &self,
        identifier: &str,
    ) -> impl std::future::Future<Output = Result<Option<Profile>>> + Send;
    fn put(
        &self,
        identifier: &str,
        profile: &Profile,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Remote resolution of a single identifier.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn lookup(&self, identifier: &str) -> Result<LookupResult>;
}

/// Receives a full snapshot after every status transition. Must not block.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &BatchProgress);
}

impl<F> ProgressObserver for F
where
    F: Fn(&BatchProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &BatchProgress) {
        self(progress)
    }
}
