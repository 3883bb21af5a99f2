pub mod orchestrator;
pub mod prefilter;
pub mod runner;

pub use crate::domain::model::{BatchAggregateResult, ItemOutcome, ItemResult, LookupResult, Profile};
pub use crate::domain::ports::{ProfileCache, ProfileLookup, ProgressObserver};
pub use crate::domain::progress::{BatchProgress, ItemProgress, ItemStatus};
pub use crate::utils::error::Result;
