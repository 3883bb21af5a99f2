use crate::config::RunnerConfig;
use crate::core::prefilter::{prefilter, Partition};
use crate::core::runner::BoundedBatchRunner;
use crate::domain::model::{
    BatchAggregateResult, BatchFailure, ItemOutcome, LookupResult, Profile, ResolvedProfile,
};
use crate::domain::ports::{ProfileCache, ProfileLookup, ProgressObserver};
use crate::domain::progress::{notify, BatchProgress, ItemProgress};
use crate::utils::error::Result;
use crate::utils::validation::validate_identifiers;
use std::sync::Arc;
use tokio::time::Instant;

/// Public entry point: cache prefilter, bounded lookups for the misses,
/// cache write-back, and an input-ordered aggregate result.
pub struct BatchOrchestrator<C, L: ?Sized> {
    cache: C,
    lookup: Arc<L>,
    config: RunnerConfig,
}

impl<C, L> BatchOrchestrator<C, L>
where
    C: ProfileCache,
    L: ProfileLookup + ?Sized + 'static,
{
    pub fn new(cache: C, lookup: Arc<L>, config: RunnerConfig) -> Self {
        Self {
            cache,
            lookup,
            config,
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// 解析整批識別碼。只有輸入或設定驗證失敗會回傳 `Err`，單筆失敗記錄在結果中。
    pub async fn resolve_batch(
        &self,
        identifiers: &[String],
        observer: &dyn ProgressObserver,
    ) -> Result<BatchAggregateResult> {
        let started = Instant::now();

        validate_identifiers(identifiers)?;
        let runner = BoundedBatchRunner::new(self.config.clone())?;

        tracing::info!("🚀 Resolving batch of {} identifiers", identifiers.len());

        let partition = prefilter(identifiers, &self.cache).await;
        tracing::info!(
            "💾 Cache prefilter: {} hits, {} misses",
            partition.hits.len(),
            partition.misses.len()
        );

        let merged = MergedProgress::new(identifiers, &partition, observer);
        notify(observer, &merged.initial());

        let lookup = Arc::clone(&self.lookup);
        let operation = move |identifier: String| {
            let lookup = Arc::clone(&lookup);
            async move { lookup.lookup(&identifier).await }
        };
        let miss_results = runner
            .run(&partition.miss_identifiers(), operation, &merged)
            .await;

        // 只回寫本次新解析的結果；失敗僅記錄
        for (miss, result) in partition.misses.iter().zip(&miss_results) {
            if let ItemOutcome::Success(found) = &result.outcome {
                if let Err(e) = self.cache.put(&miss.identifier, &found.profile).await {
                    tracing::warn!("⚠️ Failed to cache profile for '{}': {}", miss.identifier, e);
                }
            }
        }

        let mut slots: Vec<Option<Slot>> = identifiers.iter().map(|_| None).collect();
        for hit in partition.hits {
            slots[hit.position] = Some(Slot::Cached(hit.profile));
        }
        for (miss, result) in partition.misses.into_iter().zip(miss_results) {
            slots[miss.position] = Some(Slot::Fresh(result.outcome));
        }

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        let mut total_cost = 0;

        for (identifier, slot) in identifiers.iter().zip(slots) {
            match slot {
                Some(Slot::Cached(profile)) => successes.push(ResolvedProfile {
                    identifier: identifier.clone(),
                    profile,
                    cost: 0,
                    cache_hit: true,
                }),
                Some(Slot::Fresh(ItemOutcome::Success(found))) => {
                    total_cost += found.cost;
                    successes.push(ResolvedProfile {
                        identifier: identifier.clone(),
                        profile: found.profile,
                        cost: found.cost,
                        cache_hit: false,
                    });
                }
                Some(Slot::Fresh(ItemOutcome::Failure(error))) => failures.push(BatchFailure {
                    identifier: identifier.clone(),
                    error,
                }),
                None => failures.push(BatchFailure {
                    identifier: identifier.clone(),
                    error: "item was never scheduled".to_string(),
                }),
            }
        }

        let result = BatchAggregateResult {
            successes,
            failures,
            total_elapsed: started.elapsed(),
            total_cost,
        };

        tracing::info!(
            "✅ Batch complete: {} resolved ({} from cache), {} failed, {} credits, {:?}",
            result.successes.len(),
            result.cache_hits(),
            result.failures.len(),
            result.total_cost,
            result.total_elapsed
        );

        Ok(result)
    }
}

enum Slot {
    Cached(Profile),
    Fresh(ItemOutcome<LookupResult>),
}

/// Lifts runner snapshots (misses only) to whole-batch snapshots. Cache hits
/// stay `Completed` throughout.
struct MergedProgress<'a> {
    template: Vec<ItemProgress>,
    miss_positions: Vec<usize>,
    hit_count: usize,
    inner: &'a dyn ProgressObserver,
}

impl<'a> MergedProgress<'a> {
    fn new(identifiers: &[String], partition: &Partition, inner: &'a dyn ProgressObserver) -> Self {
        let mut template: Vec<ItemProgress> =
            identifiers.iter().map(|id| ItemProgress::pending(id)).collect();
        for hit in &partition.hits {
            template[hit.position] = ItemProgress::completed(&hit.identifier);
        }

        Self {
            template,
            miss_positions: partition.misses.iter().map(|m| m.position).collect(),
            hit_count: partition.hits.len(),
            inner,
        }
    }

    fn initial(&self) -> BatchProgress {
        BatchProgress {
            completed_count: self.hit_count,
            total_count: self.template.len(),
            current_identifier: None,
            items: self.template.clone(),
        }
    }

    fn merge(&self, runner: &BatchProgress) -> BatchProgress {
        let mut items = self.template.clone();
        for (position, item) in self.miss_positions.iter().zip(&runner.items) {
            items[*position] = item.clone();
        }

        BatchProgress {
            completed_count: self.hit_count + runner.completed_count,
            total_count: items.len(),
            current_identifier: runner.current_identifier.clone(),
            items,
        }
    }
}

impl ProgressObserver for MergedProgress<'_> {
    fn on_progress(&self, progress: &BatchProgress) {
        // runner 的初始快照與上面送出的 initial() 相同，不重複通知
        if progress.completed_count == 0 && progress.processing_count() == 0 {
            return;
        }
        self.inner.on_progress(&self.merge(progress));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::prefilter::{CacheHit, CacheMiss};
    use crate::domain::progress::{ItemStatus, NoopObserver};

    fn partition() -> Partition {
        Partition {
            hits: vec![CacheHit {
                position: 1,
                identifier: "B".to_string(),
                profile: Profile::default(),
            }],
            misses: vec![
                CacheMiss {
                    position: 0,
                    identifier: "A".to_string(),
                },
                CacheMiss {
                    position: 2,
                    identifier: "C".to_string(),
                },
            ],
        }
    }

    fn ids() -> Vec<String> {
        vec!["A".to_string(), "B".to_string(), "C".to_string()]
    }

    #[test]
    fn test_initial_snapshot_marks_hits_completed() {
        let ids = ids();
        let merged = MergedProgress::new(&ids, &partition(), &NoopObserver);
        let initial = merged.initial();

        assert_eq!(initial.completed_count, 1);
        assert_eq!(initial.total_count, 3);
        assert_eq!(initial.status_of("A"), Some(ItemStatus::Pending));
        assert_eq!(initial.status_of("B"), Some(ItemStatus::Completed));
    }

    #[test]
    fn test_runner_snapshot_lifted_into_input_order() {
        let ids = ids();
        let merged = MergedProgress::new(&ids, &partition(), &NoopObserver);

        let runner_snapshot = BatchProgress {
            completed_count: 1,
            total_count: 2,
            current_identifier: Some("C".to_string()),
            items: vec![
                ItemProgress {
                    identifier: "A".to_string(),
                    status: ItemStatus::Processing,
                    error: None,
                },
                ItemProgress {
                    identifier: "C".to_string(),
                    status: ItemStatus::Failed,
                    error: Some("no match".to_string()),
                },
            ],
        };

        let lifted = merged.merge(&runner_snapshot);
        let statuses: Vec<_> = lifted.items.iter().map(|i| i.status).collect();
        assert_eq!(
            statuses,
            vec![ItemStatus::Processing, ItemStatus::Completed, ItemStatus::Failed]
        );
        assert_eq!(lifted.completed_count, 2);
        assert_eq!(lifted.total_count, 3);
        assert_eq!(lifted.current_identifier.as_deref(), Some("C"));
    }
}
