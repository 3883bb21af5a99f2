use async_trait::async_trait;
use discovery_engine::core::{BatchProgress, ItemStatus, LookupResult, Profile, ProfileCache, ProfileLookup};
use discovery_engine::{
    BatchOrchestrator, ChannelObserver, DiscoveryError, InMemoryCache, NoopObserver, Result,
    RunnerConfig,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct StubLookup {
    calls: Mutex<Vec<String>>,
    failing: Vec<String>,
    delays: HashMap<String, u64>,
    cost: u64,
}

impl StubLookup {
    fn with_cost(cost: u64) -> Self {
        Self {
            cost,
            ..Self::default()
        }
    }

    fn failing(mut self, identifier: &str) -> Self {
        self.failing.push(identifier.to_string());
        self
    }

    fn delayed(mut self, identifier: &str, millis: u64) -> Self {
        self.delays.insert(identifier.to_string(), millis);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileLookup for StubLookup {
    async fn lookup(&self, identifier: &str) -> Result<LookupResult> {
        self.calls.lock().unwrap().push(identifier.to_string());

        if let Some(millis) = self.delays.get(identifier) {
            tokio::time::sleep(Duration::from_millis(*millis)).await;
        }

        if self.failing.iter().any(|f| f == identifier) {
            return Err(DiscoveryError::operation(identifier, "organization website not found"));
        }

        Ok(LookupResult::new(
            Profile::from_json(serde_json::json!({ "name": identifier })),
            self.cost,
        ))
    }
}

/// Wraps a cache and counts reads; optionally fails every read or write.
#[derive(Default)]
struct InstrumentedCache {
    inner: InMemoryCache,
    reads: AtomicUsize,
    fail_reads: bool,
    fail_writes: bool,
}

impl ProfileCache for InstrumentedCache {
    async fn get(&self, identifier: &str) -> Result<Option<Profile>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return Err(DiscoveryError::cache("redis connection refused"));
        }
        self.inner.get(identifier).await
    }

    async fn put(&self, identifier: &str, profile: &Profile) -> Result<()> {
        if self.fail_writes {
            return Err(DiscoveryError::cache("read-only replica"));
        }
        self.inner.put(identifier, profile).await
    }
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn fast_config(concurrency: usize) -> RunnerConfig {
    RunnerConfig::default()
        .with_concurrency(concurrency)
        .with_inter_start_delay(Duration::ZERO)
}

fn cached(name: &str) -> (String, Profile) {
    (
        name.to_string(),
        Profile::from_json(serde_json::json!({ "name": name, "source": "cache" })),
    )
}

#[tokio::test(start_paused = true)]
async fn test_four_misses_with_concurrency_two() {
    let lookup = StubLookup::with_cost(1)
        .delayed("A", 50)
        .delayed("B", 50)
        .delayed("C", 50)
        .delayed("D", 50);
    let orchestrator = BatchOrchestrator::new(InMemoryCache::new(), Arc::new(lookup), fast_config(2));

    let peak = AtomicUsize::new(0);
    let observer = |progress: &BatchProgress| {
        peak.fetch_max(progress.processing_count(), Ordering::SeqCst);
    };

    let result = orchestrator
        .resolve_batch(&ids(&["A", "B", "C", "D"]), &observer)
        .await
        .unwrap();

    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(result.successes.len() + result.failures.len(), 4);
    assert_eq!(result.total_cost, 4);
}

#[tokio::test]
async fn test_initial_snapshot_shows_cache_hits_before_dispatch() {
    let cache = InMemoryCache::with_entries([cached("A")]);
    let lookup = Arc::new(StubLookup::with_cost(2));
    let orchestrator = BatchOrchestrator::new(cache, Arc::clone(&lookup), fast_config(4));
    let (observer, mut receiver) = ChannelObserver::channel();

    let result = orchestrator
        .resolve_batch(&ids(&["A", "B"]), &observer)
        .await
        .unwrap();

    let first = receiver.recv().await.unwrap();
    assert_eq!(first.total_count, 2);
    assert_eq!(first.completed_count, 1);
    assert_eq!(first.status_of("A"), Some(ItemStatus::Completed));
    assert_eq!(first.status_of("B"), Some(ItemStatus::Pending));

    let second = receiver.recv().await.unwrap();
    assert_eq!(second.status_of("A"), Some(ItemStatus::Completed));
    assert_eq!(second.status_of("B"), Some(ItemStatus::Processing));

    assert_eq!(lookup.calls(), vec!["B"]);

    assert_eq!(result.successes.len(), 2);
    assert!(result.successes[0].cache_hit);
    assert_eq!(result.successes[0].cost, 0);
    assert_eq!(result.successes[0].profile.get_str("source"), Some("cache"));
    assert!(!result.successes[1].cache_hit);
    assert_eq!(result.total_cost, 2);

    // 新解析的結果已回寫快取
    assert!(orchestrator.cache().contains("B").await);
}

#[tokio::test]
async fn test_failing_item_is_reported_not_raised() {
    let lookup = StubLookup::with_cost(1).failing("X");
    let orchestrator = BatchOrchestrator::new(InMemoryCache::new(), Arc::new(lookup), fast_config(2));

    let result = orchestrator
        .resolve_batch(&ids(&["A", "X", "B", "C"]), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].identifier, "X");
    assert!(result.failures[0].error.contains("organization website not found"));

    let resolved: Vec<_> = result.successes.iter().map(|s| s.identifier.as_str()).collect();
    assert_eq!(resolved, vec!["A", "B", "C"]);
    assert_eq!(result.total_cost, 3);

    // 失敗的項目不寫入快取
    assert!(!orchestrator.cache().contains("X").await);
}

#[tokio::test]
async fn test_zero_concurrency_fails_before_cache_lookup() {
    let orchestrator = BatchOrchestrator::new(
        InstrumentedCache::default(),
        Arc::new(StubLookup::default()),
        RunnerConfig::default().with_concurrency(0),
    );
    let notified = AtomicUsize::new(0);
    let observer = |_: &BatchProgress| {
        notified.fetch_add(1, Ordering::SeqCst);
    };

    let err = orchestrator
        .resolve_batch(&ids(&["A", "B"]), &observer)
        .await
        .unwrap_err();

    assert!(matches!(err, DiscoveryError::InvalidConfigValueError { .. }));
    assert_eq!(orchestrator.cache().reads.load(Ordering::SeqCst), 0);
    assert_eq!(notified.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_and_blank_identifiers_rejected() {
    let orchestrator = BatchOrchestrator::new(
        InMemoryCache::new(),
        Arc::new(StubLookup::default()),
        fast_config(2),
    );

    let err = orchestrator.resolve_batch(&[], &NoopObserver).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::ConfigError { .. }));

    let err = orchestrator
        .resolve_batch(&ids(&["ACLU", " "]), &NoopObserver)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::InvalidConfigValueError { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_all_cache_hits_skip_lookup_and_pacing() {
    let cache = InMemoryCache::with_entries([cached("A"), cached("B"), cached("C")]);
    let lookup = Arc::new(StubLookup::default());
    let config = RunnerConfig::default()
        .with_concurrency(1)
        .with_inter_start_delay(Duration::from_secs(10));
    let orchestrator = BatchOrchestrator::new(cache, Arc::clone(&lookup), config);
    let (observer, mut receiver) = ChannelObserver::channel();

    let result = orchestrator
        .resolve_batch(&ids(&["A", "B", "C"]), &observer)
        .await
        .unwrap();

    assert!(lookup.calls().is_empty());
    assert!(result.total_elapsed < Duration::from_secs(10));
    assert_eq!(result.cache_hits(), 3);

    let only = receiver.recv().await.unwrap();
    assert!(only.is_finished());
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn test_duplicate_identifiers_resolved_independently() {
    let lookup = Arc::new(StubLookup::with_cost(1));
    let orchestrator = BatchOrchestrator::new(InMemoryCache::new(), Arc::clone(&lookup), fast_config(4));

    let result = orchestrator
        .resolve_batch(&ids(&["A", "A"]), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(lookup.calls().len(), 2);
    assert_eq!(result.successes.len(), 2);
    assert_eq!(result.total_cost, 2);
}

#[tokio::test(start_paused = true)]
async fn test_results_keep_input_order_with_mixed_sources() {
    let cache = InMemoryCache::with_entries([cached("hit")]);
    let lookup = StubLookup::with_cost(1)
        .delayed("slow", 500)
        .delayed("fast", 5)
        .failing("broken");
    let orchestrator = BatchOrchestrator::new(cache, Arc::new(lookup), fast_config(4));

    let result = orchestrator
        .resolve_batch(&ids(&["slow", "hit", "broken", "fast"]), &NoopObserver)
        .await
        .unwrap();

    let order: Vec<_> = result.successes.iter().map(|s| s.identifier.as_str()).collect();
    assert_eq!(order, vec!["slow", "hit", "fast"]);
    assert_eq!(result.failures[0].identifier, "broken");
    assert_eq!(result.total_items(), 4);
}

#[tokio::test]
async fn test_cache_faults_never_fail_the_batch() {
    let cache = InstrumentedCache {
        fail_reads: true,
        fail_writes: true,
        ..InstrumentedCache::default()
    };
    let lookup = Arc::new(StubLookup::with_cost(1));
    let orchestrator = BatchOrchestrator::new(cache, Arc::clone(&lookup), fast_config(2));

    let result = orchestrator
        .resolve_batch(&ids(&["A", "B"]), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(lookup.calls().len(), 2);
    assert_eq!(result.successes.len(), 2);
    assert!(!result.has_failures());
}

#[tokio::test]
async fn test_progress_stream_is_complete_and_monotonic() {
    let cache = InMemoryCache::with_entries([cached("B")]);
    let lookup = StubLookup::with_cost(1).failing("C");
    let orchestrator = BatchOrchestrator::new(cache, Arc::new(lookup), fast_config(1));
    let (observer, mut receiver) = ChannelObserver::channel();

    orchestrator
        .resolve_batch(&ids(&["A", "B", "C"]), &observer)
        .await
        .unwrap();
    drop(observer);

    let mut snapshots = Vec::new();
    while let Some(snapshot) = receiver.recv().await {
        snapshots.push(snapshot);
    }

    // initial + (dispatch + completion) for each of the 2 misses
    assert_eq!(snapshots.len(), 5);

    let mut previous = 0;
    for snapshot in &snapshots {
        assert_eq!(snapshot.total_count, 3);
        assert_eq!(snapshot.status_of("B"), Some(ItemStatus::Completed));
        assert!(snapshot.processing_count() <= 1);
        assert!(snapshot.completed_count >= previous);
        previous = snapshot.completed_count;
    }

    let last = snapshots.last().unwrap();
    assert!(last.is_finished());
    assert_eq!(last.status_of("C"), Some(ItemStatus::Failed));
    assert!(last.items[2].error.is_some());
}
