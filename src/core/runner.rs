//! Bounded, paced batch runner.
//!
//! A single scheduler loop owns every piece of bookkeeping (item statuses,
//! the in-flight counter, recorded outcomes). Operations run as spawned tasks
//! and report back through one completion channel, so nothing is shared
//! between tasks except that channel.
//!
//! A new item is dispatched only when both conditions hold: a concurrency
//! slot is free and `inter_start_delay` has passed since the previous
//! dispatch. The delay paces starts, not completions.
//!
//! There is no batch-wide cancellation yet. It would be checked by the loop
//! before each dispatch and forwarded to in-flight tasks.

use crate::config::RunnerConfig;
use crate::domain::model::{ItemOutcome, ItemResult};
use crate::domain::ports::ProgressObserver;
use crate::domain::progress::{notify, BatchProgress, ItemProgress, ItemStatus};
use crate::utils::error::{DiscoveryError, Result};
use crate::utils::validation::Validate;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::Instant;

struct Completion<T> {
    index: usize,
    result: Result<T>,
}

pub struct BoundedBatchRunner {
    config: RunnerConfig,
}

impl BoundedBatchRunner {
    /// Fails with a configuration error before any work is scheduled.
    pub fn new(config: RunnerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs `operation` once per item and returns one result per item, in input order.
    ///
    /// Item failures, timeouts and panics become `ItemOutcome::Failure`; they
    /// never stop the remaining items from being dispatched.
    pub async fn run<T, F, Fut>(
        &self,
        items: &[String],
        operation: F,
        observer: &dyn ProgressObserver,
    ) -> Vec<ItemResult<T>>
    where
        T: Send + 'static,
        F: Fn(String) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if items.is_empty() {
            return Vec::new();
        }

        let total = items.len();
        let delay = self.config.inter_start_delay;
        let (tx, mut rx) = mpsc::unbounded_channel::<Completion<T>>();
        let mut state = SchedulerState::new(items, observer);
        let mut cursor = 0;
        let mut last_dispatch: Option<Instant> = None;

        tracing::debug!(
            "Runner starting: {} items, concurrency {}, delay {:?}",
            total,
            self.config.concurrency,
            delay
        );
        state.emit(None);

        while state.finished < total {
            let slot_free = state.in_flight < self.config.concurrency;

            if cursor < total && slot_free {
                if let Some(ready_at) = last_dispatch.map(|at| at + delay) {
                    if Instant::now() < ready_at {
                        // 等待間隔期間仍要即時記錄已完成的項目
                        let woke = tokio::select! {
                            _ = tokio::time::sleep_until(ready_at) => None,
                            Some(done) = rx.recv(), if state.in_flight > 0 => Some(done),
                        };
                        if let Some(done) = woke {
                            state.complete(done);
                            continue;
                        }
                    }
                }

                let index = cursor;
                cursor += 1;
                let identifier = items[index].clone();

                state.mark_processing(index);
                last_dispatch = Some(Instant::now());

                let task = operation(identifier.clone());
                tokio::spawn(supervise(
                    index,
                    identifier,
                    task,
                    self.config.per_item_timeout,
                    tx.clone(),
                ));
                continue;
            }

            match rx.recv().await {
                Some(done) => state.complete(done),
                // tx 仍由本迴圈持有，不會發生
                None => break,
            }
        }

        state.into_results()
    }
}

/// Runs one operation as its own task so a panic or an abort is observable,
/// then reports the outcome. An elapsed timeout aborts the task.
async fn supervise<T, Fut>(
    index: usize,
    identifier: String,
    task: Fut,
    timeout: Option<Duration>,
    tx: mpsc::UnboundedSender<Completion<T>>,
) where
    T: Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let mut handle = tokio::spawn(task);

    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => flatten(joined, &identifier),
            Err(_) => {
                handle.abort();
                Err(DiscoveryError::TimeoutError {
                    identifier: identifier.clone(),
                    timeout: limit,
                })
            }
        },
        None => flatten(handle.await, &identifier),
    };

    // 接收端只會在 run() 結束後關閉，此時結果已不需要
    let _ = tx.send(Completion { index, result });
}

fn flatten<T>(joined: std::result::Result<Result<T>, JoinError>, identifier: &str) -> Result<T> {
    joined.unwrap_or_else(|e| {
        let reason = if e.is_panic() { "operation panicked" } else { "operation was cancelled" };
        Err(DiscoveryError::operation(identifier, reason))
    })
}

/// Bookkeeping owned by the scheduler loop.
struct SchedulerState<'a, T> {
    table: Vec<ItemProgress>,
    outcomes: Vec<Option<ItemOutcome<T>>>,
    in_flight: usize,
    finished: usize,
    observer: &'a dyn ProgressObserver,
}

impl<'a, T> SchedulerState<'a, T> {
    fn new(items: &[String], observer: &'a dyn ProgressObserver) -> Self {
        Self {
            table: items.iter().map(|id| ItemProgress::pending(id)).collect(),
            outcomes: items.iter().map(|_| None).collect(),
            in_flight: 0,
            finished: 0,
            observer,
        }
    }

    fn mark_processing(&mut self, index: usize) {
        self.table[index].status = ItemStatus::Processing;
        self.in_flight += 1;
        tracing::debug!(
            "▶️ Dispatched '{}' ({} in flight)",
            self.table[index].identifier,
            self.in_flight
        );
        self.emit(Some(index));
    }

    fn complete(&mut self, done: Completion<T>) {
        let Completion { index, result } = done;
        let entry = &mut self.table[index];

        let outcome = match result {
            Ok(value) => {
                entry.status = ItemStatus::Completed;
                tracing::debug!("✅ Resolved '{}'", entry.identifier);
                ItemOutcome::Success(value)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!("❌ '{}' failed: {}", entry.identifier, message);
                entry.status = ItemStatus::Failed;
                entry.error = Some(message.clone());
                ItemOutcome::Failure(message)
            }
        };

        self.outcomes[index] = Some(outcome);
        self.in_flight -= 1;
        self.finished += 1;
        self.emit(Some(index));
    }

    fn emit(&self, current: Option<usize>) {
        let progress = BatchProgress {
            completed_count: self.finished,
            total_count: self.table.len(),
            current_identifier: current.map(|i| self.table[i].identifier.clone()),
            items: self.table.clone(),
        };
        notify(self.observer, &progress);
    }

    fn into_results(self) -> Vec<ItemResult<T>> {
        self.table
            .into_iter()
            .zip(self.outcomes)
            .map(|(entry, outcome)| ItemResult {
                outcome: outcome.unwrap_or_else(|| {
                    ItemOutcome::Failure(format!("no outcome recorded for '{}'", entry.identifier))
                }),
                identifier: entry.identifier,
            })
            .collect()
    }
}
