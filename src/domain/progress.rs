//! Progress snapshots and the stock observers.
//!
//! Every emission is a complete, input-ordered snapshot of the batch. Consumers
//! keep the latest one; there are no diffs to apply.

use crate::domain::ports::ProgressObserver;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemProgress {
    pub identifier: String,
    pub status: ItemStatus,
    pub error: Option<String>,
}

impl ItemProgress {
    pub fn pending(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            status: ItemStatus::Pending,
            error: None,
        }
    }

    pub fn completed(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            status: ItemStatus::Completed,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Items in a terminal state (completed or failed).
    pub completed_count: usize,
    pub total_count: usize,
    /// The item whose transition produced this snapshot.
    pub current_identifier: Option<String>,
    pub items: Vec<ItemProgress>,
}

impl BatchProgress {
    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }

    pub fn processing_count(&self) -> usize {
        self.count(ItemStatus::Processing)
    }

    pub fn failed_count(&self) -> usize {
        self.count(ItemStatus::Failed)
    }

    pub fn is_finished(&self) -> bool {
        self.completed_count == self.total_count
    }

    pub fn status_of(&self, identifier: &str) -> Option<ItemStatus> {
        self.items
            .iter()
            .find(|item| item.identifier == identifier)
            .map(|item| item.status)
    }
}

/// 呼叫 observer；observer 的 panic 會被攔截並記錄，不影響批次
pub fn notify(observer: &dyn ProgressObserver, progress: &BatchProgress) {
    if catch_unwind(AssertUnwindSafe(|| observer.on_progress(progress))).is_err() {
        tracing::warn!(
            "⚠️ Progress observer panicked at {}/{}; ignoring",
            progress.completed_count,
            progress.total_count
        );
    }
}

pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _progress: &BatchProgress) {}
}

/// Forwards snapshots into an unbounded channel for message-passing consumers.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<BatchProgress>,
}

impl ChannelObserver {
    pub fn new(sender: mpsc::UnboundedSender<BatchProgress>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BatchProgress>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, progress: &BatchProgress) {
        // 接收端已關閉時直接丟棄
        let _ = self.sender.send(progress.clone());
    }
}

pub struct LoggingObserver;

impl ProgressObserver for LoggingObserver {
    fn on_progress(&self, progress: &BatchProgress) {
        match &progress.current_identifier {
            Some(current) => {
                let status = progress.status_of(current);
                tracing::info!(
                    "📊 [{}/{}] {} -> {:?} (processing: {}, failed: {})",
                    progress.completed_count,
                    progress.total_count,
                    current,
                    status,
                    progress.processing_count(),
                    progress.failed_count()
                );
            }
            None => tracing::info!(
                "📊 [{}/{}] batch queued",
                progress.completed_count,
                progress.total_count
            ),
        }
    }
}
