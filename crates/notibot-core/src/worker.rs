//! Background poll worker.
//!
//! Triggers (the daemon's timer, IPC requests) only enqueue; a single worker
//! task runs the cycles, so at most one cycle is in flight. The queue holds
//! one pending request; further requests while one is pending are coalesced.
//! Each finished cycle is published as a [`CycleStatus`] on a watch channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::PollError;
use crate::poller::{CycleReport, Poller};
use crate::settings::format_watermark;

/// What asked for a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerSource {
    Timer,
    Ipc,
}

/// Summary of the most recent cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStatus {
    pub trigger: TriggerSource,
    pub finished_at: DateTime<Utc>,
    pub fetched: usize,
    pub delivered: usize,
    pub failed: usize,
    pub watermark: Option<String>,
    pub error: Option<String>,
}

impl CycleStatus {
    fn from_result(trigger: TriggerSource, result: &Result<CycleReport, PollError>) -> Self {
        let finished_at = Utc::now();
        match result {
            Ok(report) => Self {
                trigger,
                finished_at,
                fetched: report.fetched,
                delivered: report.delivered,
                failed: report.failures.len(),
                watermark: report.watermark.map(format_watermark),
                error: None,
            },
            Err(e) => Self {
                trigger,
                finished_at,
                fetched: 0,
                delivered: 0,
                failed: 0,
                watermark: None,
                error: Some(e.to_string()),
            },
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of asking for a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Enqueued {
    Queued,
    /// A request was already waiting; this one was merged into it
    AlreadyPending,
    /// The worker has shut down
    Stopped,
}

/// Cloneable handle for requesting cycles
#[derive(Debug, Clone)]
pub struct PollQueue {
    tx: mpsc::Sender<TriggerSource>,
}

impl PollQueue {
    /// Ask for a cycle without waiting for it to run
    #[must_use]
    pub fn request(&self, trigger: TriggerSource) -> Enqueued {
        match self.tx.try_send(trigger) {
            Ok(()) => Enqueued::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Enqueued::AlreadyPending,
            Err(mpsc::error::TrySendError::Closed(_)) => Enqueued::Stopped,
        }
    }
}

/// Running worker task
pub struct PollWorker {
    queue: PollQueue,
    status: watch::Receiver<Option<CycleStatus>>,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl PollWorker {
    /// Spawn the worker on the current runtime
    #[must_use]
    pub fn spawn(poller: Arc<Poller>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let (status_tx, status_rx) = watch::channel(None);
        let (stop_tx, stop_rx) = oneshot::channel();

        let handle = tokio::spawn(run(poller, rx, status_tx, stop_rx));

        Self {
            queue: PollQueue { tx },
            status: status_rx,
            stop: stop_tx,
            handle,
        }
    }

    #[must_use]
    pub fn queue(&self) -> PollQueue {
        self.queue.clone()
    }

    /// Subscribe to cycle outcomes
    #[must_use]
    pub fn status(&self) -> watch::Receiver<Option<CycleStatus>> {
        self.status.clone()
    }

    /// Stop after the cycle in progress, if any, and wait for the task to end
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            log::error!("Poll worker ended abnormally: {e}");
        }
    }
}

async fn run(
    poller: Arc<Poller>,
    mut rx: mpsc::Receiver<TriggerSource>,
    status_tx: watch::Sender<Option<CycleStatus>>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    log::debug!("Poll worker started");

    loop {
        let trigger = tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            trigger = rx.recv() => match trigger {
                Some(trigger) => trigger,
                None => break,
            },
        };

        log::debug!("Starting {trigger:?}-triggered poll cycle");
        let result = poller.run_cycle().await;

        match &result {
            Ok(_) => {}
            Err(e @ PollError::NotConfigured { .. }) => {
                log::warn!("Skipping poll: {e}. Run: notibot config set <key> <value>");
            }
            Err(e) if e.is_transient() => {
                log::warn!("Poll cycle failed, retrying on the next trigger: {e}");
            }
            Err(e) => log::error!("Poll cycle failed: {e}"),
        }

        // Only fails when every receiver is gone, which is harmless
        let _ = status_tx.send(Some(CycleStatus::from_result(trigger, &result)));
    }

    log::debug!("Poll worker stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use notibot_storage::Database;

    use super::*;
    use crate::testing::{configured_store, created, FakeNotifier, FakeSource};

    async fn next_status(rx: &mut watch::Receiver<Option<CycleStatus>>) -> CycleStatus {
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("worker published no status")
            .unwrap();
        rx.borrow().clone().unwrap()
    }

    #[tokio::test]
    async fn test_request_runs_cycle_and_publishes_status() {
        let source = Arc::new(FakeSource::with_boards(vec![(
            "b1",
            vec![created("a1", "b1", 1), created("a2", "b1", 2)],
        )]));
        let notifier = Arc::new(FakeNotifier::default());
        let poller = Arc::new(Poller::new(configured_store(), source, notifier.clone()));

        let worker = PollWorker::spawn(poller);
        let mut status = worker.status();
        assert_eq!(worker.queue().request(TriggerSource::Ipc), Enqueued::Queued);

        let outcome = next_status(&mut status).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.trigger, TriggerSource::Ipc);
        assert_eq!(outcome.fetched, 2);
        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.watermark.as_deref(), Some("2024-03-01T10:00:02.000Z"));
        assert_eq!(notifier.messages().len(), 2);

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_second_request_is_coalesced() {
        let poller = Arc::new(Poller::new(
            configured_store(),
            Arc::new(FakeSource::default()),
            Arc::new(FakeNotifier::default()),
        ));
        let worker = PollWorker::spawn(poller);
        let queue = worker.queue();

        // The worker task has not been polled yet on this single-threaded runtime
        assert_eq!(queue.request(TriggerSource::Timer), Enqueued::Queued);
        assert_eq!(queue.request(TriggerSource::Ipc), Enqueued::AlreadyPending);

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_cycle_reports_error() {
        let poller = Arc::new(Poller::new(
            Arc::new(Database::open_in_memory().unwrap()),
            Arc::new(FakeSource::default()),
            Arc::new(FakeNotifier::default()),
        ));
        let worker = PollWorker::spawn(poller);
        let mut status = worker.status();

        let _ = worker.queue().request(TriggerSource::Timer);
        let outcome = next_status(&mut status).await;

        assert!(!outcome.succeeded());
        assert!(outcome
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("not configured")));

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_are_rejected() {
        let poller = Arc::new(Poller::new(
            configured_store(),
            Arc::new(FakeSource::default()),
            Arc::new(FakeNotifier::default()),
        ));
        let worker = PollWorker::spawn(poller);
        let queue = worker.queue();

        worker.shutdown().await;
        assert_eq!(queue.request(TriggerSource::Ipc), Enqueued::Stopped);
    }
}
