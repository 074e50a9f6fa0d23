use std::{collections::HashSet, num::NonZeroUsize, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    event::{Event, EventKey},
    storage::EventStorage,
};

use super::{delivery::Notifier, worker::DispatchWorkerPool};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scanning,
    Dispatching,
    CleaningUp,
    Sleeping,
    Stopped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IterationReport {
    pub due: usize,
    pub workers: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Polls the event storage and dispatches everything that became due.
///
/// Iterations never overlap: the removal of one batch finishes before the next
/// scan starts. Events are removed after the dispatch attempt whether or not
/// their delivery succeeded.
pub struct DispatchScheduler {
    storage: Arc<dyn EventStorage>,
    pool: DispatchWorkerPool,
    poll_interval: Duration,
    state: watch::Sender<SchedulerState>,
}

impl DispatchScheduler {
    pub fn new(
        storage: Arc<dyn EventStorage>,
        notifier: Arc<dyn Notifier>,
        max_tasks_per_worker: NonZeroUsize,
        poll_interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);

        Self {
            storage,
            pool: DispatchWorkerPool::new(max_tasks_per_worker, notifier),
            poll_interval,
            state,
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Runs iterations until `cancellation_token` is cancelled.
    ///
    /// Cancellation is checked before every scan and cuts the inter-iteration
    /// sleep short. A dispatch round that already started always completes.
    pub async fn run(&self, cancellation_token: CancellationToken) {
        log::info!(
            "Starting dispatch scheduler. Polling every {:?}",
            self.poll_interval
        );

        loop {
            if cancellation_token.is_cancelled() {
                break;
            }

            self.run_iteration(Utc::now()).await;

            self.set_state(SchedulerState::Sleeping);
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    log::debug!("Cancellation requested while sleeping");
                },
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        self.set_state(SchedulerState::Stopped);
        log::info!("Dispatch scheduler stopped");
    }

    /// Scans, dispatches and cleans up the events due at `now`.
    pub async fn run_iteration(&self, now: DateTime<Utc>) -> IterationReport {
        self.set_state(SchedulerState::Scanning);
        let query_started = std::time::Instant::now();
        let entries = self.storage.due_snapshot(now).await;
        log::debug!(
            "Got due events in {:?}, count: {}",
            query_started.elapsed(),
            entries.len()
        );

        let mut report = IterationReport {
            due: entries.len(),
            ..Default::default()
        };

        if entries.is_empty() {
            return report;
        }

        let keys_to_delete: HashSet<EventKey> = entries.iter().map(Event::key).collect();

        self.set_state(SchedulerState::Dispatching);
        let dispatch = self.pool.dispatch(entries).await;
        report.workers = dispatch.workers;
        report.delivered = dispatch.delivered;
        report.failed = dispatch.failed;

        self.set_state(SchedulerState::CleaningUp);
        self.storage.remove(&keys_to_delete).await;

        log::info!(
            "Dispatched {} events with {} workers. delivered = {}, failed = {}",
            report.due,
            report.workers,
            report.delivered,
            report.failed
        );

        report
    }

    fn set_state(&self, state: SchedulerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            log::trace!("Scheduler state {previous:?} -> {state:?}");
        }
    }
}
