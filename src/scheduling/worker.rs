use std::{num::NonZeroUsize, sync::Arc};

use tokio::{
    sync::{Mutex, mpsc},
    task::JoinSet,
};

use crate::event::Event;

use super::delivery::{Notifier, render_message};

type SharedQueue = Arc<Mutex<mpsc::Receiver<Event>>>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub workers: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
struct WorkerStats {
    delivered: usize,
    failed: usize,
}

/// Fans a batch of due events out over short-lived workers.
///
/// A new set of workers is spawned for every batch and joined before
/// [`DispatchWorkerPool::dispatch`] returns. The number of workers grows with
/// the batch size and has no upper bound.
pub struct DispatchWorkerPool {
    max_tasks_per_worker: NonZeroUsize,
    notifier: Arc<dyn Notifier>,
}

impl DispatchWorkerPool {
    pub fn new(max_tasks_per_worker: NonZeroUsize, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            max_tasks_per_worker,
            notifier,
        }
    }

    pub fn worker_count(&self, due: usize) -> usize {
        due / self.max_tasks_per_worker.get() + 1
    }

    pub async fn dispatch(&self, events: Vec<Event>) -> DispatchReport {
        let workers = self.worker_count(events.len());
        let (tx, rx) = mpsc::channel(workers);
        let queue: SharedQueue = Arc::new(Mutex::new(rx));

        let mut tasks = JoinSet::new();
        for worker_id in 0..workers {
            tasks.spawn(run_worker(
                worker_id,
                Arc::clone(&queue),
                Arc::clone(&self.notifier),
            ));
        }

        for event in events {
            if tx.send(event).await.is_err() {
                log::error!("All dispatch workers exited before the queue was drained");
                break;
            }
        }
        drop(tx);

        let mut report = DispatchReport {
            workers,
            ..Default::default()
        };
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(stats) => {
                    report.delivered += stats.delivered;
                    report.failed += stats.failed;
                }
                Err(error) => log::error!("Dispatch worker terminated abnormally: {error}"),
            }
        }

        report
    }
}

async fn run_worker(
    worker_id: usize,
    queue: SharedQueue,
    notifier: Arc<dyn Notifier>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    loop {
        let next = queue.lock().await.recv().await;
        let Some(event) = next else {
            break;
        };

        let message = render_message(&event.title, &event.body);
        match notifier.send(&event.recipient, &message).await {
            Ok(()) => stats.delivered += 1,
            Err(error) => {
                stats.failed += 1;
                log::error!(
                    "[worker {worker_id}] Error sending event {} to {}: {error:#}",
                    event.key(),
                    event.recipient
                );
            }
        }
    }

    log::debug!(
        "[worker {worker_id}] Queue drained. delivered = {}, failed = {}",
        stats.delivered,
        stats.failed
    );
    stats
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};
    use proptest::prelude::*;

    use super::*;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: StdMutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, recipient: &str, message: &str) -> anyhow::Result<()> {
            if recipient == "bad" {
                anyhow::bail!("invalid recipient {recipient}");
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_owned(), message.to_owned()));
            Ok(())
        }
    }

    fn pool(max_tasks_per_worker: usize, notifier: Arc<RecordingNotifier>) -> DispatchWorkerPool {
        DispatchWorkerPool::new(NonZeroUsize::new(max_tasks_per_worker).unwrap(), notifier)
    }

    fn due_events(recipients: &[&str]) -> Vec<Event> {
        let fire_at = Utc::now() - TimeDelta::seconds(1);
        recipients
            .iter()
            .map(|recipient| Event::new(*recipient, fire_at, "T", "B"))
            .collect()
    }

    proptest! {
        #[test]
        fn worker_count_is_floor_division_plus_one(due in 0usize..10_000, per_worker in 1usize..500) {
            let pool = pool(per_worker, Arc::default());
            prop_assert_eq!(pool.worker_count(due), due / per_worker + 1);
            prop_assert!(pool.worker_count(due) >= 1);
        }
    }

    #[test]
    fn exact_multiple_still_adds_a_worker() {
        let pool = pool(100, Arc::default());

        assert_eq!(pool.worker_count(99), 1);
        assert_eq!(pool.worker_count(100), 2);
        assert_eq!(pool.worker_count(250), 3);
    }

    #[tokio::test]
    async fn sends_rendered_message_to_recipient() {
        let notifier = Arc::new(RecordingNotifier::default());
        let pool = pool(100, Arc::clone(&notifier));

        let report = pool.dispatch(due_events(&["42"])).await;

        assert_eq!(
            report,
            DispatchReport {
                workers: 1,
                delivered: 1,
                failed: 0
            }
        );
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[..], [("42".to_owned(), "<b>T</b>\n<i>B</i>".to_owned())]);
    }

    #[tokio::test]
    async fn failed_delivery_does_not_stop_the_worker() {
        let notifier = Arc::new(RecordingNotifier::default());
        let pool = pool(1, Arc::clone(&notifier));

        let report = pool.dispatch(due_events(&["1", "bad", "2", "3"])).await;

        assert_eq!(report.workers, 5);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(notifier.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_event_is_sent_exactly_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let pool = pool(7, Arc::clone(&notifier));
        let recipients: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        let recipients: Vec<&str> = recipients.iter().map(String::as_str).collect();

        let report = pool.dispatch(due_events(&recipients)).await;

        assert_eq!(report.workers, 15);
        assert_eq!(report.delivered, 100);
        let mut sent: Vec<String> = notifier
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(recipient, _)| recipient.clone())
            .collect();
        sent.sort();
        sent.dedup();
        assert_eq!(sent.len(), 100);
    }
}
