use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::db::{models::Sample, SampleStore};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterReport {
    pub persisted: usize,
    pub dropped: usize,
}

/// Drains the sample queue into the store until every sender is gone.
///
/// A failed write drops that batch and is logged. After `failure_limit`
/// consecutive failures `storage_lost` is cancelled; draining continues so
/// nothing queued is silently skipped.
pub async fn persistence_loop(
    store: Arc<dyn SampleStore>,
    mut queue: UnboundedReceiver<Sample>,
    batch_size: usize,
    failure_limit: u32,
    storage_lost: CancellationToken,
) -> WriterReport {
    let batch_size = batch_size.max(1);
    let mut report = WriterReport::default();
    let mut consecutive_failures = 0u32;
    let mut batch = Vec::with_capacity(batch_size);

    loop {
        batch.clear();
        if queue.recv_many(&mut batch, batch_size).await == 0 {
            break;
        }

        let result = match batch.as_slice() {
            [single] => store.append(single).await,
            samples => store.append_batch(samples).await,
        };

        match result {
            Ok(()) => {
                consecutive_failures = 0;
                report.persisted += batch.len();
                log_debug!("persisted {} sleep samples", batch.len());
            }
            Err(err) => {
                consecutive_failures += 1;
                report.dropped += batch.len();
                let first = &batch[0];
                log_error!(
                    "failed to persist {} samples for session {} at {}: {err:?}",
                    batch.len(),
                    first.session_start,
                    first.timestamp
                );

                if consecutive_failures >= failure_limit && !storage_lost.is_cancelled() {
                    log_error!(
                        "storage unavailable after {consecutive_failures} consecutive write failures"
                    );
                    storage_lost.cancel();
                }
            }
        }
    }

    report
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{db::MemoryStore, phase::SleepPhase};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Store whose writes fail, except the attempts listed in `succeed_on`
    /// (1-based); reads are empty.
    #[derive(Default)]
    pub(crate) struct FailingStore {
        pub(crate) attempts: AtomicUsize,
        pub(crate) unreachable: bool,
        pub(crate) succeed_on: Vec<usize>,
    }

    impl FailingStore {
        fn attempt(&self) -> Result<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.succeed_on.contains(&attempt) {
                Ok(())
            } else {
                Err(anyhow!("disk full"))
            }
        }
    }

    #[async_trait]
    impl SampleStore for FailingStore {
        async fn append(&self, _sample: &Sample) -> Result<()> {
            self.attempt()
        }
        async fn append_batch(&self, _samples: &[Sample]) -> Result<()> {
            self.attempt()
        }
        async fn samples_between(&self, _start: i64, _end: i64) -> Result<Vec<Sample>> {
            Ok(Vec::new())
        }
        async fn samples_for_session(&self, _session_start: i64) -> Result<Vec<Sample>> {
            Ok(Vec::new())
        }
        async fn distinct_session_starts(&self) -> Result<Vec<i64>> {
            Ok(Vec::new())
        }
        async fn latest_session_start(&self) -> Result<Option<i64>> {
            Ok(None)
        }
        async fn delete_before(&self, _timestamp: i64) -> Result<usize> {
            Ok(0)
        }
        async fn delete_session(&self, _session_start: i64) -> Result<usize> {
            Ok(0)
        }
        async fn prune_keeping(&self, _keep: usize) -> Result<usize> {
            Ok(0)
        }
        async fn delete_all(&self) -> Result<usize> {
            Ok(0)
        }
        async fn check_available(&self) -> Result<()> {
            if self.unreachable {
                Err(anyhow!("database file is locked"))
            } else {
                Ok(())
            }
        }
    }

    fn sample(offset: i64) -> Sample {
        Sample::new(1_000 + offset, 0.0, 0.0, 1_000, 0, SleepPhase::Awake)
    }

    #[tokio::test]
    async fn drains_everything_queued_before_close() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        for offset in 0..7 {
            tx.send(sample(offset)).unwrap();
        }
        drop(tx);

        let report =
            persistence_loop(store.clone(), rx, 3, 5, CancellationToken::new()).await;
        assert_eq!(report, WriterReport { persisted: 7, dropped: 0 });
        assert_eq!(store.len(), 7);
    }

    #[tokio::test]
    async fn declares_storage_lost_after_consecutive_failures() {
        let store = Arc::new(FailingStore::default());
        let lost = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(persistence_loop(store.clone(), rx, 1, 3, lost.clone()));

        for offset in 0..2 {
            tx.send(sample(offset)).unwrap();
        }
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert!(!lost.is_cancelled());

        tx.send(sample(2)).unwrap();
        lost.cancelled().await;

        drop(tx);
        let report = writer.await.unwrap();
        assert_eq!(report.persisted, 0);
        assert_eq!(report.dropped, 3);
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    }

    async fn run_flaky(queued: i64) -> (WriterReport, bool) {
        let store = Arc::new(FailingStore {
            succeed_on: vec![3],
            ..FailingStore::default()
        });
        let lost = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        for offset in 0..queued {
            tx.send(sample(offset)).unwrap();
        }
        drop(tx);

        let report = persistence_loop(store, rx, 1, 3, lost.clone()).await;
        (report, lost.is_cancelled())
    }

    #[tokio::test]
    async fn successful_write_resets_failure_streak() {
        // fail, fail, ok, fail, fail: never three in a row
        let (report, lost) = run_flaky(5).await;
        assert_eq!(report, WriterReport { persisted: 1, dropped: 4 });
        assert!(!lost);

        let (report, lost) = run_flaky(6).await;
        assert_eq!(report, WriterReport { persisted: 1, dropped: 5 });
        assert!(lost);
    }
}
