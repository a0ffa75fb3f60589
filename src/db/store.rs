use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::analysis::{QualityMetrics, SessionSummary};

use super::{
    connection::Database,
    models::{Sample, SessionSummaryRow},
};

/// Append-only time-series storage the tracking core writes to and the
/// session selector reads from.
///
/// Appends are retry-safe: a duplicate timestamp within a session is kept as an
/// additional reading.
#[async_trait]
pub trait SampleStore: Send + Sync {
    async fn append(&self, sample: &Sample) -> Result<()>;

    /// All-or-nothing insert of several samples.
    async fn append_batch(&self, samples: &[Sample]) -> Result<()>;

    /// Inclusive on both ends, ordered by timestamp.
    async fn samples_between(&self, start_time: i64, end_time: i64) -> Result<Vec<Sample>>;

    async fn samples_for_session(&self, session_start: i64) -> Result<Vec<Sample>>;

    /// Most recent first.
    async fn distinct_session_starts(&self) -> Result<Vec<i64>>;

    async fn latest_session_start(&self) -> Result<Option<i64>>;

    async fn delete_before(&self, timestamp: i64) -> Result<usize>;

    async fn delete_session(&self, session_start: i64) -> Result<usize>;

    /// Atomically drop every session except the `keep` most recent.
    async fn prune_keeping(&self, keep: usize) -> Result<usize>;

    async fn delete_all(&self) -> Result<usize>;

    /// Fails when the store cannot accept writes at all.
    async fn check_available(&self) -> Result<()>;

    // Aggregates are computed in-process by default; SQL-backed stores push them down.

    async fn quality_metrics(&self, session_start: i64) -> Result<QualityMetrics> {
        let samples = self.samples_for_session(session_start).await?;
        Ok(QualityMetrics::from_samples(&samples))
    }

    async fn session_summary_row(&self, session_start: i64) -> Result<Option<SessionSummaryRow>> {
        let samples = self.samples_for_session(session_start).await?;
        Ok(SessionSummaryRow::from_samples(&samples))
    }

    async fn session_summary(
        &self,
        session_start: i64,
        tick_interval: Duration,
    ) -> Result<SessionSummary> {
        let samples = self.samples_for_session(session_start).await?;
        Ok(SessionSummary::from_samples(session_start, &samples, tick_interval))
    }
}

#[async_trait]
impl SampleStore for Database {
    async fn append(&self, sample: &Sample) -> Result<()> {
        self.insert_sample(sample).await
    }

    async fn append_batch(&self, samples: &[Sample]) -> Result<()> {
        self.insert_samples(samples).await
    }

    async fn samples_between(&self, start_time: i64, end_time: i64) -> Result<Vec<Sample>> {
        self.get_samples_between(start_time, end_time).await
    }

    async fn samples_for_session(&self, session_start: i64) -> Result<Vec<Sample>> {
        self.get_samples_for_session(session_start).await
    }

    async fn distinct_session_starts(&self) -> Result<Vec<i64>> {
        self.list_session_starts().await
    }

    async fn latest_session_start(&self) -> Result<Option<i64>> {
        self.get_latest_session_start().await
    }

    async fn delete_before(&self, timestamp: i64) -> Result<usize> {
        self.delete_samples_before(timestamp).await
    }

    async fn delete_session(&self, session_start: i64) -> Result<usize> {
        self.delete_session_samples(session_start).await
    }

    async fn prune_keeping(&self, keep: usize) -> Result<usize> {
        self.keep_recent_sessions(keep).await
    }

    async fn delete_all(&self) -> Result<usize> {
        self.delete_all_samples().await
    }

    async fn check_available(&self) -> Result<()> {
        self.ping().await
    }

    async fn quality_metrics(&self, session_start: i64) -> Result<QualityMetrics> {
        self.get_quality_metrics(session_start).await
    }

    async fn session_summary_row(&self, session_start: i64) -> Result<Option<SessionSummaryRow>> {
        self.get_session_summary_row(session_start).await
    }

    async fn session_summary(
        &self,
        session_start: i64,
        tick_interval: Duration,
    ) -> Result<SessionSummary> {
        self.get_session_summary(session_start, tick_interval).await
    }
}
