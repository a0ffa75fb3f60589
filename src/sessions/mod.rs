use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::Mutex;

use crate::{
    analysis::{quality_trend, QualityMetrics, SessionSummary},
    db::SampleStore,
};

/// "Current session" bookkeeping over a sample store. A session is identified
/// only by its start timestamp.
#[derive(Clone)]
pub struct SessionSelector {
    store: Arc<dyn SampleStore>,
    tick_interval: Duration,
    selected: Arc<Mutex<Option<i64>>>,
}

impl SessionSelector {
    pub fn new(store: Arc<dyn SampleStore>, tick_interval: Duration) -> Self {
        Self {
            store,
            tick_interval,
            selected: Arc::new(Mutex::new(None)),
        }
    }

    /// Session starts with at least one sample, most recent first.
    pub async fn list_sessions(&self) -> Result<Vec<i64>> {
        self.store.distinct_session_starts().await
    }

    pub async fn latest_session(&self) -> Result<Option<i64>> {
        self.store.latest_session_start().await
    }

    pub async fn select_session(&self, session_start: i64) -> Result<()> {
        let sessions = self.list_sessions().await?;
        if !sessions.contains(&session_start) {
            bail!("session {session_start} has no stored samples");
        }
        *self.selected.lock().await = Some(session_start);
        Ok(())
    }

    pub async fn selected(&self) -> Option<i64> {
        *self.selected.lock().await
    }

    pub async fn clear_selection(&self) {
        *self.selected.lock().await = None;
    }

    /// Keep the `keep` most recent sessions. A selection that was pruned is cleared.
    pub async fn prune_keeping(&self, keep: usize) -> Result<usize> {
        let removed = self
            .store
            .prune_keeping(keep)
            .await
            .with_context(|| format!("failed to prune sessions down to {keep}"))?;

        if removed > 0 {
            info!("pruned {removed} samples, keeping {keep} most recent sessions");
            let remaining = self.list_sessions().await?;
            let mut selected = self.selected.lock().await;
            if selected.is_some_and(|start| !remaining.contains(&start)) {
                *selected = None;
            }
        }
        Ok(removed)
    }

    pub async fn delete_session(&self, session_start: i64) -> Result<usize> {
        let removed = self.store.delete_session(session_start).await?;
        let mut selected = self.selected.lock().await;
        if *selected == Some(session_start) {
            *selected = None;
        }
        Ok(removed)
    }

    pub async fn clear_all(&self) -> Result<usize> {
        let removed = self.store.delete_all().await?;
        *self.selected.lock().await = None;
        Ok(removed)
    }

    /// Summary of the selected session; `None` when nothing is selected.
    pub async fn selected_summary(&self) -> Result<Option<SessionSummary>> {
        let Some(session_start) = self.selected().await else {
            return Ok(None);
        };
        self.summary_for(session_start).await.map(Some)
    }

    pub async fn selected_metrics(&self) -> Result<Option<QualityMetrics>> {
        let Some(session_start) = self.selected().await else {
            return Ok(None);
        };
        self.store.quality_metrics(session_start).await.map(Some)
    }

    pub async fn selected_report(&self) -> Result<Option<String>> {
        let Some(session_start) = self.selected().await else {
            return Ok(None);
        };
        let metrics = self.store.quality_metrics(session_start).await?;
        let row = self.store.session_summary_row(session_start).await?;
        Ok(Some(quality_trend(&metrics, row.as_ref())))
    }

    pub async fn summary_for(&self, session_start: i64) -> Result<SessionSummary> {
        self.store
            .session_summary(session_start, self.tick_interval)
            .await
            .with_context(|| format!("failed to summarize session {session_start}"))
    }

    /// Select the most recent session and return its summary.
    pub async fn refresh_latest(&self) -> Result<Option<SessionSummary>> {
        let Some(latest) = self.latest_session().await? else {
            self.clear_selection().await;
            return Ok(None);
        };
        *self.selected.lock().await = Some(latest);
        self.summary_for(latest).await.map(Some)
    }
}
