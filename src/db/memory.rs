use std::{
    collections::BTreeSet,
    sync::{Mutex, MutexGuard},
};

use anyhow::Result;
use async_trait::async_trait;

use super::{models::Sample, store::SampleStore};

/// Volatile `SampleStore` for hosts without a database file and for tests.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Sample>>,
    next_id: Mutex<i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    fn rows(&self) -> MutexGuard<'_, Vec<Sample>> {
        match self.rows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn assign_id(&self) -> i64 {
        let mut guard = match self.next_id.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard += 1;
        *guard
    }

    fn sorted(mut samples: Vec<Sample>) -> Vec<Sample> {
        samples.sort_by_key(|s| (s.timestamp, s.id));
        samples
    }

    fn retain(&self, keep: impl Fn(&Sample) -> bool) -> usize {
        let mut rows = self.rows();
        let before = rows.len();
        rows.retain(|s| keep(s));
        before - rows.len()
    }
}

#[async_trait]
impl SampleStore for MemoryStore {
    async fn append(&self, sample: &Sample) -> Result<()> {
        self.append_batch(std::slice::from_ref(sample)).await
    }

    async fn append_batch(&self, samples: &[Sample]) -> Result<()> {
        for sample in samples {
            sample.validate()?;
        }
        let stored: Vec<Sample> = samples
            .iter()
            .map(|sample| Sample {
                id: Some(self.assign_id()),
                ..sample.clone()
            })
            .collect();
        self.rows().extend(stored);
        Ok(())
    }

    async fn samples_between(&self, start_time: i64, end_time: i64) -> Result<Vec<Sample>> {
        let matching = self
            .rows()
            .iter()
            .filter(|s| s.timestamp >= start_time && s.timestamp <= end_time)
            .cloned()
            .collect();
        Ok(Self::sorted(matching))
    }

    async fn samples_for_session(&self, session_start: i64) -> Result<Vec<Sample>> {
        let matching = self
            .rows()
            .iter()
            .filter(|s| s.session_start == session_start)
            .cloned()
            .collect();
        Ok(Self::sorted(matching))
    }

    async fn distinct_session_starts(&self) -> Result<Vec<i64>> {
        let starts: BTreeSet<i64> = self
            .rows()
            .iter()
            .map(|s| s.session_start)
            .filter(|start| *start > 0)
            .collect();
        Ok(starts.into_iter().rev().collect())
    }

    async fn latest_session_start(&self) -> Result<Option<i64>> {
        Ok(self.distinct_session_starts().await?.first().copied())
    }

    async fn delete_before(&self, timestamp: i64) -> Result<usize> {
        Ok(self.retain(|s| s.timestamp >= timestamp))
    }

    async fn delete_session(&self, session_start: i64) -> Result<usize> {
        Ok(self.retain(|s| s.session_start != session_start))
    }

    async fn prune_keeping(&self, keep: usize) -> Result<usize> {
        // Listing and deleting happen under one guard so a session appended
        // in between is never pruned.
        let mut rows = self.rows();
        let starts: BTreeSet<i64> = rows.iter().map(|s| s.session_start).collect();
        let kept: BTreeSet<i64> = starts.into_iter().rev().take(keep).collect();
        let before = rows.len();
        rows.retain(|s| kept.contains(&s.session_start));
        Ok(before - rows.len())
    }

    async fn delete_all(&self) -> Result<usize> {
        Ok(self.retain(|_| false))
    }

    async fn check_available(&self) -> Result<()> {
        Ok(())
    }
}
