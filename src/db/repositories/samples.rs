use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Transaction};

use crate::db::{
    connection::Database,
    helpers::{row_to_sample, to_i64, SAMPLE_COLUMNS},
    models::Sample,
};

fn insert_row(tx: &Transaction<'_>, sample: &Sample) -> Result<()> {
    tx.execute(
        "INSERT INTO sleep_data (timestamp, motion, audio_level, sleep_start, alarm_time, sleep_phase)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            sample.timestamp,
            f64::from(sample.motion),
            f64::from(sample.audio_level),
            sample.session_start,
            sample.alarm_time,
            sample.sleep_phase.as_str(),
        ],
    )?;
    Ok(())
}

impl Database {
    pub async fn insert_sample(&self, sample: &Sample) -> Result<()> {
        sample.validate()?;
        let record = sample.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            insert_row(&tx, &record).context("failed to insert sleep sample")?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Insert every sample in one transaction; nothing is written if any row fails.
    pub async fn insert_samples(&self, samples: &[Sample]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        for sample in samples {
            sample.validate()?;
        }
        let records = samples.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            for record in &records {
                insert_row(&tx, record).with_context(|| {
                    format!("failed to insert sleep sample at {}", record.timestamp)
                })?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_samples_between(&self, start_time: i64, end_time: i64) -> Result<Vec<Sample>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SAMPLE_COLUMNS}
                 FROM sleep_data
                 WHERE timestamp BETWEEN ?1 AND ?2
                 ORDER BY timestamp ASC, id ASC"
            ))?;

            let mut rows = stmt.query(params![start_time, end_time])?;
            let mut samples = Vec::new();
            while let Some(row) = rows.next()? {
                samples.push(row_to_sample(row)?);
            }
            Ok(samples)
        })
        .await
    }

    pub async fn get_samples_for_session(&self, session_start: i64) -> Result<Vec<Sample>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SAMPLE_COLUMNS}
                 FROM sleep_data
                 WHERE sleep_start = ?1
                 ORDER BY timestamp ASC, id ASC"
            ))?;

            let mut rows = stmt.query(params![session_start])?;
            let mut samples = Vec::new();
            while let Some(row) = rows.next()? {
                samples.push(row_to_sample(row)?);
            }
            Ok(samples)
        })
        .await
    }

    /// Distinct session starts, most recent first.
    pub async fn list_session_starts(&self) -> Result<Vec<i64>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT sleep_start
                 FROM sleep_data
                 WHERE sleep_start > 0
                 ORDER BY sleep_start DESC",
            )?;
            let starts = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(starts)
        })
        .await
    }

    pub async fn get_latest_session_start(&self) -> Result<Option<i64>> {
        self.execute(|conn| {
            let latest = conn
                .query_row(
                    "SELECT MAX(sleep_start) FROM sleep_data WHERE sleep_start > 0",
                    [],
                    |row| row.get::<_, Option<i64>>(0),
                )
                .optional()?
                .flatten();
            Ok(latest)
        })
        .await
    }

    pub async fn delete_samples_before(&self, timestamp: i64) -> Result<usize> {
        self.execute(move |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM sleep_data WHERE timestamp < ?1",
                    params![timestamp],
                )
                .context("failed to delete old sleep samples")?;
            Ok(removed)
        })
        .await
    }

    pub async fn delete_session_samples(&self, session_start: i64) -> Result<usize> {
        self.execute(move |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM sleep_data WHERE sleep_start = ?1",
                    params![session_start],
                )
                .context("failed to delete session samples")?;
            Ok(removed)
        })
        .await
    }

    /// Delete every sample outside the `keep` most recent sessions, in one transaction.
    pub async fn keep_recent_sessions(&self, keep: usize) -> Result<usize> {
        let keep = to_i64(keep)?;
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx
                .execute(
                    "DELETE FROM sleep_data
                     WHERE sleep_start NOT IN (
                         SELECT DISTINCT sleep_start
                         FROM sleep_data
                         ORDER BY sleep_start DESC
                         LIMIT ?1
                     )",
                    params![keep],
                )
                .context("failed to prune old sessions")?;
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    pub async fn delete_all_samples(&self) -> Result<usize> {
        self.execute(|conn| {
            let removed = conn
                .execute("DELETE FROM sleep_data", [])
                .context("failed to clear sleep data")?;
            Ok(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::SleepPhase;

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("sleep.sqlite3")).expect("database");
        (dir, db)
    }

    fn sample(session_start: i64, offset: i64) -> Sample {
        Sample::new(
            session_start + offset,
            0.05,
            0.1,
            session_start,
            0,
            SleepPhase::LightSleep,
        )
    }

    #[tokio::test]
    async fn inserted_samples_come_back_in_order() {
        let (_dir, db) = open();
        db.insert_samples(&[sample(1_000, 20), sample(1_000, 10)])
            .await
            .unwrap();
        db.insert_sample(&sample(1_000, 30)).await.unwrap();

        let samples = db.get_samples_for_session(1_000).await.unwrap();
        let offsets: Vec<i64> = samples.iter().map(|s| s.timestamp - 1_000).collect();
        assert_eq!(offsets, vec![10, 20, 30]);
        assert!(samples.iter().all(|s| s.id.is_some()));
        assert_eq!(samples[0].sleep_phase, SleepPhase::LightSleep);
    }

    #[tokio::test]
    async fn duplicate_timestamps_are_kept() {
        let (_dir, db) = open();
        db.insert_sample(&sample(1_000, 10)).await.unwrap();
        db.insert_sample(&sample(1_000, 10)).await.unwrap();
        assert_eq!(db.get_samples_for_session(1_000).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalid_samples_are_rejected_before_writing() {
        let (_dir, db) = open();
        let bad = Sample { session_start: 0, ..sample(1_000, 10) };
        assert!(db.insert_samples(&[sample(1_000, 5), bad]).await.is_err());
        assert!(db.get_samples_for_session(1_000).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn samples_between_is_inclusive() {
        let (_dir, db) = open();
        db.insert_samples(&[sample(1_000, 0), sample(1_000, 50), sample(1_000, 100)])
            .await
            .unwrap();
        let samples = db.get_samples_between(1_000, 1_050).await.unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[tokio::test]
    async fn session_listing_and_latest() {
        let (_dir, db) = open();
        assert_eq!(db.get_latest_session_start().await.unwrap(), None);

        for start in [1_000, 3_000, 2_000] {
            db.insert_sample(&sample(start, 1)).await.unwrap();
        }
        assert_eq!(
            db.list_session_starts().await.unwrap(),
            vec![3_000, 2_000, 1_000]
        );
        assert_eq!(db.get_latest_session_start().await.unwrap(), Some(3_000));
    }

    #[tokio::test]
    async fn keep_recent_sessions_prunes_older_ones() {
        let (_dir, db) = open();
        for start in [1_000, 2_000, 3_000, 4_000] {
            db.insert_samples(&[sample(start, 1), sample(start, 2)])
                .await
                .unwrap();
        }

        let removed = db.keep_recent_sessions(2).await.unwrap();
        assert_eq!(removed, 4);
        assert_eq!(db.list_session_starts().await.unwrap(), vec![4_000, 3_000]);
        assert!(db.get_samples_for_session(1_000).await.unwrap().is_empty());

        assert_eq!(db.keep_recent_sessions(10).await.unwrap(), 0);
        assert_eq!(db.list_session_starts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deletes_by_time_session_and_everything() {
        let (_dir, db) = open();
        for start in [1_000, 2_000, 3_000] {
            db.insert_sample(&sample(start, 1)).await.unwrap();
        }

        assert_eq!(db.delete_samples_before(2_000).await.unwrap(), 1);
        assert_eq!(db.delete_session_samples(2_000).await.unwrap(), 1);
        assert_eq!(db.list_session_starts().await.unwrap(), vec![3_000]);
        assert_eq!(db.delete_all_samples().await.unwrap(), 1);
        assert!(db.list_session_starts().await.unwrap().is_empty());
    }
}
