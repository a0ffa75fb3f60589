use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};

use std::time::Duration;

use crate::{
    analysis::{PhaseBreakdown, QualityMetrics, SessionSummary, SNORE_BUCKET_MS},
    db::{
        connection::Database,
        helpers::{parse_phase, to_u64},
        models::{PhaseDuration, PhaseStat, SessionSummaryRow},
    },
    phase::SleepPhase,
    signal::SNORE_THRESHOLD,
};

/// Aggregate queries pushed down to SQLite. Results match what
/// `analysis` computes in-process from `get_samples_for_session`.
impl Database {
    pub async fn get_quality_metrics(&self, session_start: i64) -> Result<QualityMetrics> {
        self.execute(move |conn| {
            let metrics = conn
                .query_row(
                    "SELECT COUNT(*),
                            COALESCE(AVG(motion), 0),
                            COALESCE(MAX(motion), 0),
                            COALESCE(AVG(audio_level), 0),
                            COALESCE(MAX(audio_level), 0)
                     FROM sleep_data
                     WHERE sleep_start = ?1",
                    params![session_start],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, f64>(1)?,
                            row.get::<_, f64>(2)?,
                            row.get::<_, f64>(3)?,
                            row.get::<_, f64>(4)?,
                        ))
                    },
                )
                .context("failed to query quality metrics")?;

            let (count, avg_motion, max_motion, avg_audio, max_audio) = metrics;
            Ok(QualityMetrics {
                total_readings: to_u64(count, "total_readings")?,
                avg_motion: avg_motion as f32,
                max_motion: max_motion as f32,
                avg_audio: avg_audio as f32,
                max_audio: max_audio as f32,
            })
        })
        .await
    }

    pub async fn get_phase_percentages(&self, session_start: i64) -> Result<Vec<PhaseStat>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT sleep_phase,
                        COUNT(*) * 100.0 / (SELECT COUNT(*) FROM sleep_data WHERE sleep_start = ?1)
                 FROM sleep_data
                 WHERE sleep_start = ?1
                 GROUP BY sleep_phase",
            )?;

            let mut rows = stmt.query(params![session_start])?;
            let mut stats = Vec::new();
            while let Some(row) = rows.next()? {
                let phase: String = row.get(0)?;
                let percentage: f64 = row.get(1)?;
                stats.push(PhaseStat {
                    phase: parse_phase(&phase)?,
                    percentage: percentage as f32,
                });
            }
            Ok(stats)
        })
        .await
    }

    /// Sample count per phase; phases with no samples stay at zero.
    pub async fn get_phase_counts(&self, session_start: i64) -> Result<PhaseBreakdown<u64>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT sleep_phase, COUNT(*)
                 FROM sleep_data
                 WHERE sleep_start = ?1
                 GROUP BY sleep_phase",
            )?;

            let mut rows = stmt.query(params![session_start])?;
            let mut counts = PhaseBreakdown::default();
            while let Some(row) = rows.next()? {
                let phase: String = row.get(0)?;
                *counts.get_mut(parse_phase(&phase)?) = to_u64(row.get::<_, i64>(1)?, "phase count")?;
            }
            Ok(counts)
        })
        .await
    }

    pub async fn get_phase_durations(
        &self,
        session_start: i64,
        tick_interval_secs: u64,
    ) -> Result<Vec<PhaseDuration>> {
        let counts = self.get_phase_counts(session_start).await?;
        Ok(SleepPhase::ALL
            .iter()
            .filter(|phase| counts.get(**phase) > 0)
            .map(|phase| PhaseDuration {
                phase: *phase,
                duration_secs: counts.get(*phase) * tick_interval_secs,
            })
            .collect())
    }

    /// Number of distinct five-minute buckets containing a snore-level reading.
    pub async fn get_snore_count(&self, session_start: i64) -> Result<u32> {
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(DISTINCT timestamp / ?2)
                 FROM sleep_data
                 WHERE sleep_start = ?1 AND audio_level > ?3",
                params![session_start, SNORE_BUCKET_MS, f64::from(SNORE_THRESHOLD)],
                |row| row.get(0),
            )?;
            Ok(u32::try_from(count).unwrap_or(u32::MAX))
        })
        .await
    }

    pub async fn get_session_summary_row(
        &self,
        session_start: i64,
    ) -> Result<Option<SessionSummaryRow>> {
        self.execute(move |conn| {
            let row = conn
                .query_row(
                    "SELECT AVG(motion), AVG(audio_level), sleep_start, MAX(alarm_time), MAX(timestamp)
                     FROM sleep_data
                     WHERE sleep_start = ?1
                     GROUP BY sleep_start",
                    params![session_start],
                    |row| {
                        Ok(SessionSummaryRow {
                            avg_motion: row.get::<_, f64>(0)? as f32,
                            avg_audio_level: row.get::<_, f64>(1)? as f32,
                            session_start: row.get(2)?,
                            alarm_time: row.get(3)?,
                            last_timestamp: row.get(4)?,
                        })
                    },
                )
                .optional()
                .context("failed to query session summary")?;
            Ok(row)
        })
        .await
    }

    /// Session summary assembled from the pushed-down aggregates.
    pub async fn get_session_summary(
        &self,
        session_start: i64,
        tick_interval: Duration,
    ) -> Result<SessionSummary> {
        let metrics = self.get_quality_metrics(session_start).await?;
        if metrics.total_readings == 0 {
            return Ok(SessionSummary::empty(session_start));
        }
        let counts = self.get_phase_counts(session_start).await?;
        let snore_count = self.get_snore_count(session_start).await?;
        let alarm_time = self
            .get_session_summary_row(session_start)
            .await?
            .map(|row| row.alarm_time)
            .unwrap_or(0);

        Ok(SessionSummary::from_parts(
            session_start,
            alarm_time,
            metrics,
            counts,
            snore_count,
            tick_interval,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Sample;

    const START: i64 = 1_700_000_100_000;
    const TICK: Duration = Duration::from_secs(30);

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("sleep.sqlite3")).expect("database");
        (dir, db)
    }

    fn night() -> Vec<Sample> {
        let phases = [
            SleepPhase::Awake,
            SleepPhase::LightSleep,
            SleepPhase::LightSleep,
            SleepPhase::DeepSleep,
            SleepPhase::DeepSleep,
            SleepPhase::DeepSleep,
            SleepPhase::Rem,
            SleepPhase::LightSleep,
        ];
        phases
            .iter()
            .enumerate()
            .map(|(i, phase)| {
                let i = i as i64;
                let audio = if i == 2 || i == 7 { 0.6 } else { 0.05 };
                Sample::new(
                    START + i * 120_000,
                    0.02 * i as f32,
                    audio,
                    START,
                    START + 8 * 3_600_000,
                    *phase,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn pushed_down_summary_matches_in_process() {
        let (_dir, db) = open();
        let samples = night();
        db.insert_samples(&samples).await.unwrap();

        let stored = db.get_session_summary(START, TICK).await.unwrap();
        let local = SessionSummary::from_samples(START, &samples, TICK);

        assert_eq!(stored.metrics.total_readings, local.metrics.total_readings);
        assert!((stored.metrics.avg_motion - local.metrics.avg_motion).abs() < 1e-5);
        assert!((stored.metrics.max_audio - local.metrics.max_audio).abs() < 1e-6);
        assert_eq!(stored.phase_percentages, local.phase_percentages);
        assert_eq!(stored.phase_durations_ms, local.phase_durations_ms);
        assert_eq!(stored.snore_count, local.snore_count);
        assert_eq!(stored.quality_score, local.quality_score);
        assert_eq!(stored.recommendations, local.recommendations);
        assert_eq!(stored.alarm_time, START + 8 * 3_600_000);
    }

    #[tokio::test]
    async fn snore_buckets_are_distinct() {
        let (_dir, db) = open();
        let start = SNORE_BUCKET_MS * 6_000;
        let samples: Vec<Sample> = (0..10)
            .map(|i| {
                let audio = if i < 5 { 0.5 } else { 0.1 };
                Sample::new(start + i * 20_000, 0.0, audio, start, 0, SleepPhase::LightSleep)
            })
            .collect();
        db.insert_samples(&samples).await.unwrap();
        assert_eq!(db.get_snore_count(start).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn durations_and_percentages_per_phase() {
        let (_dir, db) = open();
        db.insert_samples(&night()).await.unwrap();

        let durations = db.get_phase_durations(START, 30).await.unwrap();
        let deep = durations
            .iter()
            .find(|d| d.phase == SleepPhase::DeepSleep)
            .unwrap();
        assert_eq!(deep.duration_secs, 90);

        let percentages = db.get_phase_percentages(START).await.unwrap();
        let light = percentages
            .iter()
            .find(|p| p.phase == SleepPhase::LightSleep)
            .unwrap();
        assert!((light.percentage - 37.5).abs() < 1e-4);
    }

    #[tokio::test]
    async fn empty_session_yields_no_data() {
        let (_dir, db) = open();
        let metrics = db.get_quality_metrics(START).await.unwrap();
        assert_eq!(metrics, QualityMetrics::default());
        assert!(db.get_session_summary_row(START).await.unwrap().is_none());
        let summary = db.get_session_summary(START, TICK).await.unwrap();
        assert_eq!(summary.quality_score, 0);
        assert!(!summary.has_data());
    }
}
