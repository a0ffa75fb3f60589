use std::{collections::HashSet, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{db::models::Sample, phase::SleepPhase, signal::SNORE_THRESHOLD};

use super::{QualityLabel, QualityMetrics, SNORE_BUCKET_MS};

const DEEP_WEIGHT: f32 = 0.35;
const LIGHT_WEIGHT: f32 = 0.25;
const REM_WEIGHT: f32 = 0.25;
const AWAKE_WEIGHT: f32 = 0.15;

/// Percentage points above a band's maximum that take the phase score to zero.
const OVER_BAND_SPAN: f32 = 50.0;
const AWAKE_CEILING: f32 = 5.0;
const AWAKE_PENALTY_PER_POINT: f32 = 5.0;

const LOW_DEEP_PCT: f32 = 15.0;
const LOW_REM_PCT: f32 = 15.0;
const HIGH_AWAKE_PCT: f32 = 10.0;
const HIGH_SNORE_COUNT: u32 = 10;

/// Target share of the night, in percent.
#[derive(Debug, Clone, Copy)]
struct IdealBand {
    min: f32,
    max: f32,
}

const DEEP_BAND: IdealBand = IdealBand { min: 20.0, max: 25.0 };
const LIGHT_BAND: IdealBand = IdealBand { min: 45.0, max: 55.0 };
const REM_BAND: IdealBand = IdealBand { min: 20.0, max: 25.0 };

/// One value per sleep phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseBreakdown<T> {
    pub awake: T,
    pub light_sleep: T,
    pub deep_sleep: T,
    pub rem: T,
}

impl<T: Copy> PhaseBreakdown<T> {
    pub fn get(&self, phase: SleepPhase) -> T {
        match phase {
            SleepPhase::Awake => self.awake,
            SleepPhase::LightSleep => self.light_sleep,
            SleepPhase::DeepSleep => self.deep_sleep,
            SleepPhase::Rem => self.rem,
        }
    }

    pub fn get_mut(&mut self, phase: SleepPhase) -> &mut T {
        match phase {
            SleepPhase::Awake => &mut self.awake,
            SleepPhase::LightSleep => &mut self.light_sleep,
            SleepPhase::DeepSleep => &mut self.deep_sleep,
            SleepPhase::Rem => &mut self.rem,
        }
    }

    pub fn map<U>(&self, f: impl Fn(T) -> U) -> PhaseBreakdown<U> {
        PhaseBreakdown {
            awake: f(self.awake),
            light_sleep: f(self.light_sleep),
            deep_sleep: f(self.deep_sleep),
            rem: f(self.rem),
        }
    }
}

impl PhaseBreakdown<u64> {
    pub fn from_samples(samples: &[Sample]) -> Self {
        let mut counts = Self::default();
        for sample in samples {
            *counts.get_mut(sample.sleep_phase) += 1;
        }
        counts
    }

    pub fn total(&self) -> u64 {
        self.awake + self.light_sleep + self.deep_sleep + self.rem
    }

    pub fn percentages(&self) -> PhaseBreakdown<f32> {
        let total = self.total();
        if total == 0 {
            return PhaseBreakdown::default();
        }
        self.map(|count| count as f32 * 100.0 / total as f32)
    }
}

/// Retrospective view of one session. Never stored; rebuilt on every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_start: i64,
    pub alarm_time: i64,
    pub metrics: QualityMetrics,
    pub phase_percentages: PhaseBreakdown<f32>,
    pub phase_durations_ms: PhaseBreakdown<u64>,
    pub total_duration_ms: u64,
    pub snore_count: u32,
    pub quality_score: u8,
    pub quality_label: QualityLabel,
    pub recommendations: Vec<String>,
}

impl SessionSummary {
    /// The "no data" result for a session without samples.
    pub fn empty(session_start: i64) -> Self {
        Self::from_parts(
            session_start,
            0,
            QualityMetrics::default(),
            PhaseBreakdown::default(),
            0,
            Duration::ZERO,
        )
    }

    pub fn from_samples(session_start: i64, samples: &[Sample], tick_interval: Duration) -> Self {
        let alarm_time = samples.iter().map(|s| s.alarm_time).max().unwrap_or(0);
        Self::from_parts(
            session_start,
            alarm_time,
            QualityMetrics::from_samples(samples),
            PhaseBreakdown::from_samples(samples),
            count_snore_episodes(samples),
            tick_interval,
        )
    }

    /// Assemble a summary from precomputed aggregates. Durations are
    /// `count × tick_interval` per phase.
    pub fn from_parts(
        session_start: i64,
        alarm_time: i64,
        metrics: QualityMetrics,
        phase_counts: PhaseBreakdown<u64>,
        snore_count: u32,
        tick_interval: Duration,
    ) -> Self {
        let tick_ms = u64::try_from(tick_interval.as_millis()).unwrap_or(u64::MAX);
        let phase_durations_ms = phase_counts.map(|count| count.saturating_mul(tick_ms));
        let total_duration_ms = phase_counts.total().saturating_mul(tick_ms);
        let phase_percentages = phase_counts.percentages();

        let quality_score = if metrics.total_readings == 0 {
            0
        } else {
            phase_quality_score(&phase_percentages)
        };
        let recommendations = if metrics.total_readings == 0 {
            Vec::new()
        } else {
            recommendations(&phase_percentages, snore_count)
        };

        Self {
            session_start,
            alarm_time,
            metrics,
            phase_percentages,
            phase_durations_ms,
            total_duration_ms,
            snore_count,
            quality_score,
            quality_label: QualityLabel::for_summary_score(quality_score),
            recommendations,
        }
    }

    pub fn has_data(&self) -> bool {
        self.metrics.total_readings > 0
    }
}

/// Composite 0–100 score of how close the night's phase mix is to the ideal bands.
pub fn phase_quality_score(percentages: &PhaseBreakdown<f32>) -> u8 {
    let deep = band_score(percentages.deep_sleep, DEEP_BAND);
    let light = band_score(percentages.light_sleep, LIGHT_BAND);
    let rem = band_score(percentages.rem, REM_BAND);
    let awake = awake_score(percentages.awake);

    let composite =
        deep * DEEP_WEIGHT + light * LIGHT_WEIGHT + rem * REM_WEIGHT + awake * AWAKE_WEIGHT;
    composite.clamp(0.0, 100.0) as u8
}

fn band_score(percentage: f32, band: IdealBand) -> f32 {
    let score = if percentage < band.min {
        100.0 * percentage / band.min
    } else if percentage > band.max {
        100.0 * (1.0 - (percentage - band.max) / OVER_BAND_SPAN)
    } else {
        100.0
    };
    score.clamp(0.0, 100.0)
}

fn awake_score(percentage: f32) -> f32 {
    if percentage <= AWAKE_CEILING {
        100.0
    } else {
        (100.0 - (percentage - AWAKE_CEILING) * AWAKE_PENALTY_PER_POINT).clamp(0.0, 100.0)
    }
}

/// Distinct five-minute buckets holding at least one snore-level reading.
pub fn count_snore_episodes(samples: &[Sample]) -> u32 {
    let buckets: HashSet<i64> = samples
        .iter()
        .filter(|s| s.audio_level > SNORE_THRESHOLD)
        .map(|s| s.timestamp / SNORE_BUCKET_MS)
        .collect();
    u32::try_from(buckets.len()).unwrap_or(u32::MAX)
}

pub fn recommendations(percentages: &PhaseBreakdown<f32>, snore_count: u32) -> Vec<String> {
    let mut hints = Vec::new();
    if percentages.deep_sleep < LOW_DEEP_PCT {
        hints.push("Try to maintain a consistent sleep schedule to improve deep sleep".to_string());
    }
    if percentages.rem < LOW_REM_PCT {
        hints.push("Consider reducing caffeine intake to improve REM sleep".to_string());
    }
    if percentages.awake > HIGH_AWAKE_PCT {
        hints.push(
            "Your sleep environment might need improvement (noise, light, temperature)"
                .to_string(),
        );
    }
    if snore_count > HIGH_SNORE_COUNT {
        hints.push("Consider consulting a sleep specialist about your snoring".to_string());
    }
    hints
}
