use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::db::models::Sample;

use super::QualityLabel;

const MOTION_WEIGHT: f32 = 0.6;
const AUDIO_WEIGHT: f32 = 0.4;

/// Motion/audio extremes of one session. Basis of the metrics-only quality score,
/// used where no phase labels are available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub total_readings: u64,
    pub avg_motion: f32,
    pub max_motion: f32,
    pub avg_audio: f32,
    pub max_audio: f32,
}

impl QualityMetrics {
    pub fn from_samples(samples: &[Sample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let count = samples.len() as f32;
        let (mut motion_sum, mut audio_sum) = (0.0f32, 0.0f32);
        let (mut max_motion, mut max_audio) = (0.0f32, 0.0f32);
        for sample in samples {
            motion_sum += sample.motion;
            audio_sum += sample.audio_level;
            max_motion = max_motion.max(sample.motion);
            max_audio = max_audio.max(sample.audio_level);
        }

        Self {
            total_readings: samples.len() as u64,
            avg_motion: motion_sum / count,
            max_motion,
            avg_audio: audio_sum / count,
            max_audio,
        }
    }

    /// 0 (poor) to 100 (excellent): motion weighted 0.6, audio 0.4.
    ///
    /// Each sub-score is how far the average sits below the peak; a session with
    /// no movement (or no noise) at all scores 100 on that axis.
    pub fn quality_score(&self) -> u8 {
        if self.total_readings == 0 {
            return 0;
        }

        let motion_score = relative_calm_score(self.avg_motion, self.max_motion);
        let audio_score = relative_calm_score(self.avg_audio, self.max_audio);

        let composite = motion_score * MOTION_WEIGHT + audio_score * AUDIO_WEIGHT;
        composite.clamp(0.0, 100.0) as u8
    }

    pub fn qualitative_assessment(&self) -> QualityLabel {
        QualityLabel::for_metrics_score(self.quality_score())
    }

    pub fn detailed_analysis(&self) -> String {
        let quality = self.qualitative_assessment();
        let score = self.quality_score();

        let mut out = String::new();
        let _ = writeln!(out, "Sleep Quality: {quality} ({score}/100)");
        let _ = writeln!(out, "Based on {} measurements:", self.total_readings);
        let _ = writeln!(
            out,
            "- Movement: Average {:.2}, Peak {:.2}",
            self.avg_motion, self.max_motion
        );
        let _ = writeln!(
            out,
            "- Noise: Average {:.2}, Peak {:.2}",
            self.avg_audio, self.max_audio
        );

        if self.avg_motion > self.max_motion * 0.7 {
            let _ = writeln!(out, "High movement detected throughout sleep period");
        } else if self.avg_audio > self.max_audio * 0.7 {
            let _ = writeln!(out, "Consistent noise levels detected");
        } else if score > 80 {
            let _ = writeln!(out, "Deep, restful sleep detected");
        } else if score < 40 {
            let _ = writeln!(out, "Sleep disruptions detected");
        }

        out
    }
}

fn relative_calm_score(avg: f32, max: f32) -> f32 {
    if max <= 0.0 {
        return 100.0;
    }
    (100.0 - (avg / max) * 100.0).clamp(0.0, 100.0)
}
