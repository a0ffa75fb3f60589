pub mod metrics;
pub mod report;
pub mod summary;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use metrics::QualityMetrics;
pub use report::{format_duration, quality_trend};
pub use summary::{phase_quality_score, PhaseBreakdown, SessionSummary};

/// Width of a snore-episode bucket; a session counts at most one episode per bucket.
pub const SNORE_BUCKET_MS: i64 = 300_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityLabel {
    Poor,
    Fair,
    Good,
    VeryGood,
    Excellent,
}

impl QualityLabel {
    /// Banding for the phase-distribution score of a session summary.
    pub fn for_summary_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => QualityLabel::Excellent,
            80..=89 => QualityLabel::VeryGood,
            70..=79 => QualityLabel::Good,
            60..=69 => QualityLabel::Fair,
            _ => QualityLabel::Poor,
        }
    }

    /// Banding for the metrics-only score.
    pub fn for_metrics_score(score: u8) -> Self {
        match score {
            0..=20 => QualityLabel::Poor,
            21..=40 => QualityLabel::Fair,
            41..=60 => QualityLabel::Good,
            61..=80 => QualityLabel::VeryGood,
            _ => QualityLabel::Excellent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLabel::Poor => "Poor",
            QualityLabel::Fair => "Fair",
            QualityLabel::Good => "Good",
            QualityLabel::VeryGood => "Very Good",
            QualityLabel::Excellent => "Excellent",
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_banding_edges() {
        assert_eq!(QualityLabel::for_summary_score(100), QualityLabel::Excellent);
        assert_eq!(QualityLabel::for_summary_score(90), QualityLabel::Excellent);
        assert_eq!(QualityLabel::for_summary_score(89), QualityLabel::VeryGood);
        assert_eq!(QualityLabel::for_summary_score(70), QualityLabel::Good);
        assert_eq!(QualityLabel::for_summary_score(60), QualityLabel::Fair);
        assert_eq!(QualityLabel::for_summary_score(59), QualityLabel::Poor);
        assert_eq!(QualityLabel::for_summary_score(0), QualityLabel::Poor);
    }

    #[test]
    fn labels_display_with_spaces() {
        assert_eq!(QualityLabel::VeryGood.to_string(), "Very Good");
    }
}
