use std::fmt::Write as _;

use crate::{db::models::SessionSummaryRow, signal::SNORE_THRESHOLD};

use super::QualityMetrics;

pub const INSUFFICIENT_DATA: &str = "Insufficient data for analysis";

/// Human-readable trend report for a session, or [`INSUFFICIENT_DATA`] when the
/// session has no stored samples.
pub fn quality_trend(metrics: &QualityMetrics, row: Option<&SessionSummaryRow>) -> String {
    let Some(row) = row else {
        return INSUFFICIENT_DATA.to_string();
    };
    if metrics.total_readings == 0 {
        return INSUFFICIENT_DATA.to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Sleep Quality Analysis:");
    let _ = writeln!(out, "- Quality Score: {}%", metrics.quality_score());
    let _ = writeln!(out, "- Assessment: {}", metrics.qualitative_assessment());
    let _ = writeln!(out);
    let _ = writeln!(out, "Motion Analysis:");
    let _ = writeln!(out, "- Average: {:.2}", row.avg_motion);
    let _ = writeln!(out, "- Maximum: {:.2}", metrics.max_motion);
    let _ = writeln!(out);
    let _ = writeln!(out, "Audio Analysis:");
    let _ = writeln!(out, "- Average: {:.2}", row.avg_audio_level);
    let _ = writeln!(out, "- Maximum: {:.2}", metrics.max_audio);
    if metrics.max_audio > SNORE_THRESHOLD {
        let _ = writeln!(out, "- Potential snoring detected");
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Session Duration: {}",
        format_duration(row.session_start, row.last_timestamp)
    );
    out
}

pub fn format_duration(start_ms: i64, end_ms: i64) -> String {
    if end_ms <= start_ms {
        return "Unknown duration".to_string();
    }
    let total_secs = (end_ms - start_ms) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours} hours {minutes} minutes {seconds} seconds")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(start: i64, last: i64) -> SessionSummaryRow {
        SessionSummaryRow {
            avg_motion: 0.12,
            avg_audio_level: 0.2,
            session_start: start,
            alarm_time: 0,
            last_timestamp: last,
        }
    }

    fn metrics(max_audio: f32) -> QualityMetrics {
        QualityMetrics {
            total_readings: 4,
            avg_motion: 0.12,
            max_motion: 0.5,
            avg_audio: 0.2,
            max_audio,
        }
    }

    #[test]
    fn formats_hours_minutes_seconds() {
        let start = 1_000_000;
        let end = start + (7 * 3600 + 25 * 60 + 9) * 1000 + 400;
        assert_eq!(format_duration(start, end), "7 hours 25 minutes 9 seconds");
        assert_eq!(format_duration(end, start), "Unknown duration");
        assert_eq!(format_duration(start, start), "Unknown duration");
    }

    #[test]
    fn missing_session_is_insufficient() {
        assert_eq!(quality_trend(&metrics(0.3), None), INSUFFICIENT_DATA);
        assert_eq!(
            quality_trend(&QualityMetrics::default(), Some(&row(1, 2))),
            INSUFFICIENT_DATA
        );
    }

    #[test]
    fn flags_potential_snoring_on_loud_peaks() {
        let quiet = quality_trend(&metrics(0.3), Some(&row(0, 3_600_000)));
        assert!(!quiet.contains("Potential snoring"));
        assert!(quiet.contains("Session Duration: 1 hours 0 minutes 0 seconds"));

        let loud = quality_trend(&metrics(0.8), Some(&row(0, 3_600_000)));
        assert!(loud.contains("- Potential snoring detected"));
        assert!(loud.contains("- Average: 0.12"));
    }
}
