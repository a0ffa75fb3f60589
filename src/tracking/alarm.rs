use anyhow::{anyhow, Result};
use chrono::{DateTime, Days, NaiveDate, TimeZone};

pub const SNOOZE_MS: i64 = 2 * 60 * 1000;

/// Wall-clock helpers for choosing an alarm deadline.
pub struct AlarmSchedule;

impl AlarmSchedule {
    /// Next occurrence of `hour:minute` in `now`'s time zone. A time that is not
    /// strictly in the future today rolls over to tomorrow.
    pub fn next_occurrence<Tz: TimeZone>(
        hour: u32,
        minute: u32,
        now: &DateTime<Tz>,
    ) -> Result<DateTime<Tz>> {
        let today = now.date_naive();
        let candidate = Self::resolve(today, hour, minute, now)?;
        if candidate > *now {
            return Ok(candidate);
        }

        let tomorrow = today
            .checked_add_days(Days::new(1))
            .ok_or_else(|| anyhow!("no calendar day after {today}"))?;
        Self::resolve(tomorrow, hour, minute, now)
    }

    /// Deadline for a snoozed alarm.
    pub fn snooze(now_ms: i64) -> i64 {
        now_ms + SNOOZE_MS
    }

    fn resolve<Tz: TimeZone>(
        date: NaiveDate,
        hour: u32,
        minute: u32,
        now: &DateTime<Tz>,
    ) -> Result<DateTime<Tz>> {
        let naive = date
            .and_hms_opt(hour, minute, 0)
            .ok_or_else(|| anyhow!("invalid alarm time {hour:02}:{minute:02}"))?;
        now.timezone()
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| anyhow!("alarm time {naive} does not exist in the local time zone"))
    }
}

/// True once the hard deadline has been reached. No deadline when `alarm_time` is 0.
pub fn deadline_reached(now_ms: i64, alarm_time: i64) -> bool {
    alarm_time > 0 && now_ms >= alarm_time
}

/// True inside the final `window_ms` before the deadline.
pub fn in_smart_window(now_ms: i64, alarm_time: i64, window_ms: i64) -> bool {
    alarm_time > 0 && now_ms >= alarm_time - window_ms && now_ms < alarm_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike, Utc};

    #[test]
    fn later_today_stays_today() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 22, 15, 0).unwrap();
        let next = AlarmSchedule::next_occurrence(23, 30, &now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap());
    }

    #[test]
    fn past_time_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 22, 15, 0).unwrap();
        let next = AlarmSchedule::next_occurrence(6, 45, &now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 11, 6, 45, 0).unwrap());

        let exact = AlarmSchedule::next_occurrence(22, 15, &now).unwrap();
        assert_eq!(exact.day(), 11);
        assert_eq!(exact.hour(), 22);
    }

    #[test]
    fn rejects_impossible_times() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 22, 15, 0).unwrap();
        assert!(AlarmSchedule::next_occurrence(24, 0, &now).is_err());
        assert!(AlarmSchedule::next_occurrence(7, 60, &now).is_err());
    }

    #[test]
    fn snooze_adds_two_minutes() {
        assert_eq!(AlarmSchedule::snooze(1_000), 121_000);
    }

    #[test]
    fn window_and_deadline() {
        let alarm = 10_000_000;
        let window = 30 * 60 * 1000;
        assert!(!in_smart_window(alarm - window - 1, alarm, window));
        assert!(in_smart_window(alarm - window, alarm, window));
        assert!(!in_smart_window(alarm, alarm, window));
        assert!(!in_smart_window(alarm - 1, 0, window));

        assert!(!deadline_reached(alarm - 1, alarm));
        assert!(deadline_reached(alarm, alarm));
        assert!(!deadline_reached(i64::MAX, 0));
    }
}
