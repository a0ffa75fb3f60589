use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

pub const MIN_SENSITIVITY: u8 = 1;
pub const MAX_SENSITIVITY: u8 = 10;
pub const MIN_UPDATE_INTERVAL_SECS: u32 = 1;
pub const MAX_UPDATE_INTERVAL_SECS: u32 = 30;
pub const MIN_SMART_ALARM_WINDOW_MINS: u32 = 5;
pub const MAX_SMART_ALARM_WINDOW_MINS: u32 = 45;

/// Sensitivity level that maps to a gain of exactly 1.0.
const NEUTRAL_SENSITIVITY: f32 = 5.0;

/// User-tunable tracking parameters. The host owns storage and UI of these;
/// the tracking core only reads the current values when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackingSettings {
    pub motion_sensitivity: u8,
    pub audio_sensitivity: u8,
    /// Seconds between recorded samples.
    pub update_interval: u32,
    pub use_smart_alarm: bool,
    /// Minutes before the deadline in which a light-sleep wake is allowed.
    pub smart_alarm_window: u32,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            motion_sensitivity: 5,
            audio_sensitivity: 5,
            update_interval: 5,
            use_smart_alarm: true,
            smart_alarm_window: 30,
        }
    }
}

impl TrackingSettings {
    pub fn validate(&self) -> Result<()> {
        check_range(
            "motionSensitivity",
            u32::from(self.motion_sensitivity),
            u32::from(MIN_SENSITIVITY),
            u32::from(MAX_SENSITIVITY),
        )?;
        check_range(
            "audioSensitivity",
            u32::from(self.audio_sensitivity),
            u32::from(MIN_SENSITIVITY),
            u32::from(MAX_SENSITIVITY),
        )?;
        check_range(
            "updateInterval",
            self.update_interval,
            MIN_UPDATE_INTERVAL_SECS,
            MAX_UPDATE_INTERVAL_SECS,
        )?;
        check_range(
            "smartAlarmWindow",
            self.smart_alarm_window,
            MIN_SMART_ALARM_WINDOW_MINS,
            MAX_SMART_ALARM_WINDOW_MINS,
        )
    }

    pub fn clamped(&self) -> Self {
        Self {
            motion_sensitivity: self
                .motion_sensitivity
                .clamp(MIN_SENSITIVITY, MAX_SENSITIVITY),
            audio_sensitivity: self
                .audio_sensitivity
                .clamp(MIN_SENSITIVITY, MAX_SENSITIVITY),
            update_interval: self
                .update_interval
                .clamp(MIN_UPDATE_INTERVAL_SECS, MAX_UPDATE_INTERVAL_SECS),
            use_smart_alarm: self.use_smart_alarm,
            smart_alarm_window: self
                .smart_alarm_window
                .clamp(MIN_SMART_ALARM_WINDOW_MINS, MAX_SMART_ALARM_WINDOW_MINS),
        }
    }

    pub fn motion_gain(&self) -> f32 {
        sensitivity_gain(self.motion_sensitivity)
    }

    pub fn audio_gain(&self) -> f32 {
        sensitivity_gain(self.audio_sensitivity)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.update_interval))
    }

    /// Smart-alarm window in milliseconds, `None` when the smart alarm is off.
    pub fn smart_window_ms(&self) -> Option<i64> {
        self.use_smart_alarm
            .then(|| i64::from(self.smart_alarm_window) * 60_000)
    }
}

fn sensitivity_gain(level: u8) -> f32 {
    f32::from(level.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY)) / NEUTRAL_SENSITIVITY
}

fn check_range(field: &str, value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        bail!("{field} must be within {min}..={max}, got {value}");
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    tracking: TrackingSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Settings file {} is unreadable ({err}); using defaults",
                    path.display()
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn tracking(&self) -> TrackingSettings {
        self.read().tracking.clone()
    }

    pub fn update_tracking(&self, settings: TrackingSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        let updated = UserSettings { tracking: settings };
        self.persist(&updated)?;
        *guard = updated;
        info!("Tracking settings updated: {:?}", guard.tracking);
        Ok(())
    }

    /// Restore every setting to its default and persist. The cached settings
    /// are left alone when the write fails.
    pub fn reset(&self) -> Result<()> {
        let mut guard = self.write();
        let defaults = UserSettings::default();
        self.persist(&defaults)?;
        *guard = defaults;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)
            .map_err(|err| anyhow!("invalid settings file {}: {err}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = TrackingSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.motion_gain(), 1.0);
        assert_eq!(settings.tick_interval(), Duration::from_secs(5));
        assert_eq!(settings.smart_window_ms(), Some(30 * 60_000));
    }

    #[test]
    fn out_of_range_values_are_rejected_and_clamped() {
        let settings = TrackingSettings {
            motion_sensitivity: 0,
            audio_sensitivity: 11,
            update_interval: 60,
            use_smart_alarm: false,
            smart_alarm_window: 2,
        };
        assert!(settings.validate().is_err());

        let clamped = settings.clamped();
        assert!(clamped.validate().is_ok());
        assert_eq!(clamped.motion_sensitivity, 1);
        assert_eq!(clamped.audio_sensitivity, 10);
        assert_eq!(clamped.update_interval, 30);
        assert_eq!(clamped.smart_alarm_window, 5);
        assert_eq!(clamped.smart_window_ms(), None);
    }

    #[test]
    fn gain_grows_with_sensitivity() {
        assert!(sensitivity_gain(10) > sensitivity_gain(5));
        assert!(sensitivity_gain(5) > sensitivity_gain(1));
        assert_eq!(sensitivity_gain(10), 2.0);
    }

    #[test]
    fn store_persists_and_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).expect("store");
        assert_eq!(store.tracking(), TrackingSettings::default());

        let updated = TrackingSettings {
            update_interval: 30,
            use_smart_alarm: false,
            ..TrackingSettings::default()
        };
        store.update_tracking(updated.clone()).expect("update");

        let reopened = SettingsStore::new(path).expect("reopen");
        assert_eq!(reopened.tracking(), updated);

        reopened.reset().expect("reset");
        reopened.reload().expect("reload");
        assert_eq!(reopened.tracking(), TrackingSettings::default());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").expect("write");

        let store = SettingsStore::new(path).expect("store");
        assert_eq!(store.tracking(), TrackingSettings::default());
        assert!(store.reload().is_err());
    }

    #[test]
    fn invalid_update_is_not_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("settings.json")).expect("store");
        let bad = TrackingSettings {
            update_interval: 0,
            ..TrackingSettings::default()
        };
        assert!(store.update_tracking(bad).is_err());
        assert_eq!(store.tracking(), TrackingSettings::default());
    }

    #[test]
    fn failed_write_keeps_cached_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").expect("write");
        let store = SettingsStore::new(blocker.join("settings.json")).expect("store");

        let updated = TrackingSettings {
            update_interval: 30,
            ..TrackingSettings::default()
        };
        assert!(store.update_tracking(updated).is_err());
        assert_eq!(store.tracking(), TrackingSettings::default());
    }

    #[test]
    fn failed_reset_keeps_cached_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let updated = TrackingSettings {
            update_interval: 30,
            ..TrackingSettings::default()
        };
        SettingsStore::new(path.clone())
            .expect("store")
            .update_tracking(updated.clone())
            .expect("update");

        let store = SettingsStore::new(path.clone()).expect("reopen");
        fs::remove_file(&path).expect("remove");
        fs::create_dir(&path).expect("mkdir");

        assert!(store.reset().is_err());
        assert_eq!(store.tracking(), updated);
    }
}
