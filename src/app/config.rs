use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::coords::{OverrideRule, Point};
use crate::app::error::AppError;
use crate::app::models::Resolution;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdbSettings {
    /// Path to the adb binary; empty means `adb` on PATH.
    pub command_path: String,
    pub command_timeout_secs: u64,
}

impl Default for AdbSettings {
    fn default() -> Self {
        Self {
            command_path: String::new(),
            command_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrcpySettings {
    pub command_path: String,
    /// `--max-size` value; 0 leaves the flag off.
    pub max_size: u32,
    pub extra_args: String,
}

impl Default for ScrcpySettings {
    fn default() -> Self {
        Self {
            command_path: String::new(),
            max_size: 0,
            extra_args: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSettings {
    /// Broadcast action handled by the companion clipboard app.
    pub clipboard_action: String,
    pub reference_point: Point,
    pub reference_resolution: Resolution,
    /// Priority-ordered; first matching resolution wins. Empirically tuned
    /// per physical device, kept as data so they can be revalidated or
    /// removed without a rebuild.
    pub overrides: Vec<OverrideRule>,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            clipboard_action: "clipper.set".to_string(),
            reference_point: Point::new(100, 1450),
            reference_resolution: Resolution::new(720, 1600),
            overrides: vec![
                OverrideRule {
                    resolution: Resolution::new(1440, 3120),
                    point: Point::new(300, 3000),
                },
                OverrideRule {
                    resolution: Resolution::new(1096, 2560),
                    point: Point::new(200, 2400),
                },
                OverrideRule {
                    resolution: Resolution::new(720, 1560),
                    point: Point::new(200, 1470),
                },
                OverrideRule {
                    resolution: Resolution::new(1440, 3200),
                    point: Point::new(433, 2331),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackSettings {
    /// Delay after each injection before the next countdown starts.
    pub settle_ms: u64,
    /// Pause/stop poll granularity for worker countdowns.
    pub poll_interval_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            settle_ms: 1_000,
            poll_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferSettings {
    pub default_remote_dir: String,
    pub timeout_secs: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            default_remote_dir: "/sdcard/".to_string(),
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub adb: AdbSettings,
    #[serde(default)]
    pub scrcpy: ScrcpySettings,
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub playback: PlaybackSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
    #[serde(default)]
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            adb: AdbSettings::default(),
            scrcpy: ScrcpySettings::default(),
            input: InputSettings::default(),
            playback: PlaybackSettings::default(),
            transfer: TransferSettings::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("ADBCAST_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".adbcast.json")
}

pub fn backup_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".adbcast.backup.json")
}

pub fn load_config() -> Result<AppConfig, AppError> {
    load_config_from_path(&config_path())
}

pub fn save_config(config: &AppConfig) -> Result<(), AppError> {
    save_config_to_path(config, &config_path(), &backup_config_path())
}

pub fn load_config_from_path(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read config: {err}"), ""))?;
    let config: AppConfig = serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse config: {err}"), ""))?;
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &AppConfig,
    path: &Path,
    backup_path: &Path,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AppError::system(format!("Failed to serialize config: {err}"), ""))?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write config: {err}"), ""))?;
    Ok(())
}

fn validate_config(mut config: AppConfig) -> AppConfig {
    if config.adb.command_timeout_secs == 0 {
        config.adb.command_timeout_secs = 10;
    }
    if config.playback.poll_interval_ms < 10 {
        config.playback.poll_interval_ms = 100;
    }
    if config.input.reference_resolution.width == 0
        || config.input.reference_resolution.height == 0
    {
        config.input.reference_resolution = Resolution::new(720, 1600);
    }
    if config.transfer.timeout_secs == 0 {
        config.transfer.timeout_secs = 600;
    }
    if config.transfer.default_remote_dir.trim().is_empty() {
        config.transfer.default_remote_dir = "/sdcard/".to_string();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_overrides_hold_the_tuned_rules() {
        let config = AppConfig::default();
        assert_eq!(config.input.overrides.len(), 4);
        assert_eq!(
            config.input.overrides[0].resolution,
            Resolution::new(1440, 3120)
        );
        assert_eq!(config.input.overrides[0].point, Point::new(300, 3000));
        assert_eq!(
            config.input.overrides[3].resolution,
            Resolution::new(1440, 3200)
        );
        assert_eq!(config.input.overrides[3].point, Point::new(433, 2331));
    }

    #[test]
    fn clamps_invalid_values() {
        let mut config = AppConfig::default();
        config.adb.command_timeout_secs = 0;
        config.playback.poll_interval_ms = 1;
        config.input.reference_resolution = Resolution::new(0, 1600);
        config.transfer.default_remote_dir = "  ".to_string();
        let validated = validate_config(config);
        assert_eq!(validated.adb.command_timeout_secs, 10);
        assert_eq!(validated.playback.poll_interval_ms, 100);
        assert_eq!(validated.input.reference_resolution, Resolution::new(720, 1600));
        assert_eq!(validated.transfer.default_remote_dir, "/sdcard/");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from_path(&dir.path().join("absent.json")).expect("load");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn save_then_load_round_trips_and_backs_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let backup = dir.path().join("config.backup.json");

        let mut config = AppConfig::default();
        config.scrcpy.max_size = 1080;
        save_config_to_path(&config, &path, &backup).expect("save");
        assert!(!backup.exists());

        config.scrcpy.max_size = 720;
        save_config_to_path(&config, &path, &backup).expect("save again");
        assert!(backup.exists());

        let loaded = load_config_from_path(&path).expect("load");
        assert_eq!(loaded.scrcpy.max_size, 720);
    }

    #[test]
    fn partial_file_fills_missing_sections_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"scrcpy": {"command_path": "", "max_size": 800, "extra_args": ""}}"#)
            .expect("write");
        let loaded = load_config_from_path(&path).expect("load");
        assert_eq!(loaded.scrcpy.max_size, 800);
        assert_eq!(loaded.playback.settle_ms, 1_000);
        assert_eq!(loaded.input.overrides.len(), 4);
    }
}
