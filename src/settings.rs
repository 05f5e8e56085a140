use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::readiness::DetectorTimings;
use crate::state::Options;

pub const CURRENT_VERSION: u32 = 2;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "viewreel";

/// Readiness polling, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingSettings {
    #[serde(default = "default_availability_interval")]
    pub availability_interval: u64,
    #[serde(default = "default_availability_timeout")]
    pub availability_timeout: u64,
    #[serde(default = "default_interactivity_interval")]
    pub interactivity_interval: u64,
    #[serde(default = "default_interactivity_timeout")]
    pub interactivity_timeout: u64,
}

fn default_availability_interval() -> u64 {
    DetectorTimings::default().availability_interval
}

fn default_availability_timeout() -> u64 {
    DetectorTimings::default().availability_timeout
}

fn default_interactivity_interval() -> u64 {
    DetectorTimings::default().interactivity_interval
}

fn default_interactivity_timeout() -> u64 {
    DetectorTimings::default().interactivity_timeout
}

impl Default for TimingSettings {
    fn default() -> Self {
        DetectorTimings::default().into()
    }
}

impl From<DetectorTimings> for TimingSettings {
    fn from(t: DetectorTimings) -> Self {
        Self {
            availability_interval: t.availability_interval,
            availability_timeout: t.availability_timeout,
            interactivity_interval: t.interactivity_interval,
            interactivity_timeout: t.interactivity_timeout,
        }
    }
}

impl From<TimingSettings> for DetectorTimings {
    fn from(t: TimingSettings) -> Self {
        Self {
            availability_interval: t.availability_interval,
            availability_timeout: t.availability_timeout,
            interactivity_interval: t.interactivity_interval,
            interactivity_timeout: t.interactivity_timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub timings: TimingSettings,

    #[serde(default)]
    pub disable_animations: bool,

    #[serde(default)]
    pub no_scroll_override: bool,

    /// Reel default, `null` disables downscaling
    #[serde(default = "default_max_viewport_width")]
    pub max_viewport_width: Option<f64>,

    #[serde(default = "default_item_margin")]
    pub item_margin: f64,

    #[serde(default = "default_activate_key")]
    pub activate_key: u32,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_max_viewport_width() -> Option<f64> {
    Options::default().max_viewport_width
}

fn default_item_margin() -> f64 {
    Options::default().item_margin
}

fn default_activate_key() -> u32 {
    Options::default().activate_key
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            timings: TimingSettings::default(),
            disable_animations: false,
            no_scroll_override: false,
            max_viewport_width: default_max_viewport_width(),
            item_margin: default_item_margin(),
            activate_key: default_activate_key(),
        }
    }
}

impl Settings {
    pub fn detector_timings(&self) -> DetectorTimings {
        self.timings.into()
    }

    /// Layout options seeded from these settings
    pub fn options(&self) -> Options {
        Options {
            max_viewport_width: self.max_viewport_width,
            item_margin: self.item_margin,
            activate_key: self.activate_key,
            disable_animations: self.disable_animations,
            no_scroll_override: self.no_scroll_override,
            scroll_width: None,
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the default location, writing defaults there on first
/// run
pub fn load_settings() -> Settings {
    let Some(path) = default_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return Settings::default();
    };
    match load_settings_from_path(&path) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Falling back to default settings: {e:#}");
            Settings::default()
        }
    }
}

pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        let settings = Settings::default();
        save_settings_to_path(&settings, path)?;
        return Ok(settings);
    }

    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read settings {path:?}"))?;
    let mut settings: Settings = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse settings {path:?}"))?;
    debug!("Loaded settings from {path:?}");

    if settings.version < CURRENT_VERSION {
        migrate_settings(&mut settings);
        save_settings_to_path(&settings, path)?;
    }
    Ok(settings)
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // v1 stored no timings; a zero interval would spin the detector
    if settings.version < 2 {
        let defaults = TimingSettings::default();
        if settings.timings.availability_interval == 0 {
            settings.timings.availability_interval = defaults.availability_interval;
        }
        if settings.timings.interactivity_interval == 0 {
            settings.timings.interactivity_interval = defaults.interactivity_interval;
        }
    }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_path(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {parent:?}"))?;
        }
    }

    let mut content = String::from(SETTINGS_HEADER);
    content.push_str(&serde_yaml::to_string(settings)?);
    fs::write(path, content).with_context(|| format!("Failed to save settings to {path:?}"))?;
    debug!("Saved settings to {path:?}");
    Ok(())
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# viewreel settings
# ============================================================================
# timings: readiness polling in milliseconds
# max_viewport_width: widest breakpoint rendered at 1:1, null disables scaling
# activate_key: key code holding the device wall's pan/zoom layer

"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_run_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("viewreel").join("config.yaml");

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(path.exists());

        let reloaded = load_settings_from_path(&path).unwrap();
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 2\nitem_margin: 8\n").unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.item_margin, 8.0);
        assert_eq!(settings.activate_key, 16);
        assert_eq!(settings.max_viewport_width, Some(600.0));
        assert_eq!(settings.detector_timings(), DetectorTimings::default());
    }

    #[test]
    fn test_old_version_is_migrated_and_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "version: 1\ntimings:\n  availability_interval: 0\n  interactivity_interval: 0\n",
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.version, CURRENT_VERSION);
        assert_eq!(settings.timings.availability_interval, 30);
        assert_eq!(settings.timings.interactivity_interval, 200);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("version: 2"));
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "item_margin: [oops").unwrap();
        assert!(load_settings_from_path(&path).is_err());
    }

    #[test]
    fn test_options_carry_settings() {
        let settings = Settings {
            max_viewport_width: None,
            disable_animations: true,
            ..Settings::default()
        };
        let options = settings.options();
        assert_eq!(options.max_viewport_width, None);
        assert!(options.disable_animations);
        assert_eq!(options.item_margin, 20.0);
    }
}
