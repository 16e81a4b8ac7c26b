use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::predict::{Observer, SightingParams};

const MAX_LOOK_AHEAD_DAYS: u32 = 60;
const MAX_STEP_SECONDS: i64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub observer: Observer,
    /// Body name exactly as it appears in the TLE source
    pub target: String,
    pub tle_url: String,
    pub tle_cache_path: PathBuf,
    pub tle_ttl_days: f64,
    pub roster_url: String,
    pub roster_craft: String,
    pub min_elevation_deg: f64,
    pub min_duration_minutes: u32,
    pub look_ahead_days: u32,
    pub darkness_threshold_deg: f64,
    pub step_seconds: i64,
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub roster_refresh_interval: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub grace_period: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            observer: Observer::default(),
            target: "ISS (ZARYA)".into(),
            tle_url: "https://celestrak.org/NORAD/elements/gp.php?GROUP=stations&FORMAT=tle".into(),
            tle_cache_path: PathBuf::from("stations.tle"),
            tle_ttl_days: 1.0,
            roster_url: "http://api.open-notify.org/astros.json".into(),
            roster_craft: "ISS".into(),
            min_elevation_deg: 20.0,
            min_duration_minutes: 2,
            look_ahead_days: 20,
            darkness_threshold_deg: -6.0,
            step_seconds: 1,
            poll_interval: Duration::from_secs(60),
            roster_refresh_interval: Duration::from_secs(60 * 60),
            grace_period: Duration::from_secs(60 * 60),
            request_timeout: Duration::from_secs(20),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !(-90.0..=90.0).contains(&self.observer.latitude) {
            return invalid(format!("latitude {} out of range", self.observer.latitude));
        }
        if !(-180.0..=180.0).contains(&self.observer.longitude) {
            return invalid(format!("longitude {} out of range", self.observer.longitude));
        }
        if !(0.0..90.0).contains(&self.min_elevation_deg) {
            return invalid(format!(
                "min_elevation_deg {} must be in [0, 90)",
                self.min_elevation_deg
            ));
        }
        if self.darkness_threshold_deg >= 0.0 {
            return invalid(format!(
                "darkness_threshold_deg {} must be below the horizon",
                self.darkness_threshold_deg
            ));
        }
        if !(1..=MAX_LOOK_AHEAD_DAYS).contains(&self.look_ahead_days) {
            return invalid(format!(
                "look_ahead_days {} must be in [1, {}]",
                self.look_ahead_days, MAX_LOOK_AHEAD_DAYS
            ));
        }
        if !(1..=MAX_STEP_SECONDS).contains(&self.step_seconds) {
            return invalid(format!(
                "step_seconds {} must be in [1, {}]",
                self.step_seconds, MAX_STEP_SECONDS
            ));
        }
        if self.tle_ttl_days <= 0.0 {
            return invalid("tle_ttl_days must be positive".into());
        }
        if self.target.trim().is_empty() {
            return invalid("target must not be empty".into());
        }
        if self.poll_interval.is_zero() {
            return invalid("poll_interval must be positive".into());
        }
        Ok(())
    }

    pub fn sighting_params(&self) -> SightingParams {
        SightingParams {
            min_elevation_deg: self.min_elevation_deg,
            min_duration_minutes: self.min_duration_minutes,
            look_ahead_days: self.look_ahead_days,
            darkness_threshold_deg: self.darkness_threshold_deg,
            step_seconds: self.step_seconds,
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}
