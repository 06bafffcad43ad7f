// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Every threshold here is a policy knob rather than an invariant: the
//! defaults match the tuning the app ships with, and each can be
//! overridden through a `STATE_PASSPORT_*` variable (or a `.env` file).

use crate::models::NotificationPreference;
use chrono::Duration;
use std::env;
use std::str::FromStr;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GeoJSON file holding the region boundaries.
    pub boundaries_path: String,
    /// Directory for the local key-value store.
    pub data_dir: String,
    /// Base URL of the fact-content service (optional).
    pub fact_service_url: Option<String>,
    pub index: IndexConfig,
    pub filter: FilterConfig,
    pub detector: DetectorConfig,
    pub notifications: NotificationConfig,
    pub sync: SyncConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            boundaries_path: "data/us_states_sample.geojson".to_string(),
            data_dir: "state-passport-data".to_string(),
            fact_service_url: None,
            index: IndexConfig::default(),
            filter: FilterConfig::default(),
            detector: DetectorConfig::default(),
            notifications: NotificationConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// Spatial index and coordinate cache tuning.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Items a quadtree leaf holds before it subdivides.
    pub node_capacity: usize,
    /// Maximum quadtree depth.
    pub max_depth: u32,
    /// Maximum number of cached coordinate lookups.
    pub cache_capacity: usize,
    /// Decimal places kept in cache keys (4 places is roughly 11m).
    pub cache_precision_decimals: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            node_capacity: 8,
            max_depth: 12,
            cache_capacity: 100,
            cache_precision_decimals: 4,
        }
    }
}

/// Bounds for accepting a raw positioning fix.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub max_horizontal_accuracy_m: f64,
    /// Fixes moving faster than this are treated as in-vehicle or in-flight.
    pub max_speed_mps: f64,
    pub max_altitude_m: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_horizontal_accuracy_m: 1000.0,
            max_speed_mps: 45.0,
            max_altitude_m: 3000.0,
        }
    }
}

/// Region transition detector tuning.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Consecutive unresolved fixes before fallback detection kicks in.
    pub miss_threshold: u32,
    /// Radii (meters) of the offset grids probed around an unresolved fix.
    pub grid_radii_m: Vec<f64>,
    /// A previously seen region within this distance counts as a weak match.
    pub proximity_radius_m: f64,
    /// ...but only if it was seen within this long.
    pub proximity_max_age: Duration,
    /// Jumps longer than this from the previous region are provisional.
    pub airport_distance_m: f64,
    /// How long a provisional detection waits for its confirming fix.
    pub airport_confirm_window: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            miss_threshold: 3,
            grid_radii_m: vec![1_000.0, 2_000.0, 5_000.0],
            proximity_radius_m: 10_000.0,
            proximity_max_age: Duration::hours(1),
            airport_distance_m: 100_000.0,
            airport_confirm_window: Duration::minutes(10),
        }
    }
}

/// Notification decision and achievement evaluation tuning.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub preference: NotificationPreference,
    /// How long after foregrounding a re-detected region is a duplicate.
    pub foreground_grace: Duration,
    /// Minimum spacing between any two fired notifications.
    pub min_interval: Duration,
    /// Upper bound on waiting for the fact-content service.
    pub fact_timeout: std::time::Duration,
    /// Achievement titles listed in one notification before "+N more".
    pub max_listed_achievements: usize,
    /// Region left out of count- and set-based achievements.
    pub excluded_region: Option<String>,
    /// Whether manually added regions count toward achievements.
    pub count_manual_visits: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            preference: NotificationPreference::AllRegions,
            foreground_grace: Duration::seconds(5),
            min_interval: Duration::seconds(30),
            fact_timeout: std::time::Duration::from_secs(5),
            max_listed_achievements: 3,
            excluded_region: Some("District of Columbia".to_string()),
            count_manual_visits: false,
        }
    }
}

/// Remote synchronization tuning.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the remote record store (sync is disabled when unset).
    pub remote_url: Option<String>,
    /// Attempts for both transient failures and write conflicts.
    pub max_attempts: u32,
    /// First retry delay; doubles on each further attempt.
    pub base_backoff: std::time::Duration,
    pub request_timeout: std::time::Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            max_attempts: 3,
            base_backoff: std::time::Duration::from_millis(500),
            request_timeout: std::time::Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to the defaults; set-but-unparseable
    /// variables are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Config::default();

        let preference = match env::var("STATE_PASSPORT_NOTIFY") {
            Ok(value) => value
                .parse::<NotificationPreference>()
                .map_err(|_| ConfigError::Invalid("STATE_PASSPORT_NOTIFY", value))?,
            Err(_) => defaults.notifications.preference,
        };

        let excluded_region = match env::var("STATE_PASSPORT_EXCLUDED_REGION") {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(value.trim().to_string()),
            Err(_) => defaults.notifications.excluded_region.clone(),
        };

        let grid_radii_m = match env::var("STATE_PASSPORT_GRID_RADII_M") {
            Ok(value) => parse_list(&value)
                .ok_or(ConfigError::Invalid("STATE_PASSPORT_GRID_RADII_M", value))?,
            Err(_) => defaults.detector.grid_radii_m.clone(),
        };

        Ok(Self {
            boundaries_path: env::var("STATE_PASSPORT_BOUNDARIES")
                .unwrap_or(defaults.boundaries_path),
            data_dir: env::var("STATE_PASSPORT_DATA_DIR").unwrap_or(defaults.data_dir),
            fact_service_url: optional_var("STATE_PASSPORT_FACT_URL"),
            index: IndexConfig {
                node_capacity: parse_var(
                    "STATE_PASSPORT_INDEX_NODE_CAPACITY",
                    defaults.index.node_capacity,
                )?,
                max_depth: parse_var("STATE_PASSPORT_INDEX_MAX_DEPTH", defaults.index.max_depth)?,
                cache_capacity: parse_var(
                    "STATE_PASSPORT_CACHE_CAPACITY",
                    defaults.index.cache_capacity,
                )?,
                cache_precision_decimals: parse_var(
                    "STATE_PASSPORT_CACHE_PRECISION",
                    defaults.index.cache_precision_decimals,
                )?,
            },
            filter: FilterConfig {
                max_horizontal_accuracy_m: parse_var(
                    "STATE_PASSPORT_MAX_ACCURACY_M",
                    defaults.filter.max_horizontal_accuracy_m,
                )?,
                max_speed_mps: parse_var(
                    "STATE_PASSPORT_MAX_SPEED_MPS",
                    defaults.filter.max_speed_mps,
                )?,
                max_altitude_m: parse_var(
                    "STATE_PASSPORT_MAX_ALTITUDE_M",
                    defaults.filter.max_altitude_m,
                )?,
            },
            detector: DetectorConfig {
                miss_threshold: parse_var(
                    "STATE_PASSPORT_MISS_THRESHOLD",
                    defaults.detector.miss_threshold,
                )?,
                grid_radii_m,
                proximity_radius_m: parse_var(
                    "STATE_PASSPORT_PROXIMITY_RADIUS_M",
                    defaults.detector.proximity_radius_m,
                )?,
                proximity_max_age: Duration::seconds(parse_var(
                    "STATE_PASSPORT_PROXIMITY_MAX_AGE_SECS",
                    defaults.detector.proximity_max_age.num_seconds(),
                )?),
                airport_distance_m: parse_var(
                    "STATE_PASSPORT_AIRPORT_DISTANCE_M",
                    defaults.detector.airport_distance_m,
                )?,
                airport_confirm_window: Duration::seconds(parse_var(
                    "STATE_PASSPORT_AIRPORT_WINDOW_SECS",
                    defaults.detector.airport_confirm_window.num_seconds(),
                )?),
            },
            notifications: NotificationConfig {
                preference,
                foreground_grace: Duration::seconds(parse_var(
                    "STATE_PASSPORT_FOREGROUND_GRACE_SECS",
                    defaults.notifications.foreground_grace.num_seconds(),
                )?),
                min_interval: Duration::seconds(parse_var(
                    "STATE_PASSPORT_MIN_INTERVAL_SECS",
                    defaults.notifications.min_interval.num_seconds(),
                )?),
                fact_timeout: std::time::Duration::from_secs(parse_var(
                    "STATE_PASSPORT_FACT_TIMEOUT_SECS",
                    defaults.notifications.fact_timeout.as_secs(),
                )?),
                max_listed_achievements: parse_var(
                    "STATE_PASSPORT_MAX_LISTED_ACHIEVEMENTS",
                    defaults.notifications.max_listed_achievements,
                )?,
                excluded_region,
                count_manual_visits: parse_var(
                    "STATE_PASSPORT_COUNT_MANUAL_VISITS",
                    defaults.notifications.count_manual_visits,
                )?,
            },
            sync: SyncConfig {
                remote_url: optional_var("STATE_PASSPORT_REMOTE_URL"),
                max_attempts: parse_var(
                    "STATE_PASSPORT_SYNC_ATTEMPTS",
                    defaults.sync.max_attempts,
                )?,
                base_backoff: std::time::Duration::from_millis(parse_var(
                    "STATE_PASSPORT_SYNC_BACKOFF_MS",
                    defaults.sync.base_backoff.as_millis() as u64,
                )?),
                request_timeout: std::time::Duration::from_secs(parse_var(
                    "STATE_PASSPORT_SYNC_TIMEOUT_SECS",
                    defaults.sync.request_timeout.as_secs(),
                )?),
            },
        })
    }
}

/// Read a variable, treating empty values as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back to `default` when it is unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, value)),
        Err(_) => Ok(default),
    }
}

/// Parse a comma-separated list of numbers.
fn parse_list(value: &str) -> Option<Vec<f64>> {
    value
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_shipped_tuning() {
        let config = Config::default();

        assert_eq!(config.filter.max_speed_mps, 45.0);
        assert_eq!(config.filter.max_altitude_m, 3000.0);
        assert_eq!(config.detector.miss_threshold, 3);
        assert_eq!(config.detector.grid_radii_m, vec![1_000.0, 2_000.0, 5_000.0]);
        assert_eq!(config.detector.airport_confirm_window, Duration::minutes(10));
        assert_eq!(config.notifications.min_interval, Duration::seconds(30));
        assert_eq!(config.index.cache_capacity, 100);
        assert_eq!(config.sync.max_attempts, 3);
    }

    #[test]
    fn test_config_from_env() {
        // Each variable is only touched by this test.
        env::set_var("STATE_PASSPORT_MAX_SPEED_MPS", "30.5");
        env::set_var("STATE_PASSPORT_NOTIFY", "new_regions_only");
        env::set_var("STATE_PASSPORT_GRID_RADII_M", "500, 1500");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.filter.max_speed_mps, 30.5);
        assert_eq!(
            config.notifications.preference,
            NotificationPreference::NewRegionsOnly
        );
        assert_eq!(config.detector.grid_radii_m, vec![500.0, 1500.0]);

        env::remove_var("STATE_PASSPORT_MAX_SPEED_MPS");
        env::remove_var("STATE_PASSPORT_NOTIFY");
        env::remove_var("STATE_PASSPORT_GRID_RADII_M");
    }

    #[test]
    fn test_parse_list_rejects_garbage() {
        assert_eq!(parse_list("1,2"), Some(vec![1.0, 2.0]));
        assert_eq!(parse_list("1,abc"), None);
    }
}
