use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::coords::{GroundStation, TransformBackend};
use crate::propagation::TimeSeriesMode;

/// Hard upper bound on propagation workers.
pub const MAX_WORKERS: usize = 16;

/// Longest accepted orbital period (two days, well past geostationary).
pub const MAX_ORBITAL_PERIOD_MINUTES: f64 = 2880.0;

/// Most samples one satellite's series may hold.
pub const MAX_SERIES_LENGTH: i64 = 100_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("no elevation threshold configured for constellation {0}")]
    MissingElevationThreshold(String),
    #[error("no orbital period configured for constellation {0}")]
    MissingOrbitalPeriod(String),
    #[error("satellite {satellite} does not match any configured constellation")]
    UnknownConstellation { satellite: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub observer: ObserverConfig,
    pub time_series: TimeSeriesConfig,
    #[serde(default)]
    pub propagation: PropagationConfig,
    pub constellations: BTreeMap<String, ConstellationConfig>,
    #[serde(default)]
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObserverConfig {
    pub name: Option<String>,
    pub coordinates: String,
    #[serde(default)]
    pub altitude_m: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeSeriesConfig {
    #[serde(default)]
    pub mode: TimeSeriesMode,
    #[serde(deserialize_with = "deserialize_duration")]
    pub sampling_interval: Duration,
    #[serde(default)]
    pub unified: UnifiedWindowConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnifiedWindowConfig {
    #[serde(default)]
    pub reference_time: Option<DateTime<Utc>>,
    #[serde(
        default = "default_tolerance",
        deserialize_with = "deserialize_duration"
    )]
    pub tolerance: Duration,
    #[serde(default = "default_min_compliance")]
    pub min_compliance: f64,
    #[serde(default)]
    pub exclude_out_of_tolerance: bool,
}

impl Default for UnifiedWindowConfig {
    fn default() -> Self {
        Self {
            reference_time: None,
            tolerance: default_tolerance(),
            min_compliance: default_min_compliance(),
            exclude_out_of_tolerance: false,
        }
    }
}

fn default_tolerance() -> Duration {
    Duration::hours(12)
}

fn default_min_compliance() -> f64 {
    0.8
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropagationConfig {
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_min_parallel_batch")]
    pub min_parallel_batch: usize,
    #[serde(default)]
    pub gpu_enabled: bool,
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub deadline: Option<Duration>,
    #[serde(
        default = "default_max_backward",
        deserialize_with = "deserialize_duration"
    )]
    pub max_backward: Duration,
    #[serde(default)]
    pub transform_backend: TransformBackend,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            workers: None,
            min_parallel_batch: default_min_parallel_batch(),
            gpu_enabled: false,
            deadline: None,
            max_backward: default_max_backward(),
            transform_backend: TransformBackend::default(),
        }
    }
}

impl PropagationConfig {
    /// Requested worker count clamped to the available cores and `MAX_WORKERS`.
    pub fn effective_workers(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.workers
            .unwrap_or(available)
            .min(available)
            .min(MAX_WORKERS)
            .max(1)
    }
}

fn default_min_parallel_batch() -> usize {
    32
}

fn default_max_backward() -> Duration {
    Duration::days(7)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConstellationConfig {
    /// Case-insensitive substrings of the satellite name. Defaults to the
    /// constellation key itself.
    #[serde(default)]
    pub name_patterns: Vec<String>,
    pub elevation_threshold_deg: Option<f64>,
    pub orbital_period_minutes: Option<f64>,
    #[serde(default)]
    pub min_distance_km: f64,
    #[serde(default)]
    pub max_distance_km: Option<f64>,
    #[serde(default = "default_altitude_range")]
    pub altitude_range_km: [f64; 2],
}

fn default_altitude_range() -> [f64; 2] {
    [160.0, 2000.0]
}

impl ConstellationConfig {
    pub fn elevation_threshold(&self, name: &str) -> Result<f64, ConfigError> {
        self.elevation_threshold_deg
            .ok_or_else(|| ConfigError::MissingElevationThreshold(name.to_string()))
    }

    pub fn orbital_period(&self, name: &str) -> Result<Duration, ConfigError> {
        let minutes = self
            .orbital_period_minutes
            .ok_or_else(|| ConfigError::MissingOrbitalPeriod(name.to_string()))?;
        if !(minutes.is_finite() && minutes > 0.0 && minutes <= MAX_ORBITAL_PERIOD_MINUTES) {
            return Err(ConfigError::Invalid(format!(
                "{}: orbital_period_minutes {} outside (0, {}]",
                name, minutes, MAX_ORBITAL_PERIOD_MINUTES
            )));
        }
        Duration::try_milliseconds((minutes * 60_000.0).round() as i64).ok_or_else(|| {
            ConfigError::Invalid(format!("{}: orbital period out of range", name))
        })
    }

    fn matches(&self, key: &str, satellite_name: &str) -> bool {
        let name = satellite_name.to_uppercase();
        if self.name_patterns.is_empty() {
            return name.contains(&key.to_uppercase());
        }
        self.name_patterns
            .iter()
            .any(|p| name.contains(&p.to_uppercase()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub min_connectivity_ratio: f64,
    #[serde(default)]
    pub target_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connectivity_ratio: 0.0,
            target_size: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every required value up front; nothing here is ever defaulted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.observer.station()?;

        if self.constellations.is_empty() {
            return Err(ConfigError::Invalid("no constellations configured".into()));
        }
        if self.time_series.sampling_interval <= Duration::zero() {
            return Err(ConfigError::Invalid(
                "sampling_interval must be positive".into(),
            ));
        }
        let unified = &self.time_series.unified;
        if !(0.0..=1.0).contains(&unified.min_compliance) {
            return Err(ConfigError::Invalid(format!(
                "unified.min_compliance {} outside [0, 1]",
                unified.min_compliance
            )));
        }
        if unified.tolerance < Duration::zero() {
            return Err(ConfigError::Invalid("unified.tolerance is negative".into()));
        }
        if self.propagation.workers == Some(0) {
            return Err(ConfigError::Invalid("propagation.workers must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&self.pool.min_connectivity_ratio) {
            return Err(ConfigError::Invalid(format!(
                "pool.min_connectivity_ratio {} outside [0, 1]",
                self.pool.min_connectivity_ratio
            )));
        }

        for (name, constellation) in &self.constellations {
            let threshold = constellation.elevation_threshold(name)?;
            if !(-90.0..=90.0).contains(&threshold) {
                return Err(ConfigError::Invalid(format!(
                    "{}: elevation threshold {} outside [-90, 90]",
                    name, threshold
                )));
            }
            let period = constellation.orbital_period(name)?;
            if period < self.time_series.sampling_interval {
                return Err(ConfigError::Invalid(format!(
                    "{}: orbital period shorter than the sampling interval",
                    name
                )));
            }
            let samples =
                period.num_milliseconds() / self.time_series.sampling_interval.num_milliseconds().max(1);
            if samples > MAX_SERIES_LENGTH {
                return Err(ConfigError::Invalid(format!(
                    "{}: {} samples per period exceeds {}",
                    name, samples, MAX_SERIES_LENGTH
                )));
            }
            if constellation.min_distance_km < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{}: min_distance_km is negative",
                    name
                )));
            }
            if let Some(max) = constellation.max_distance_km {
                if max <= constellation.min_distance_km {
                    return Err(ConfigError::Invalid(format!(
                        "{}: max_distance_km must exceed min_distance_km",
                        name
                    )));
                }
            }
            let [low, high] = constellation.altitude_range_km;
            if low >= high {
                return Err(ConfigError::Invalid(format!(
                    "{}: altitude_range_km must be increasing",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Constellation key for a satellite: the explicit tag when present,
    /// otherwise the first constellation whose name patterns match.
    pub fn identify_constellation(
        &self,
        satellite_name: &str,
        explicit: Option<&str>,
    ) -> Result<(&str, &ConstellationConfig), ConfigError> {
        let found = match explicit {
            Some(tag) => self
                .constellations
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(tag)),
            None => self
                .constellations
                .iter()
                .find(|(key, c)| c.matches(key, satellite_name)),
        };
        found
            .map(|(key, c)| (key.as_str(), c))
            .ok_or_else(|| ConfigError::UnknownConstellation {
                satellite: satellite_name.to_string(),
            })
    }
}

impl ObserverConfig {
    pub fn station(&self) -> Result<GroundStation, ConfigError> {
        GroundStation::from_coordinates(&self.coordinates, Some(self.altitude_m)).ok_or_else(
            || ConfigError::Invalid(format!("invalid observer coordinates {:?}", self.coordinates)),
        )
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s.trim())
        .map_err(|e| e.to_string())
        .and_then(|d| Duration::from_std(d).map_err(|e| e.to_string()))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
        .transpose()
}
