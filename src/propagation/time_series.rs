use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, PipelineConfig, UnifiedWindowConfig};
use crate::tle::{EpochTime, TleRecord};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeSeriesMode {
    /// Each satellite starts at its own TLE epoch.
    #[default]
    Independent,
    /// All satellites start at one shared reference time.
    Unified,
}

/// Ordered, evenly spaced evaluation instants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationTimeSeries {
    anchor: DateTime<Utc>,
    interval_ms: i64,
    timestamps: Vec<DateTime<Utc>>,
}

impl EvaluationTimeSeries {
    pub fn new(anchor: DateTime<Utc>, interval: Duration, count: usize) -> Self {
        // Stops early rather than overflow the calendar.
        let timestamps = (0..count)
            .map_while(|i| {
                let offset = interval.checked_mul(i32::try_from(i).ok()?)?;
                anchor.checked_add_signed(offset)
            })
            .collect();
        Self {
            anchor,
            interval_ms: interval.num_milliseconds(),
            timestamps,
        }
    }

    /// Samples covering `[anchor, anchor + span]`.
    pub fn window(anchor: DateTime<Utc>, span: Duration, interval: Duration) -> Self {
        let steps = span.num_milliseconds() / interval.num_milliseconds().max(1);
        Self::new(anchor, interval, usize::try_from(steps).map_or(0, |s| s + 1))
    }

    pub fn anchor(&self) -> DateTime<Utc> {
        self.anchor
    }

    pub fn interval(&self) -> Duration {
        Duration::milliseconds(self.interval_ms)
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Where a series starts: a satellite's own epoch or a shared reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeriesAnchor {
    Epoch(EpochTime),
    Reference(DateTime<Utc>),
}

/// Raised when too few satellites have an epoch near the unified reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedWindowToleranceWarning {
    pub compliance_ratio: f64,
    pub required_ratio: f64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedWindowReport {
    pub reference_time: DateTime<Utc>,
    pub tolerance_seconds: i64,
    pub total_satellites: usize,
    pub within_tolerance: usize,
    pub compliance_ratio: f64,
    pub out_of_tolerance: Vec<String>,
    pub warning: Option<UnifiedWindowToleranceWarning>,
}

/// Per-satellite evaluation series for one run.
#[derive(Debug, Clone)]
pub struct SeriesPlan {
    pub mode: TimeSeriesMode,
    pub series: HashMap<String, Arc<EvaluationTimeSeries>>,
    /// Unified mode only.
    pub unified_report: Option<UnifiedWindowReport>,
    /// Satellites left without a series because their epoch is too far from
    /// the unified reference.
    pub excluded: Vec<String>,
}

impl SeriesPlan {
    pub fn is_reduced_confidence(&self, satellite_id: &str) -> bool {
        self.unified_report
            .as_ref()
            .is_some_and(|r| r.out_of_tolerance.iter().any(|id| id == satellite_id))
    }
}

/// Builds evaluation series from the configured sampling interval and
/// per-constellation orbital periods.
#[derive(Debug, Clone)]
pub struct TimeSeriesGenerator {
    mode: TimeSeriesMode,
    interval: Duration,
    unified: UnifiedWindowConfig,
    config: PipelineConfig,
}

impl TimeSeriesGenerator {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            mode: config.time_series.mode,
            interval: config.time_series.sampling_interval,
            unified: config.time_series.unified.clone(),
            config: config.clone(),
        }
    }

    pub fn mode(&self) -> TimeSeriesMode {
        self.mode
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// floor(orbital period / sampling interval)
    pub fn series_length(&self, period: Duration) -> usize {
        let interval_ms = self.interval.num_milliseconds();
        if interval_ms <= 0 {
            return 0;
        }
        (period.num_milliseconds() / interval_ms).max(0) as usize
    }

    /// Series for one satellite. The constellation is taken from `explicit`
    /// when given, otherwise from the satellite name.
    pub fn generate(
        &self,
        satellite_name: &str,
        explicit: Option<&str>,
        anchor: SeriesAnchor,
    ) -> Result<EvaluationTimeSeries, ConfigError> {
        let (key, constellation) = self.config.identify_constellation(satellite_name, explicit)?;
        let period = constellation.orbital_period(key)?;
        let start = match anchor {
            SeriesAnchor::Epoch(epoch) => epoch.datetime(),
            SeriesAnchor::Reference(reference) => reference,
        };
        Ok(EvaluationTimeSeries::new(
            start,
            self.interval,
            self.series_length(period),
        ))
    }

    /// Series for every record, following the configured mode. Fails on the
    /// first configuration gap.
    pub fn plan(&self, tles: &[TleRecord]) -> Result<SeriesPlan, ConfigError> {
        match self.mode {
            TimeSeriesMode::Independent => {
                let mut series = HashMap::with_capacity(tles.len());
                for tle in tles {
                    let s = self.generate(
                        &tle.name,
                        tle.constellation.as_deref(),
                        SeriesAnchor::Epoch(tle.epoch),
                    )?;
                    series.insert(tle.satellite_id.clone(), Arc::new(s));
                }
                Ok(SeriesPlan {
                    mode: self.mode,
                    series,
                    unified_report: None,
                    excluded: Vec::new(),
                })
            }
            TimeSeriesMode::Unified => self.plan_unified(tles),
        }
    }

    fn plan_unified(&self, tles: &[TleRecord]) -> Result<SeriesPlan, ConfigError> {
        let reference = match self.unified.reference_time {
            Some(t) => t,
            None => median_epoch(tles).ok_or_else(|| {
                ConfigError::Invalid("unified mode needs a reference time or TLE epochs".into())
            })?,
        };
        let report = validate_reference(
            reference,
            tles,
            self.unified.tolerance,
            self.unified.min_compliance,
        );
        if let Some(warning) = &report.warning {
            log::warn!("{}", warning.message);
        }

        // One shared series per constellation.
        let mut per_constellation: HashMap<String, Arc<EvaluationTimeSeries>> = HashMap::new();
        let mut series = HashMap::with_capacity(tles.len());
        let mut excluded = Vec::new();

        for tle in tles {
            let (key, _) = self
                .config
                .identify_constellation(&tle.name, tle.constellation.as_deref())?;
            if self.unified.exclude_out_of_tolerance
                && report.out_of_tolerance.contains(&tle.satellite_id)
            {
                excluded.push(tle.satellite_id.clone());
                continue;
            }
            let shared = match per_constellation.get(key) {
                Some(s) => s.clone(),
                None => {
                    let s = Arc::new(self.generate(
                        &tle.name,
                        Some(key),
                        SeriesAnchor::Reference(reference),
                    )?);
                    per_constellation.insert(key.to_string(), s.clone());
                    s
                }
            };
            series.insert(tle.satellite_id.clone(), shared);
        }

        Ok(SeriesPlan {
            mode: TimeSeriesMode::Unified,
            series,
            unified_report: Some(report),
            excluded,
        })
    }
}

/// Median TLE epoch of the batch (lower median for even counts).
pub fn median_epoch(tles: &[TleRecord]) -> Option<DateTime<Utc>> {
    let mut epochs: Vec<_> = tles.iter().map(|t| t.epoch.datetime()).collect();
    if epochs.is_empty() {
        return None;
    }
    epochs.sort();
    Some(epochs[(epochs.len() - 1) / 2])
}

/// Share of satellites whose epoch is within `tolerance` of `reference`.
/// Falling short of `min_compliance` yields a warning, never an error.
pub fn validate_reference(
    reference: DateTime<Utc>,
    tles: &[TleRecord],
    tolerance: Duration,
    min_compliance: f64,
) -> UnifiedWindowReport {
    let out_of_tolerance: Vec<String> = tles
        .iter()
        .filter(|t| t.epoch.distance_to(reference) > tolerance)
        .map(|t| t.satellite_id.clone())
        .collect();
    let total = tles.len();
    let within = total - out_of_tolerance.len();
    let ratio = if total == 0 {
        1.0
    } else {
        within as f64 / total as f64
    };

    let warning = (ratio < min_compliance).then(|| UnifiedWindowToleranceWarning {
        compliance_ratio: ratio,
        required_ratio: min_compliance,
        message: format!(
            "only {}/{} satellites ({:.1}%) have an epoch within {} of reference {}; {:.0}% required",
            within,
            total,
            ratio * 100.0,
            humantime::format_duration(tolerance.to_std().unwrap_or_default()),
            reference.to_rfc3339(),
            min_compliance * 100.0
        ),
    });

    UnifiedWindowReport {
        reference_time: reference,
        tolerance_seconds: tolerance.num_seconds(),
        total_satellites: total,
        within_tolerance: within,
        compliance_ratio: ratio,
        out_of_tolerance,
        warning,
    }
}
