use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::coords::{GroundStation, TransformBackend};
use crate::feasibility::{
    LinkThreshold, PointState, PoolStatistics, SatelliteFeasibility, VisibilityWindow,
};
use crate::pipeline::error::PipelineError;
use crate::propagation::{
    FailureReason, PropagationStrategy, TimeSeriesMode, UnifiedWindowReport,
};
use crate::tle::{DroppedRecord, EpochTime};

/// One evaluated timestamp as handed to downstream stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionRecord {
    pub timestamp: DateTime<Utc>,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
    pub elevation_deg: f64,
    pub azimuth_deg: f64,
    pub distance_km: f64,
    pub is_connectable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointFailure {
    pub timestamp: DateTime<Utc>,
    pub state: PointState,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SatelliteTrack {
    pub satellite_id: String,
    pub name: String,
    pub norad_id: u32,
    pub epoch: EpochTime,
    /// Period implied by the TLE mean motion.
    pub tle_period_minutes: Option<f64>,
    /// Epoch outside the unified window tolerance.
    pub reduced_confidence: bool,
    pub records: Vec<PositionRecord>,
    pub failures: Vec<PointFailure>,
    pub altitude_anomalies: usize,
    pub feasibility: SatelliteFeasibility,
    pub windows: Vec<VisibilityWindow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExcludedSatellite {
    pub satellite_id: String,
    pub name: String,
    pub epoch: EpochTime,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConstellationCounts {
    pub satellites: usize,
    pub excluded: usize,
    pub successful_propagations: usize,
    pub failed_propagations: usize,
    pub successful_transformations: usize,
    pub failed_transformations: usize,
    pub connectable_points: usize,
    pub altitude_anomalies: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstellationOutput {
    pub name: String,
    pub threshold: LinkThreshold,
    pub counts: ConstellationCounts,
    pub satellites: Vec<SatelliteTrack>,
    pub excluded: Vec<ExcludedSatellite>,
    pub pool: PoolStatistics,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub generated_at: DateTime<Utc>,
    pub mode: TimeSeriesMode,
    pub sampling_interval_seconds: f64,
    pub strategy: PropagationStrategy,
    pub transform_backend: TransformBackend,
    pub observer_name: Option<String>,
    pub observer: GroundStation,
    pub unified_window: Option<UnifiedWindowReport>,
    pub warnings: Vec<String>,
    pub accepted_records: usize,
    pub dropped_records: Vec<DroppedRecord>,
    pub timed_out: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub metadata: RunMetadata,
    pub constellations: BTreeMap<String, ConstellationOutput>,
}

impl PipelineOutput {
    pub fn track(&self, satellite_id: &str) -> Option<&SatelliteTrack> {
        self.constellations
            .values()
            .flat_map(|c| c.satellites.iter())
            .find(|t| t.satellite_id == satellite_id)
    }

    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
