mod error;
mod output;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::{Duration, Utc};

use crate::config::PipelineConfig;
use crate::coords::{CoordinateError, CoordinateTransformer, GeodeticPosition, GroundStation};
use crate::feasibility::{
    find_windows, FeasibilityResult, LinkThreshold, PointState, PoolStatistics,
    SatelliteFeasibility,
};
use crate::propagation::{
    BatchCoordinator, FailureReason, SatellitePropagation, SeriesPlan, SeriesSource,
    TimeSeriesGenerator,
};
use crate::tle::{parse_inputs, LoadReport, TleInput, TleLoader, TleRecord};

pub use error::PipelineError;
pub use output::{
    ConstellationCounts, ConstellationOutput, ExcludedSatellite, PipelineOutput, PointFailure,
    PositionRecord, RunMetadata, SatelliteTrack,
};

/// Constellation settings resolved for one satellite.
#[derive(Debug, Clone)]
struct Assignment {
    constellation: String,
    threshold: LinkThreshold,
    altitude_range_km: [f64; 2],
    orbital_period: Duration,
}

/// Relative mismatch between TLE and configured period worth a warning.
const PERIOD_MISMATCH_RATIO: f64 = 0.1;

/// Per-timestamp outcome before classification.
enum Stage {
    PropagationFailed(FailureReason),
    TransformFailed(CoordinateError),
    Located(GeodeticPosition),
}

/// TLE batch in, per-constellation visibility tracks out. Configuration is
/// validated on construction; nothing in a run falls back to a default.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    observer: GroundStation,
    transformer: CoordinateTransformer,
    generator: TimeSeriesGenerator,
    coordinator: BatchCoordinator,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let observer = config.observer.station()?;
        Ok(Self {
            observer,
            transformer: CoordinateTransformer::default(),
            generator: TimeSeriesGenerator::from_config(&config),
            coordinator: BatchCoordinator::from_config(&config.propagation),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Parse the records (dropping invalid ones) and run.
    pub fn run_inputs(&self, inputs: &[TleInput]) -> Result<PipelineOutput, PipelineError> {
        self.run(parse_inputs(inputs, "input"))
    }

    /// Load a TLE file or folder and run.
    pub fn run_path(&self, path: impl Into<PathBuf>) -> Result<PipelineOutput, PipelineError> {
        let report = TleLoader::new(path.into()).load()?;
        self.run(report)
    }

    pub fn run(&self, mut input: LoadReport) -> Result<PipelineOutput, PipelineError> {
        input.deduplicate();
        let LoadReport { records, dropped } = input;
        let accepted_records = records.len();

        let mut assignments = HashMap::with_capacity(records.len());
        for tle in &records {
            let (key, constellation) = self
                .config
                .identify_constellation(&tle.name, tle.constellation.as_deref())?;
            assignments.insert(
                tle.satellite_id.clone(),
                Assignment {
                    constellation: key.to_string(),
                    threshold: LinkThreshold::from_constellation(key, constellation)?,
                    altitude_range_km: constellation.altitude_range_km,
                    orbital_period: constellation.orbital_period(key)?,
                },
            );
        }

        let plan = self.generator.plan(&records)?;
        let (excluded, active): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|t| plan.excluded.contains(&t.satellite_id));

        log::info!(
            "Propagating {} satellites ({} mode, {} strategy)",
            active.len(),
            plan.mode,
            self.coordinator.strategy()
        );
        let batch = self
            .coordinator
            .batch_propagate(&active, SeriesSource::PerSatellite(&plan.series));

        let tracks = self.coordinator.map_satellites(&active, |tle| {
            let assignment = &assignments[&tle.satellite_id];
            self.build_track(tle, assignment, batch.get(&tle.satellite_id), &plan)
        });

        let mut constellations: BTreeMap<String, ConstellationOutput> = self
            .config
            .constellations
            .iter()
            .map(|(name, c)| -> Result<_, PipelineError> {
                Ok((
                    name.clone(),
                    ConstellationOutput {
                        name: name.clone(),
                        threshold: LinkThreshold::from_constellation(name, c)?,
                        counts: ConstellationCounts::default(),
                        satellites: Vec::new(),
                        excluded: Vec::new(),
                        pool: PoolStatistics::build(name, &[], &self.config.pool),
                    },
                ))
            })
            .collect::<Result<_, PipelineError>>()?;

        for (tle, track) in active.iter().zip(tracks) {
            let key = &assignments[&tle.satellite_id].constellation;
            if let Some(out) = constellations.get_mut(key) {
                out.satellites.push(track);
            }
        }
        for tle in &excluded {
            let key = &assignments[&tle.satellite_id].constellation;
            if let Some(out) = constellations.get_mut(key) {
                out.excluded.push(ExcludedSatellite {
                    satellite_id: tle.satellite_id.clone(),
                    name: tle.name.clone(),
                    epoch: tle.epoch,
                    reason: FailureReason::EpochOutOfTolerance,
                });
            }
        }

        for out in constellations.values_mut() {
            out.satellites.sort_by(|a, b| a.satellite_id.cmp(&b.satellite_id));
            out.counts = count(out);
            let summaries: Vec<_> = out.satellites.iter().map(|t| t.feasibility.clone()).collect();
            out.pool = PoolStatistics::build(&out.name, &summaries, &self.config.pool);
            if out.counts.satellites + out.counts.excluded > 0 {
                log::info!(
                    "{}: {} satellites, {}/{} states propagated, {} transform failures, {} connectable points, {} in optimized pool",
                    out.name,
                    out.counts.satellites,
                    out.counts.successful_propagations,
                    out.counts.successful_propagations + out.counts.failed_propagations,
                    out.counts.failed_transformations,
                    out.counts.connectable_points,
                    out.pool.optimized_pool.len()
                );
            }
        }

        let warnings = plan
            .unified_report
            .as_ref()
            .and_then(|r| r.warning.as_ref())
            .map(|w| vec![w.message.clone()])
            .unwrap_or_default();

        Ok(PipelineOutput {
            metadata: RunMetadata {
                generated_at: Utc::now(),
                mode: plan.mode,
                sampling_interval_seconds: self.generator.interval().num_milliseconds() as f64
                    / 1000.0,
                strategy: batch.strategy,
                transform_backend: self.config.propagation.transform_backend,
                observer_name: self.config.observer.name.clone(),
                observer: self.observer,
                unified_window: plan.unified_report.clone(),
                warnings,
                accepted_records,
                dropped_records: dropped,
                timed_out: batch.timed_out,
            },
            constellations,
        })
    }

    fn build_track(
        &self,
        tle: &TleRecord,
        assignment: &Assignment,
        propagation: Option<&SatellitePropagation>,
        plan: &SeriesPlan,
    ) -> SatelliteTrack {
        let states = propagation.map(|p| p.states.as_slice()).unwrap_or_default();

        let stages: Vec<Stage> = states
            .iter()
            .map(|state| match (state.position_km(), state.failure()) {
                (Some([x, y, z]), _) => {
                    match self.transformer.teme_to_geodetic(x, y, z, state.timestamp) {
                        Ok(position) => Stage::Located(position),
                        Err(e) => Stage::TransformFailed(e),
                    }
                }
                (None, Some(reason)) => Stage::PropagationFailed(reason.clone()),
                (None, None) => Stage::PropagationFailed(FailureReason::MissingTimeSeries),
            })
            .collect();

        let positions: Vec<GeodeticPosition> = stages
            .iter()
            .filter_map(|s| match s {
                Stage::Located(p) => Some(*p),
                _ => None,
            })
            .collect();
        let mut looks = self
            .transformer
            .look_angles_batch(
                &positions,
                &self.observer,
                self.config.propagation.transform_backend,
            )
            .into_iter();

        let [low, high] = assignment.altitude_range_km;
        let mut records = Vec::with_capacity(positions.len());
        let mut failures = Vec::new();
        let mut points: Vec<(PointState, Option<FeasibilityResult>)> =
            Vec::with_capacity(stages.len());
        let mut altitude_anomalies = 0;

        for (state, stage) in states.iter().zip(stages) {
            let failure = |point: PointState, reason: String| PointFailure {
                timestamp: state.timestamp,
                state: point,
                reason,
            };
            match stage {
                Stage::PropagationFailed(reason) => {
                    failures.push(failure(PointState::PropagationFailed, reason.to_string()));
                    points.push((PointState::PropagationFailed, None));
                }
                Stage::TransformFailed(e) => {
                    failures.push(failure(PointState::TransformFailed, e.to_string()));
                    points.push((PointState::TransformFailed, None));
                }
                Stage::Located(position) => match looks.next() {
                    Some(Ok(look)) => {
                        let result = assignment.threshold.classify(&look, &assignment.constellation);
                        if !(low..=high).contains(&position.altitude_km) {
                            altitude_anomalies += 1;
                        }
                        records.push(PositionRecord {
                            timestamp: state.timestamp,
                            latitude_deg: position.latitude_deg,
                            longitude_deg: position.longitude_deg,
                            altitude_km: position.altitude_km,
                            elevation_deg: result.elevation_deg,
                            azimuth_deg: result.azimuth_deg,
                            distance_km: result.distance_km,
                            is_connectable: result.is_connectable,
                        });
                        points.push((PointState::from(&result), Some(result)));
                    }
                    Some(Err(e)) => {
                        failures.push(failure(PointState::TransformFailed, e.to_string()));
                        points.push((PointState::TransformFailed, None));
                    }
                    None => {
                        failures.push(failure(
                            PointState::TransformFailed,
                            "missing look angles".into(),
                        ));
                        points.push((PointState::TransformFailed, None));
                    }
                },
            }
        }

        if altitude_anomalies > 0 {
            log::warn!(
                "{}: {} altitude samples outside the {}-{} km regime of {}",
                tle.satellite_id,
                altitude_anomalies,
                low,
                high,
                assignment.constellation
            );
        }
        let tle_period = tle.orbital_period();
        match tle_period {
            Some(period) => {
                let configured = assignment.orbital_period.num_milliseconds() as f64;
                let mismatch = (period.num_milliseconds() as f64 - configured).abs() / configured;
                if mismatch > PERIOD_MISMATCH_RATIO {
                    log::warn!(
                        "{}: TLE period {:.1} min differs from the {:.1} min configured for {}",
                        tle.satellite_id,
                        minutes(period),
                        minutes(assignment.orbital_period),
                        assignment.constellation
                    );
                }
            }
            None => log::warn!("{}: mean motion gives no orbital period", tle.satellite_id),
        }
        if !failures.is_empty() {
            log::debug!("{}: {} failed points", tle.satellite_id, failures.len());
        }

        let feasibility = SatelliteFeasibility::summarize(
            &tle.satellite_id,
            &assignment.constellation,
            points.iter().map(|(s, r)| (*s, r.as_ref())),
        );
        let windows = find_windows(
            states
                .iter()
                .zip(&points)
                .map(|(state, (_, r))| (state.timestamp, r.as_ref())),
        );

        SatelliteTrack {
            satellite_id: tle.satellite_id.clone(),
            name: tle.name.clone(),
            norad_id: tle.norad_id,
            epoch: tle.epoch,
            tle_period_minutes: tle_period.map(minutes),
            reduced_confidence: plan.is_reduced_confidence(&tle.satellite_id),
            records,
            failures,
            altitude_anomalies,
            feasibility,
            windows,
        }
    }
}

fn minutes(period: Duration) -> f64 {
    period.num_milliseconds() as f64 / 60_000.0
}

fn count(out: &ConstellationOutput) -> ConstellationCounts {
    let mut counts = ConstellationCounts {
        satellites: out.satellites.len(),
        excluded: out.excluded.len(),
        ..Default::default()
    };
    for track in &out.satellites {
        let f = &track.feasibility;
        counts.failed_propagations += f.propagation_failures;
        counts.successful_propagations += f.total_points - f.propagation_failures;
        counts.successful_transformations += f.evaluated_points;
        counts.failed_transformations += f.transform_failures;
        counts.connectable_points += f.connectable_points;
        counts.altitude_anomalies += track.altitude_anomalies;
    }
    counts
}
