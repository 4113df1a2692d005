use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::PropagationConfig;
use crate::propagation::engine::PropagationEngine;
use crate::propagation::time_series::EvaluationTimeSeries;
use crate::propagation::types::{FailureReason, OrbitalState};
use crate::tle::TleRecord;

/// How satellites are fanned out. Both strategies run the same engine over
/// the same series, so results do not depend on the choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PropagationStrategy {
    Sequential,
    Parallel { workers: usize },
}

/// Evaluation times for a batch: one series for everyone, or one per satellite.
#[derive(Debug, Clone, Copy)]
pub enum SeriesSource<'a> {
    Shared(&'a EvaluationTimeSeries),
    PerSatellite(&'a HashMap<String, Arc<EvaluationTimeSeries>>),
}

impl<'a> SeriesSource<'a> {
    fn lookup(&self, satellite_id: &str) -> Option<&'a EvaluationTimeSeries> {
        match *self {
            SeriesSource::Shared(series) => Some(series),
            SeriesSource::PerSatellite(map) => map.get(satellite_id).map(|s| s.as_ref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatellitePropagation {
    pub satellite_id: String,
    pub states: Vec<OrbitalState>,
    pub successful: usize,
    pub failed: usize,
}

impl SatellitePropagation {
    fn new(satellite_id: &str, states: Vec<OrbitalState>) -> Self {
        let successful = states.iter().filter(|s| s.calculation_successful()).count();
        Self {
            satellite_id: satellite_id.to_string(),
            failed: states.len() - successful,
            successful,
            states,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub satellites: HashMap<String, SatellitePropagation>,
    pub strategy: PropagationStrategy,
    /// Satellites not started before the deadline.
    pub timed_out: usize,
}

impl BatchResult {
    pub fn get(&self, satellite_id: &str) -> Option<&SatellitePropagation> {
        self.satellites.get(satellite_id)
    }

    pub fn successful_states(&self) -> usize {
        self.satellites.values().map(|s| s.successful).sum()
    }

    pub fn failed_states(&self) -> usize {
        self.satellites.values().map(|s| s.failed).sum()
    }
}

/// Fans propagation out over satellites. The worker pool is built once and
/// never resized during a run.
#[derive(Debug)]
pub struct BatchCoordinator {
    engine: PropagationEngine,
    strategy: PropagationStrategy,
    min_parallel_batch: usize,
    deadline: Option<std::time::Duration>,
    pool: Option<rayon::ThreadPool>,
}

impl BatchCoordinator {
    pub fn new(
        engine: PropagationEngine,
        strategy: PropagationStrategy,
        min_parallel_batch: usize,
        deadline: Option<Duration>,
    ) -> Self {
        let (strategy, pool) = match strategy {
            PropagationStrategy::Sequential => (strategy, None),
            PropagationStrategy::Parallel { workers } => {
                match rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("propagate-{}", i))
                    .build()
                {
                    Ok(pool) => {
                        log::info!("Propagation pool ready with {} workers", workers);
                        (strategy, Some(pool))
                    }
                    Err(e) => {
                        log::warn!(
                            "Failed to build propagation pool ({}), using sequential strategy",
                            e
                        );
                        (PropagationStrategy::Sequential, None)
                    }
                }
            }
        };

        Self {
            engine,
            strategy,
            min_parallel_batch,
            deadline: deadline.map(|d| d.to_std().unwrap_or_default()),
            pool,
        }
    }

    pub fn from_config(config: &PropagationConfig) -> Self {
        if config.gpu_enabled {
            log::info!(
                "GPU acceleration requested but no GPU backend is available, using the CPU {} transform",
                config.transform_backend
            );
        }
        let workers = config.effective_workers();
        let strategy = if workers > 1 {
            PropagationStrategy::Parallel { workers }
        } else {
            PropagationStrategy::Sequential
        };
        Self::new(
            PropagationEngine::new(config.max_backward),
            strategy,
            config.min_parallel_batch,
            config.deadline,
        )
    }

    pub fn strategy(&self) -> PropagationStrategy {
        self.strategy
    }

    /// Apply `f` to every satellite, in input order. Runs on the pool when the
    /// batch is large enough, otherwise on the calling thread.
    pub fn map_satellites<T, F>(&self, tles: &[TleRecord], f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&TleRecord) -> T + Sync + Send,
    {
        match &self.pool {
            Some(pool) if tles.len() >= self.min_parallel_batch => {
                pool.install(|| tles.par_iter().map(&f).collect())
            }
            _ => tles.iter().map(f).collect(),
        }
    }

    /// Propagate every record over its series. Per-satellite failures are
    /// recorded on the states; the batch itself never fails.
    pub fn batch_propagate(&self, tles: &[TleRecord], series: SeriesSource<'_>) -> BatchResult {
        let started = Instant::now();
        let results = self.map_satellites(tles, |tle| {
            let Some(times) = series.lookup(&tle.satellite_id) else {
                let state = OrbitalState::failed(
                    &tle.satellite_id,
                    tle.epoch,
                    tle.epoch.datetime(),
                    FailureReason::MissingTimeSeries,
                );
                return (SatellitePropagation::new(&tle.satellite_id, vec![state]), false);
            };

            if self.deadline.is_some_and(|d| started.elapsed() >= d) {
                let states = times
                    .timestamps()
                    .iter()
                    .map(|&t| {
                        OrbitalState::failed(&tle.satellite_id, tle.epoch, t, FailureReason::Timeout)
                    })
                    .collect();
                return (SatellitePropagation::new(&tle.satellite_id, states), true);
            }

            let states = self.engine.propagate(tle, times);
            (SatellitePropagation::new(&tle.satellite_id, states), false)
        });

        let timed_out = results.iter().filter(|(_, t)| *t).count();
        if timed_out > 0 {
            log::warn!(
                "Propagation deadline reached, {} of {} satellites not propagated",
                timed_out,
                tles.len()
            );
        }

        let satellites = results
            .into_iter()
            .map(|(p, _)| (p.satellite_id.clone(), p))
            .collect();

        BatchResult {
            satellites,
            strategy: self.strategy,
            timed_out,
        }
    }
}
