use chrono::{DateTime, Duration, Utc};

use crate::propagation::time_series::EvaluationTimeSeries;
use crate::propagation::types::{FailureReason, OrbitalState};
use crate::tle::TleRecord;

/// SGP4/SDP4 propagation of a single TLE over an evaluation time series.
/// Holds no mutable state; identical inputs give identical outputs.
#[derive(Debug, Clone, Copy)]
pub struct PropagationEngine {
    max_backward_minutes: f64,
}

impl Default for PropagationEngine {
    fn default() -> Self {
        Self::new(Duration::days(7))
    }
}

impl PropagationEngine {
    pub fn new(max_backward: Duration) -> Self {
        Self {
            max_backward_minutes: max_backward.num_milliseconds() as f64 / 60_000.0,
        }
    }

    /// One state per timestamp, in series order.
    pub fn propagate(&self, tle: &TleRecord, series: &EvaluationTimeSeries) -> Vec<OrbitalState> {
        let constants = match prepare(tle) {
            Ok(c) => c,
            Err(reason) => {
                log::debug!("{}: {}", tle.satellite_id, reason);
                return series
                    .timestamps()
                    .iter()
                    .map(|&t| OrbitalState::failed(&tle.satellite_id, tle.epoch, t, reason.clone()))
                    .collect();
            }
        };

        series
            .timestamps()
            .iter()
            .map(|&t| self.propagate_at(tle, &constants, t))
            .collect()
    }

    fn propagate_at(
        &self,
        tle: &TleRecord,
        constants: &sgp4::Constants,
        timestamp: DateTime<Utc>,
    ) -> OrbitalState {
        let minutes = tle.epoch.minutes_until(timestamp);
        if minutes < -self.max_backward_minutes {
            return OrbitalState::failed(
                &tle.satellite_id,
                tle.epoch,
                timestamp,
                FailureReason::BackwardLimitExceeded {
                    minutes: -minutes,
                    limit: self.max_backward_minutes,
                },
            );
        }

        match constants.propagate(sgp4::MinutesSinceEpoch(minutes)) {
            Ok(prediction) => {
                let finite = prediction
                    .position
                    .iter()
                    .chain(prediction.velocity.iter())
                    .all(|v| v.is_finite());
                if !finite {
                    return OrbitalState::failed(
                        &tle.satellite_id,
                        tle.epoch,
                        timestamp,
                        FailureReason::Divergence {
                            message: "non-finite state vector".into(),
                        },
                    );
                }
                OrbitalState::propagated(
                    &tle.satellite_id,
                    tle.epoch,
                    timestamp,
                    minutes,
                    prediction.position,
                    prediction.velocity,
                )
            }
            Err(e) => OrbitalState::failed(
                &tle.satellite_id,
                tle.epoch,
                timestamp,
                FailureReason::Divergence {
                    message: e.to_string(),
                },
            ),
        }
    }
}

/// Physical bounds on the elements, then SGP4 initialisation.
fn prepare(tle: &TleRecord) -> Result<sgp4::Constants, FailureReason> {
    let el = &tle.elements;
    if !(0.0..1.0).contains(&el.eccentricity) {
        return Err(FailureReason::InvalidElements {
            message: format!("eccentricity {} outside [0, 1)", el.eccentricity),
        });
    }
    if !(0.0..=180.0).contains(&el.inclination_deg) {
        return Err(FailureReason::InvalidElements {
            message: format!("inclination {} deg outside [0, 180]", el.inclination_deg),
        });
    }
    if el.mean_motion_rev_per_day <= 0.0 {
        return Err(FailureReason::InvalidElements {
            message: format!("mean motion {} rev/day", el.mean_motion_rev_per_day),
        });
    }

    sgp4::Constants::from_elements(tle.sgp4_elements()).map_err(|e| {
        FailureReason::InvalidElements {
            message: e.to_string(),
        }
    })
}
