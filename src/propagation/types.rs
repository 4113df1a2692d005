use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::tle::EpochTime;

/// Why a state could not be computed. Carried on the state, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("{minutes:.1} min before epoch exceeds the backward limit of {limit:.1} min")]
    BackwardLimitExceeded { minutes: f64, limit: f64 },
    #[error("invalid elements: {message}")]
    InvalidElements { message: String },
    #[error("SGP4 divergence: {message}")]
    Divergence { message: String },
    #[error("propagation deadline exceeded")]
    Timeout,
    #[error("no evaluation time series for satellite")]
    MissingTimeSeries,
    #[error("epoch outside the unified window tolerance")]
    EpochOutOfTolerance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StateOutcome {
    Propagated {
        position_km: [f64; 3],
        velocity_km_s: [f64; 3],
    },
    Failed {
        reason: FailureReason,
    },
}

/// TEME position/velocity of one satellite at one evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrbitalState {
    pub satellite_id: String,
    pub epoch: EpochTime,
    pub timestamp: DateTime<Utc>,
    pub minutes_since_epoch: f64,
    pub outcome: StateOutcome,
}

impl OrbitalState {
    pub fn propagated(
        satellite_id: &str,
        epoch: EpochTime,
        timestamp: DateTime<Utc>,
        minutes_since_epoch: f64,
        position_km: [f64; 3],
        velocity_km_s: [f64; 3],
    ) -> Self {
        Self {
            satellite_id: satellite_id.to_string(),
            epoch,
            timestamp,
            minutes_since_epoch,
            outcome: StateOutcome::Propagated {
                position_km,
                velocity_km_s,
            },
        }
    }

    pub fn failed(
        satellite_id: &str,
        epoch: EpochTime,
        timestamp: DateTime<Utc>,
        reason: FailureReason,
    ) -> Self {
        Self {
            satellite_id: satellite_id.to_string(),
            epoch,
            timestamp,
            minutes_since_epoch: epoch.minutes_until(timestamp),
            outcome: StateOutcome::Failed { reason },
        }
    }

    pub fn calculation_successful(&self) -> bool {
        matches!(self.outcome, StateOutcome::Propagated { .. })
    }

    pub fn position_km(&self) -> Option<[f64; 3]> {
        match self.outcome {
            StateOutcome::Propagated { position_km, .. } => Some(position_km),
            StateOutcome::Failed { .. } => None,
        }
    }

    pub fn velocity_km_s(&self) -> Option<[f64; 3]> {
        match self.outcome {
            StateOutcome::Propagated { velocity_km_s, .. } => Some(velocity_km_s),
            StateOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.outcome {
            StateOutcome::Failed { reason } => Some(reason),
            StateOutcome::Propagated { .. } => None,
        }
    }
}
