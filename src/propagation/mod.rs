mod batch;
mod engine;
mod time_series;
mod types;

pub use batch::{
    BatchCoordinator, BatchResult, PropagationStrategy, SatellitePropagation, SeriesSource,
};
pub use engine::PropagationEngine;
pub use time_series::{
    median_epoch, validate_reference, EvaluationTimeSeries, SeriesAnchor, SeriesPlan,
    TimeSeriesGenerator, TimeSeriesMode, UnifiedWindowReport, UnifiedWindowToleranceWarning,
};
pub use types::{FailureReason, OrbitalState, StateOutcome};
