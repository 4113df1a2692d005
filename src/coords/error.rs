use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("invalid coordinate: position radius {radius_km} km is degenerate")]
    InvalidCoordinate { radius_km: f64 },
    #[error("elevation {0} deg outside [-90, 90]")]
    ElevationOutOfRange(f64),
    #[error("satellite and observer positions coincide")]
    DegenerateRange,
}
