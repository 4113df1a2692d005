use thiserror::Error;

use crate::config::ConfigError;
use crate::tle::TleError;

/// Run-level failures. Everything per satellite or per point is reported in
/// the output instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("TLE input error: {0}")]
    Tle(#[from] TleError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
