//! LEO satellite visibility core: TLE ingest, SGP4 propagation, geodetic and
//! topocentric transforms, and link feasibility against a fixed observer.

pub mod config;
pub mod coords;
pub mod feasibility;
pub mod pipeline;
pub mod propagation;
pub mod tle;

pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{Pipeline, PipelineError, PipelineOutput};
