mod error;
pub mod frames;
mod ground_station;
mod look_angles;
mod transformer;

pub use error::CoordinateError;
pub use ground_station::GroundStation;
pub use look_angles::{LookAngles, TransformBackend};
pub use transformer::{CoordinateTransformer, Ellipsoid, GeodeticPosition, MIN_RADIUS_KM};
