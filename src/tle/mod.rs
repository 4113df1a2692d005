pub mod checksum;
mod epoch;
mod error;
mod loader;
mod record;

#[cfg(test)]
pub(crate) mod fixtures;

pub use epoch::{resolve, EpochTime};
pub use error::TleError;
pub use loader::{parse_inputs, parse_json, parse_text, DroppedRecord, LoadReport, TleLoader};
pub use record::{DragTerms, OrbitalElements, TleInput, TleRecord};
