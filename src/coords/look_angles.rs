use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::coords::error::CoordinateError;
use crate::coords::frames::ecef_to_enu;
use crate::coords::ground_station::GroundStation;
use crate::coords::transformer::{CoordinateTransformer, GeodeticPosition};

/// Topocentric direction and distance from an observer to a satellite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LookAngles {
    pub elevation_deg: f64,
    pub azimuth_deg: f64,
    pub range_km: f64,
}

/// How a batch of look angles is evaluated. Both produce identical values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransformBackend {
    #[default]
    Sequential,
    DataParallel,
}

/// Observer quantities shared by every satellite in a batch.
struct ObserverFrame {
    ecef: [f64; 3],
    lat_rad: f64,
    lon_rad: f64,
}

impl CoordinateTransformer {
    pub fn look_angles(
        &self,
        satellite: &GeodeticPosition,
        observer: &GroundStation,
    ) -> Result<LookAngles, CoordinateError> {
        let frame = self.observer_frame(observer);
        self.look_from(&frame, satellite)
    }

    /// Look angles for many satellite positions against one observer, in input order.
    pub fn look_angles_batch(
        &self,
        satellites: &[GeodeticPosition],
        observer: &GroundStation,
        backend: TransformBackend,
    ) -> Vec<Result<LookAngles, CoordinateError>> {
        let frame = self.observer_frame(observer);
        match backend {
            TransformBackend::Sequential => satellites
                .iter()
                .map(|sat| self.look_from(&frame, sat))
                .collect(),
            TransformBackend::DataParallel => satellites
                .par_iter()
                .map(|sat| self.look_from(&frame, sat))
                .collect(),
        }
    }

    fn observer_frame(&self, observer: &GroundStation) -> ObserverFrame {
        ObserverFrame {
            ecef: self.geodetic_to_ecef(&observer.geodetic()),
            lat_rad: observer.lat_rad(),
            lon_rad: observer.lon_rad(),
        }
    }

    fn look_from(
        &self,
        frame: &ObserverFrame,
        satellite: &GeodeticPosition,
    ) -> Result<LookAngles, CoordinateError> {
        let sat = self.geodetic_to_ecef(satellite);
        let dr = [
            sat[0] - frame.ecef[0],
            sat[1] - frame.ecef[1],
            sat[2] - frame.ecef[2],
        ];
        let range_km = (dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]).sqrt();
        if !range_km.is_finite() {
            return Err(CoordinateError::InvalidCoordinate {
                radius_km: range_km,
            });
        }
        if range_km < 1e-9 {
            return Err(CoordinateError::DegenerateRange);
        }

        let (east, north, up) = ecef_to_enu(dr, frame.lat_rad, frame.lon_rad);
        let azimuth_deg = east.atan2(north).to_degrees().rem_euclid(360.0);
        let elevation_deg = up.atan2(east.hypot(north)).to_degrees();
        if !(-90.0..=90.0).contains(&elevation_deg) {
            return Err(CoordinateError::ElevationOutOfRange(elevation_deg));
        }

        Ok(LookAngles {
            elevation_deg,
            azimuth_deg,
            range_km,
        })
    }
}
