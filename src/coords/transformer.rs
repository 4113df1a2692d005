use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::coords::error::CoordinateError;
use crate::coords::frames::{gmst, teme_to_ecef_position};

/// Position vectors shorter than this are treated as degenerate.
pub const MIN_RADIUS_KM: f64 = 1.0;
const POLAR_AXIS_EPSILON_KM: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub semi_major_axis_km: f64,
    pub flattening: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        semi_major_axis_km: 6378.137,
        flattening: 1.0 / 298.257_223_563,
    };

    pub fn semi_minor_axis_km(&self) -> f64 {
        self.semi_major_axis_km * (1.0 - self.flattening)
    }

    /// First eccentricity squared.
    pub fn e2(&self) -> f64 {
        self.flattening * (2.0 - self.flattening)
    }

    /// Second eccentricity squared.
    pub fn ep2(&self) -> f64 {
        let e2 = self.e2();
        e2 / (1.0 - e2)
    }
}

/// Geodetic coordinates on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeodeticPosition {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

/// Stateless TEME/ECEF/geodetic conversions. Construct one and pass it to the
/// stages that need it.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateTransformer {
    ellipsoid: Ellipsoid,
    max_iterations: usize,
    tolerance_rad: f64,
}

impl Default for CoordinateTransformer {
    fn default() -> Self {
        Self {
            ellipsoid: Ellipsoid::WGS84,
            max_iterations: 5,
            tolerance_rad: 1e-12,
        }
    }
}

impl CoordinateTransformer {
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self {
            ellipsoid,
            ..Self::default()
        }
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    /// Rotate a TEME position into the Earth-fixed frame at `time` and convert
    /// it to geodetic coordinates.
    pub fn teme_to_geodetic(
        &self,
        x_km: f64,
        y_km: f64,
        z_km: f64,
        time: DateTime<Utc>,
    ) -> Result<GeodeticPosition, CoordinateError> {
        check_radius([x_km, y_km, z_km])?;
        let ecef = teme_to_ecef_position([x_km, y_km, z_km], gmst(time));
        self.ecef_to_geodetic(ecef)
    }

    /// Bowring's iteration on the parametric latitude.
    pub fn ecef_to_geodetic(&self, ecef: [f64; 3]) -> Result<GeodeticPosition, CoordinateError> {
        check_radius(ecef)?;
        let [x, y, z] = ecef;

        let a = self.ellipsoid.semi_major_axis_km;
        let b = self.ellipsoid.semi_minor_axis_km();
        let e2 = self.ellipsoid.e2();
        let ep2 = self.ellipsoid.ep2();

        let p = x.hypot(y);
        let longitude = y.atan2(x);

        if p < POLAR_AXIS_EPSILON_KM {
            return Ok(GeodeticPosition {
                latitude_deg: 90.0_f64.copysign(z),
                longitude_deg: 0.0,
                altitude_km: z.abs() - b,
            });
        }

        let mut beta = (a * z).atan2(b * p);
        let mut latitude = f64::NAN;
        for _ in 0..self.max_iterations {
            let (sin_beta, cos_beta) = beta.sin_cos();
            let next = (z + ep2 * b * sin_beta.powi(3)).atan2(p - e2 * a * cos_beta.powi(3));
            let converged = (next - latitude).abs() < self.tolerance_rad;
            latitude = next;
            if converged {
                break;
            }
            beta = ((1.0 - self.ellipsoid.flattening) * latitude.sin()).atan2(latitude.cos());
        }

        let (sin_lat, cos_lat) = latitude.sin_cos();
        let altitude_km = if cos_lat.abs() < 1e-12 {
            z.abs() - b
        } else {
            p * cos_lat + z * sin_lat - a * (1.0 - e2 * sin_lat * sin_lat).sqrt()
        };

        Ok(GeodeticPosition {
            latitude_deg: latitude.to_degrees(),
            longitude_deg: longitude.to_degrees(),
            altitude_km,
        })
    }

    pub fn geodetic_to_ecef(&self, position: &GeodeticPosition) -> [f64; 3] {
        let a = self.ellipsoid.semi_major_axis_km;
        let e2 = self.ellipsoid.e2();
        let lat = position.latitude_deg.to_radians();
        let lon = position.longitude_deg.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();
        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let alt = position.altitude_km;
        [
            (n + alt) * cos_lat * cos_lon,
            (n + alt) * cos_lat * sin_lon,
            (n * (1.0 - e2) + alt) * sin_lat,
        ]
    }
}

fn check_radius(v: [f64; 3]) -> Result<(), CoordinateError> {
    let radius_km = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if !radius_km.is_finite() || radius_km < MIN_RADIUS_KM {
        return Err(CoordinateError::InvalidCoordinate { radius_km });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn round_trip(lat: f64, lon: f64, alt_km: f64) {
        let transformer = CoordinateTransformer::default();
        let original = GeodeticPosition {
            latitude_deg: lat,
            longitude_deg: lon,
            altitude_km: alt_km,
        };
        let ecef = transformer.geodetic_to_ecef(&original);
        let back = transformer.ecef_to_geodetic(ecef).unwrap();
        assert_abs_diff_eq!(back.latitude_deg, lat, epsilon = 1e-6);
        assert_abs_diff_eq!(back.longitude_deg, lon, epsilon = 1e-6);
        // 0.01 m
        assert_abs_diff_eq!(back.altitude_km, alt_km, epsilon = 1e-5);
    }

    #[test]
    fn geodetic_round_trip_across_latitudes_and_altitudes() {
        let latitudes = [0.0, 0.5, -12.3, 24.9441667, 45.0, -60.0, 75.5, 89.0, -89.9, 89.99];
        let altitudes = [0.0, 0.036, 0.5, 160.0, 550.0, 850.0, 1200.0];
        for &lat in &latitudes {
            for &alt in &altitudes {
                round_trip(lat, 121.3713889, alt);
                round_trip(lat, -179.5, alt);
            }
        }
    }

    #[test]
    fn pole_uses_closed_form() {
        let transformer = CoordinateTransformer::default();
        let b = Ellipsoid::WGS84.semi_minor_axis_km();
        let north = transformer.ecef_to_geodetic([0.0, 0.0, b + 550.0]).unwrap();
        assert_eq!(north.latitude_deg, 90.0);
        assert_abs_diff_eq!(north.altitude_km, 550.0, epsilon = 1e-9);

        let south = transformer.ecef_to_geodetic([0.0, 0.0, -(b + 10.0)]).unwrap();
        assert_eq!(south.latitude_deg, -90.0);
        assert_abs_diff_eq!(south.altitude_km, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn equator_point() {
        let transformer = CoordinateTransformer::default();
        let pos = transformer.ecef_to_geodetic([6378.137 + 550.0, 0.0, 0.0]).unwrap();
        assert_abs_diff_eq!(pos.latitude_deg, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pos.longitude_deg, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pos.altitude_km, 550.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_vectors_are_rejected() {
        let transformer = CoordinateTransformer::default();
        assert!(matches!(
            transformer.ecef_to_geodetic([0.0, 0.0, 0.0]),
            Err(CoordinateError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            transformer.ecef_to_geodetic([0.5, 0.5, 0.1]),
            Err(CoordinateError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            transformer.teme_to_geodetic(f64::NAN, 0.0, 7000.0, Utc::now()),
            Err(CoordinateError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn teme_rotation_preserves_latitude_and_altitude() {
        let transformer = CoordinateTransformer::default();
        let time = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 7, 28, 4, 0, 0).unwrap();
        let teme = [4000.0, 3000.0, 4500.0];
        let pos = transformer.teme_to_geodetic(teme[0], teme[1], teme[2], time).unwrap();
        let direct = transformer.ecef_to_geodetic(teme).unwrap();
        assert_abs_diff_eq!(pos.latitude_deg, direct.latitude_deg, epsilon = 1e-12);
        assert_abs_diff_eq!(pos.altitude_km, direct.altitude_km, epsilon = 1e-9);
        assert!(pos.longitude_deg >= -180.0 && pos.longitude_deg <= 180.0);
    }
}
