use serde::Serialize;

use crate::config::{ConfigError, ConstellationConfig, PoolConfig};
use crate::coords::LookAngles;

/// Link constraints for one constellation. Nothing here has a built-in
/// value; thresholds always come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkThreshold {
    pub elevation_deg: f64,
    pub min_distance_km: f64,
    /// Disabled unless configured.
    pub max_distance_km: Option<f64>,
}

impl LinkThreshold {
    pub fn new(elevation_deg: f64, min_distance_km: f64) -> Self {
        Self {
            elevation_deg,
            min_distance_km,
            max_distance_km: None,
        }
    }

    pub fn with_max_distance(mut self, max_distance_km: f64) -> Self {
        self.max_distance_km = Some(max_distance_km);
        self
    }

    pub fn from_constellation(name: &str, config: &ConstellationConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            elevation_deg: config.elevation_threshold(name)?,
            min_distance_km: config.min_distance_km,
            max_distance_km: config.max_distance_km,
        })
    }

    pub fn classify(&self, look: &LookAngles, constellation: &str) -> FeasibilityResult {
        let within_max = self.max_distance_km.map_or(true, |max| look.range_km <= max);
        FeasibilityResult {
            constellation: constellation.to_string(),
            elevation_deg: look.elevation_deg,
            azimuth_deg: look.azimuth_deg,
            distance_km: look.range_km,
            elevation_threshold_deg: self.elevation_deg,
            is_connectable: look.elevation_deg >= self.elevation_deg
                && look.range_km >= self.min_distance_km
                && within_max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeasibilityResult {
    pub constellation: String,
    pub elevation_deg: f64,
    pub azimuth_deg: f64,
    pub distance_km: f64,
    pub elevation_threshold_deg: f64,
    pub is_connectable: bool,
}

/// `elevation >= threshold && distance >= min_distance`. No upper distance
/// bound is applied here.
pub fn classify(
    look: &LookAngles,
    constellation: &str,
    elevation_threshold_deg: f64,
    min_distance_km: f64,
) -> FeasibilityResult {
    LinkThreshold::new(elevation_threshold_deg, min_distance_km).classify(look, constellation)
}

/// Terminal state of one timestamp in a satellite's series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PointState {
    Connectable,
    NotConnectable,
    PropagationFailed,
    TransformFailed,
}

impl From<&FeasibilityResult> for PointState {
    fn from(result: &FeasibilityResult) -> Self {
        if result.is_connectable {
            PointState::Connectable
        } else {
            PointState::NotConnectable
        }
    }
}

/// Connectivity of one satellite over its whole series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatelliteFeasibility {
    pub satellite_id: String,
    pub constellation: String,
    pub total_points: usize,
    /// Points that reached classification.
    pub evaluated_points: usize,
    pub connectable_points: usize,
    pub propagation_failures: usize,
    pub transform_failures: usize,
    /// connectable / evaluated, 0 when nothing was evaluated.
    pub connectivity_ratio: f64,
    pub peak_elevation_deg: Option<f64>,
}

impl SatelliteFeasibility {
    pub fn summarize<'a>(
        satellite_id: &str,
        constellation: &str,
        points: impl IntoIterator<Item = (PointState, Option<&'a FeasibilityResult>)>,
    ) -> Self {
        let mut summary = Self {
            satellite_id: satellite_id.to_string(),
            constellation: constellation.to_string(),
            total_points: 0,
            evaluated_points: 0,
            connectable_points: 0,
            propagation_failures: 0,
            transform_failures: 0,
            connectivity_ratio: 0.0,
            peak_elevation_deg: None,
        };

        for (state, result) in points {
            summary.total_points += 1;
            match state {
                PointState::Connectable => {
                    summary.evaluated_points += 1;
                    summary.connectable_points += 1;
                }
                PointState::NotConnectable => summary.evaluated_points += 1,
                PointState::PropagationFailed => summary.propagation_failures += 1,
                PointState::TransformFailed => summary.transform_failures += 1,
            }
            if let Some(r) = result {
                if summary.peak_elevation_deg.map_or(true, |p| r.elevation_deg > p) {
                    summary.peak_elevation_deg = Some(r.elevation_deg);
                }
            }
        }

        if summary.evaluated_points > 0 {
            summary.connectivity_ratio =
                summary.connectable_points as f64 / summary.evaluated_points as f64;
        }
        summary
    }

    pub fn is_candidate(&self) -> bool {
        self.connectable_points > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolEntry {
    pub satellite_id: String,
    pub connectivity_ratio: f64,
    pub peak_elevation_deg: Option<f64>,
}

/// Candidate and optimized satellite pools of one constellation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStatistics {
    pub constellation: String,
    pub total_satellites: usize,
    /// Satellites with at least one connectable timestamp.
    pub candidate_pool: Vec<String>,
    /// Candidates meeting the minimum ratio, best first.
    pub optimized_pool: Vec<PoolEntry>,
    pub mean_connectivity_ratio: f64,
}

impl PoolStatistics {
    pub fn build(constellation: &str, satellites: &[SatelliteFeasibility], config: &PoolConfig) -> Self {
        let mut candidate_pool: Vec<String> = satellites
            .iter()
            .filter(|s| s.is_candidate())
            .map(|s| s.satellite_id.clone())
            .collect();
        candidate_pool.sort();

        let mut optimized: Vec<&SatelliteFeasibility> = satellites
            .iter()
            .filter(|s| s.is_candidate() && s.connectivity_ratio >= config.min_connectivity_ratio)
            .collect();
        optimized.sort_by(|a, b| {
            b.connectivity_ratio
                .total_cmp(&a.connectivity_ratio)
                .then_with(|| {
                    let pa = a.peak_elevation_deg.unwrap_or(f64::NEG_INFINITY);
                    let pb = b.peak_elevation_deg.unwrap_or(f64::NEG_INFINITY);
                    pb.total_cmp(&pa)
                })
                .then_with(|| a.satellite_id.cmp(&b.satellite_id))
        });
        if let Some(target) = config.target_size {
            optimized.truncate(target);
        }

        let mean_connectivity_ratio = if satellites.is_empty() {
            0.0
        } else {
            satellites.iter().map(|s| s.connectivity_ratio).sum::<f64>() / satellites.len() as f64
        };

        Self {
            constellation: constellation.to_string(),
            total_satellites: satellites.len(),
            candidate_pool,
            optimized_pool: optimized
                .into_iter()
                .map(|s| PoolEntry {
                    satellite_id: s.satellite_id.clone(),
                    connectivity_ratio: s.connectivity_ratio,
                    peak_elevation_deg: s.peak_elevation_deg,
                })
                .collect(),
            mean_connectivity_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn look(elevation_deg: f64, range_km: f64) -> LookAngles {
        LookAngles {
            elevation_deg,
            azimuth_deg: 180.0,
            range_km,
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        assert!(classify(&look(5.0, 1500.0), "starlink", 5.0, 0.0).is_connectable);
        assert!(!classify(&look(4.999, 1500.0), "starlink", 5.0, 0.0).is_connectable);
        let r = classify(&look(9.0, 1500.0), "oneweb", 10.0, 0.0);
        assert!(!r.is_connectable);
        assert_eq!(r.constellation, "oneweb");
        assert_eq!(r.elevation_threshold_deg, 10.0);
    }

    #[test]
    fn minimum_distance_applies() {
        assert!(!classify(&look(60.0, 400.0), "starlink", 5.0, 500.0).is_connectable);
        assert!(classify(&look(60.0, 600.0), "starlink", 5.0, 500.0).is_connectable);
    }

    #[test]
    fn no_implicit_maximum_distance() {
        assert!(classify(&look(0.5, 5000.0), "starlink", 0.0, 0.0).is_connectable);
        let capped = LinkThreshold::new(0.0, 0.0).with_max_distance(2000.0);
        assert!(!capped.classify(&look(0.5, 5000.0), "starlink").is_connectable);
        assert!(capped.classify(&look(0.5, 1999.0), "starlink").is_connectable);
    }

    #[test]
    fn raising_threshold_never_adds_connectable_points() {
        let track: Vec<_> = (0..200)
            .map(|i| look((i as f64 * 0.11).sin() * 70.0, 800.0 + i as f64))
            .collect();
        let mut previous = usize::MAX;
        for threshold in (-10..=80).step_by(5) {
            let count = track
                .iter()
                .filter(|l| classify(l, "starlink", threshold as f64, 0.0).is_connectable)
                .count();
            assert!(count <= previous);
            previous = count;
        }
    }

    #[test]
    fn summary_counts_and_ratio() {
        let threshold = LinkThreshold::new(10.0, 0.0);
        let results: Vec<_> = [20.0, 15.0, 5.0, -3.0]
            .iter()
            .map(|&e| threshold.classify(&look(e, 1000.0), "oneweb"))
            .collect();
        let mut points: Vec<_> = results.iter().map(|r| (PointState::from(r), Some(r))).collect();
        points.push((PointState::PropagationFailed, None));
        points.push((PointState::TransformFailed, None));

        let summary = SatelliteFeasibility::summarize("44057", "oneweb", points);
        assert_eq!(summary.total_points, 6);
        assert_eq!(summary.evaluated_points, 4);
        assert_eq!(summary.connectable_points, 2);
        assert_eq!(summary.propagation_failures, 1);
        assert_eq!(summary.transform_failures, 1);
        assert_eq!(summary.connectivity_ratio, 0.5);
        assert_eq!(summary.peak_elevation_deg, Some(20.0));
    }

    fn feasibility(id: &str, ratio: f64, peak: f64) -> SatelliteFeasibility {
        SatelliteFeasibility {
            satellite_id: id.to_string(),
            constellation: "starlink".into(),
            total_points: 100,
            evaluated_points: 100,
            connectable_points: (ratio * 100.0).round() as usize,
            propagation_failures: 0,
            transform_failures: 0,
            connectivity_ratio: ratio,
            peak_elevation_deg: Some(peak),
        }
    }

    #[test]
    fn pool_ranking_and_truncation() {
        let satellites = vec![
            feasibility("a", 0.10, 30.0),
            feasibility("b", 0.30, 50.0),
            feasibility("c", 0.30, 70.0),
            feasibility("d", 0.0, -20.0),
            feasibility("e", 0.02, 8.0),
        ];
        let config = PoolConfig {
            min_connectivity_ratio: 0.05,
            target_size: Some(2),
        };
        let pool = PoolStatistics::build("starlink", &satellites, &config);

        assert_eq!(pool.total_satellites, 5);
        assert_eq!(pool.candidate_pool, vec!["a", "b", "c", "e"]);
        let ids: Vec<_> = pool.optimized_pool.iter().map(|e| e.satellite_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }
}
