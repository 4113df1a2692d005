use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feasibility::analyzer::FeasibilityResult;

/// A contiguous run of connectable timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibilityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_seconds: i64,
    pub peak_elevation_deg: f64,
    pub peak_time: DateTime<Utc>,
    pub start_azimuth_deg: f64,
    pub end_azimuth_deg: f64,
}

struct OpenWindow {
    start: DateTime<Utc>,
    start_azimuth_deg: f64,
    last: DateTime<Utc>,
    last_azimuth_deg: f64,
    peak_elevation_deg: f64,
    peak_time: DateTime<Utc>,
}

impl OpenWindow {
    fn close(self) -> VisibilityWindow {
        VisibilityWindow {
            start: self.start,
            end: self.last,
            duration_seconds: (self.last - self.start).num_seconds(),
            peak_elevation_deg: round2(self.peak_elevation_deg),
            peak_time: self.peak_time,
            start_azimuth_deg: round2(self.start_azimuth_deg),
            end_azimuth_deg: round2(self.last_azimuth_deg),
        }
    }
}

/// Scan a time-ordered series for visibility windows. A point without a
/// classification (failed propagation or transform) ends the current window.
/// Window bounds are the first and last connectable samples.
pub fn find_windows<'a>(
    samples: impl IntoIterator<Item = (DateTime<Utc>, Option<&'a FeasibilityResult>)>,
) -> Vec<VisibilityWindow> {
    let mut windows = Vec::new();
    let mut open: Option<OpenWindow> = None;

    for (timestamp, result) in samples {
        match result.filter(|r| r.is_connectable) {
            Some(r) => match open.as_mut() {
                Some(w) => {
                    w.last = timestamp;
                    w.last_azimuth_deg = r.azimuth_deg;
                    if r.elevation_deg > w.peak_elevation_deg {
                        w.peak_elevation_deg = r.elevation_deg;
                        w.peak_time = timestamp;
                    }
                }
                None => {
                    open = Some(OpenWindow {
                        start: timestamp,
                        start_azimuth_deg: r.azimuth_deg,
                        last: timestamp,
                        last_azimuth_deg: r.azimuth_deg,
                        peak_elevation_deg: r.elevation_deg,
                        peak_time: timestamp,
                    });
                }
            },
            None => {
                if let Some(w) = open.take() {
                    windows.push(w.close());
                }
            }
        }
    }

    // Window still open at the end of the series
    if let Some(w) = open {
        windows.push(w.close());
    }

    windows
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn result(elevation_deg: f64, azimuth_deg: f64) -> FeasibilityResult {
        FeasibilityResult {
            constellation: "starlink".into(),
            elevation_deg,
            azimuth_deg,
            distance_km: 1000.0,
            elevation_threshold_deg: 5.0,
            is_connectable: elevation_deg >= 5.0,
        }
    }

    fn timeline(elevations: &[Option<f64>]) -> (Vec<DateTime<Utc>>, Vec<Option<FeasibilityResult>>) {
        let t0 = Utc.with_ymd_and_hms(2025, 7, 28, 4, 0, 0).unwrap();
        let times = (0..elevations.len())
            .map(|i| t0 + Duration::seconds(30 * i as i64))
            .collect();
        let results = elevations
            .iter()
            .enumerate()
            .map(|(i, e)| e.map(|e| result(e, 10.0 * i as f64)))
            .collect();
        (times, results)
    }

    #[test]
    fn finds_single_pass() {
        let (times, results) = timeline(&[
            Some(-5.0),
            Some(2.0),
            Some(8.0),
            Some(35.0),
            Some(12.0),
            Some(4.0),
        ]);
        let windows = find_windows(times.iter().copied().zip(results.iter().map(|r| r.as_ref())));

        assert_eq!(windows.len(), 1);
        let w = &windows[0];
        assert_eq!(w.start, times[2]);
        assert_eq!(w.end, times[4]);
        assert_eq!(w.duration_seconds, 60);
        assert_eq!(w.peak_elevation_deg, 35.0);
        assert_eq!(w.peak_time, times[3]);
        assert_eq!(w.start_azimuth_deg, 20.0);
        assert_eq!(w.end_azimuth_deg, 40.0);
    }

    #[test]
    fn failed_point_splits_window_and_open_end_is_kept() {
        let (times, results) = timeline(&[Some(10.0), None, Some(20.0), Some(30.0)]);
        let windows = find_windows(times.iter().copied().zip(results.iter().map(|r| r.as_ref())));

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].duration_seconds, 0);
        assert_eq!(windows[1].start, times[2]);
        assert_eq!(windows[1].end, times[3]);
    }

    #[test]
    fn nothing_visible() {
        let (times, results) = timeline(&[Some(-30.0), Some(-10.0), Some(1.0)]);
        assert!(find_windows(times.iter().copied().zip(results.iter().map(|r| r.as_ref()))).is_empty());
    }
}
