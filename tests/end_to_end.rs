use approx::assert_abs_diff_eq;
use chrono::{Duration, TimeZone, Utc};

use leo_visibility::coords::{CoordinateTransformer, GroundStation, TransformBackend};
use leo_visibility::feasibility::{find_windows, LinkThreshold};
use leo_visibility::propagation::{
    BatchCoordinator, EvaluationTimeSeries, PropagationEngine, PropagationStrategy, SeriesSource,
};
use leo_visibility::tle::{self, checksum::with_checksum, TleInput, TleRecord};
use leo_visibility::{Pipeline, PipelineConfig};

const LINE1: &str = "1 44714U 19074B   25208.98798532  .00001543  00000+0  11645-3 0  9991";
const LINE2: &str = "2 44714  53.0548 115.3449 0001134  85.9190 274.1928 15.06383560315059";

fn ntpu() -> GroundStation {
    GroundStation::new(24.9441667, 121.3713889, 36.0).unwrap()
}

fn variant(norad_id: u32, mean_anomaly_deg: f64) -> (String, String) {
    let catalog = format!("{:05}", norad_id);
    let line1 = format!("1 {}{}", catalog, &LINE1[7..]);
    let line2 = format!(
        "2 {}{}{:8.4}{}",
        catalog,
        &LINE2[7..43],
        mean_anomaly_deg,
        &LINE2[51..]
    );
    (with_checksum(&line1), with_checksum(&line2))
}

#[test]
fn epoch_resolves_to_late_july_2025() {
    let epoch = tle::resolve(LINE1).unwrap();
    let nominal = Utc.with_ymd_and_hms(2025, 7, 27, 23, 42, 43).unwrap();
    assert!(epoch.distance_to(nominal) < Duration::seconds(2));
    assert_eq!(tle::resolve(LINE1).unwrap(), epoch);
}

#[test]
fn ntpu_two_hour_window_has_a_starlink_pass() {
    let record = TleRecord::parse(Some("STARLINK-1008"), LINE1, LINE2).unwrap();
    let start = record.epoch.datetime() + Duration::hours(4);
    let series = EvaluationTimeSeries::window(start, Duration::hours(2), Duration::seconds(30));
    assert_eq!(series.len(), 241);

    let coordinator = BatchCoordinator::new(
        PropagationEngine::default(),
        PropagationStrategy::Sequential,
        0,
        None,
    );
    let records = vec![record];
    let batch = coordinator.batch_propagate(&records, SeriesSource::Shared(&series));
    let states = &batch.get("44714").unwrap().states;
    assert!(states.iter().all(|s| s.calculation_successful()));

    let transformer = CoordinateTransformer::default();
    let positions: Vec<_> = states
        .iter()
        .map(|s| {
            let [x, y, z] = s.position_km().unwrap();
            transformer.teme_to_geodetic(x, y, z, s.timestamp).unwrap()
        })
        .collect();
    for p in &positions {
        assert!(
            (500.0..600.0).contains(&p.altitude_km),
            "altitude {} km",
            p.altitude_km
        );
    }

    let looks = transformer.look_angles_batch(&positions, &ntpu(), TransformBackend::Sequential);
    let threshold = LinkThreshold::new(5.0, 0.0);
    let results: Vec<_> = looks
        .iter()
        .map(|l| threshold.classify(l.as_ref().unwrap(), "starlink"))
        .collect();
    let windows = find_windows(
        series
            .timestamps()
            .iter()
            .copied()
            .zip(results.iter().map(Some)),
    );

    assert!(!windows.is_empty());
    let best = windows
        .iter()
        .max_by(|a, b| a.peak_elevation_deg.total_cmp(&b.peak_elevation_deg))
        .unwrap();
    assert!(best.peak_elevation_deg > 20.0);
    assert!(best.duration_seconds >= 120);
    assert!(best.start >= start && best.end <= start + Duration::hours(2));
}

#[test]
fn sequential_and_parallel_paths_agree() {
    let records: Vec<_> = (0..48)
        .map(|i| {
            let (l1, l2) = variant(70000 + i, (i as f64 * 7.5) % 360.0);
            TleRecord::parse(None, &l1, &l2).unwrap()
        })
        .collect();
    let series = EvaluationTimeSeries::new(
        records[0].epoch.datetime(),
        Duration::seconds(30),
        192,
    );

    let run = |strategy| {
        BatchCoordinator::new(PropagationEngine::default(), strategy, 1, None)
            .batch_propagate(&records, SeriesSource::Shared(&series))
    };
    let sequential = run(PropagationStrategy::Sequential);
    let parallel = run(PropagationStrategy::Parallel { workers: 8 });

    for record in &records {
        let a = &sequential.get(&record.satellite_id).unwrap().states;
        let b = &parallel.get(&record.satellite_id).unwrap().states;
        assert_eq!(a.len(), b.len());
        for (sa, sb) in a.iter().zip(b) {
            let (pa, pb) = (sa.position_km().unwrap(), sb.position_km().unwrap());
            for k in 0..3 {
                assert_abs_diff_eq!(pa[k], pb[k], epsilon = 1e-6);
            }
        }
    }
}

#[test]
fn one_malformed_record_among_a_hundred() {
    let mut inputs: Vec<TleInput> = (0..100)
        .map(|i| {
            let (l1, l2) = variant(80000 + i, (i as f64 * 3.6) % 360.0);
            TleInput {
                satellite_id: None,
                name: Some(format!("STARLINK-{}", 80000 + i)),
                tle_line1: l1,
                tle_line2: l2,
                constellation: None,
            }
        })
        .collect();
    // Flip one digit of the inclination without fixing the checksum.
    inputs[37].tle_line2.replace_range(9..10, "6");

    let config = PipelineConfig::from_str(
        r#"
observer:
  coordinates: "24.9441667, 121.3713889"
  altitude_m: 36
time_series:
  mode: independent
  sampling_interval: 60s
propagation:
  workers: 4
  min_parallel_batch: 8
constellations:
  starlink:
    elevation_threshold_deg: 5
    orbital_period_minutes: 96
"#,
    )
    .unwrap();
    let output = Pipeline::new(config).unwrap().run_inputs(&inputs).unwrap();

    assert_eq!(output.metadata.accepted_records, 99);
    assert_eq!(output.metadata.dropped_records.len(), 1);
    assert_eq!(output.metadata.dropped_records[0].identifier, "STARLINK-80037");

    let starlink = &output.constellations["starlink"];
    assert_eq!(starlink.counts.satellites, 99);
    assert_eq!(starlink.counts.failed_propagations, 0);
    assert_eq!(starlink.counts.successful_propagations, 99 * 96);
    assert!(starlink.satellites.iter().all(|t| t.records.len() == 96));
    assert!(output.track("80037").is_none());
}
