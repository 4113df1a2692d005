use crate::tle::checksum::with_checksum;
use crate::tle::record::TleRecord;

pub const STARLINK_LINE1: &str =
    "1 44714U 19074B   25208.98798532  .00001543  00000+0  11645-3 0  9991";
pub const STARLINK_LINE2: &str =
    "2 44714  53.0548 115.3449 0001134  85.9190 274.1928 15.06383560315059";

pub const ONEWEB_LINE1: &str =
    "1 44057U 19010A   25208.50000000  .00000100  00000+0  20000-3 0  9998";
pub const ONEWEB_LINE2: &str =
    "2 44057  87.8900 150.1234 0001500  90.0000 270.0000 13.10000000 29000";

pub fn starlink() -> TleRecord {
    TleRecord::parse(Some("STARLINK-1008"), STARLINK_LINE1, STARLINK_LINE2).unwrap()
}

pub fn oneweb() -> TleRecord {
    TleRecord::parse(Some("ONEWEB-0012"), ONEWEB_LINE1, ONEWEB_LINE2).unwrap()
}

/// Starlink-like lines with a different catalog number and mean anomaly.
pub fn starlink_variant_lines(norad_id: u32, mean_anomaly_deg: f64) -> (String, String) {
    let catalog = format!("{:05}", norad_id);
    let line1 = format!("1 {}{}", catalog, &STARLINK_LINE1[7..]);
    let line2 = format!(
        "2 {}{}{:8.4}{}",
        catalog,
        &STARLINK_LINE2[7..43],
        mean_anomaly_deg.rem_euclid(360.0),
        &STARLINK_LINE2[51..]
    );
    (with_checksum(&line1), with_checksum(&line2))
}

pub fn starlink_variant(norad_id: u32, mean_anomaly_deg: f64) -> TleRecord {
    let (line1, line2) = starlink_variant_lines(norad_id, mean_anomaly_deg);
    TleRecord::parse(Some(&format!("STARLINK-{}", norad_id)), &line1, &line2).unwrap()
}
