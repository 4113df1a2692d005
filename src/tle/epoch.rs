use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::tle::checksum;
use crate::tle::error::TleError;

/// Two-digit years at or above this value belong to the 1900s.
const CENTURY_PIVOT: u32 = 57;
const NANOS_PER_DAY: u128 = 86_400_000_000_000;

/// UTC instant a TLE's elements refer to. Only constructed from the epoch
/// fields of line 1; consumers receive it by value and never rebuild it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EpochTime(DateTime<Utc>);

impl EpochTime {
    /// Build the epoch from the raw two-digit year and day-of-year fields.
    pub fn from_fields(year_field: &str, day_field: &str) -> Result<Self, TleError> {
        let year_field = year_field.trim();
        let day_field = day_field.trim();

        if year_field.len() != 2 || !year_field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TleError::EpochParse(format!(
                "epoch year {:?} is not a two-digit number",
                year_field
            )));
        }
        let two_digit: u32 = year_field
            .parse()
            .map_err(|e| TleError::EpochParse(format!("epoch year {:?}: {}", year_field, e)))?;
        let year = if two_digit >= CENTURY_PIVOT {
            1900 + two_digit
        } else {
            2000 + two_digit
        };

        let (whole, fraction) = day_field.split_once('.').unwrap_or((day_field, ""));
        let day: u32 = whole
            .parse()
            .map_err(|e| TleError::EpochParse(format!("epoch day {:?}: {}", day_field, e)))?;
        if !(1..=366).contains(&day) {
            return Err(TleError::EpochParse(format!(
                "epoch day {} outside 1..=366",
                day
            )));
        }
        let day_nanos = fraction_to_nanos(fraction).ok_or_else(|| {
            TleError::EpochParse(format!("epoch day fraction {:?} is not numeric", fraction))
        })?;

        let jan_first = NaiveDate::from_yo_opt(year as i32, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| TleError::EpochParse(format!("invalid epoch year {}", year)))?
            .and_utc();

        // Day 1.0 is January 1st 00:00.
        let instant = jan_first
            + Duration::days(day as i64 - 1)
            + Duration::nanoseconds(day_nanos as i64);
        if instant.year() != year as i32 {
            return Err(TleError::EpochParse(format!(
                "epoch day {} does not exist in {}",
                day_field, year
            )));
        }

        Ok(EpochTime(instant))
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Minutes from this epoch to `time` (negative before the epoch).
    pub fn minutes_until(&self, time: DateTime<Utc>) -> f64 {
        let delta = time - self.0;
        match delta.num_nanoseconds() {
            Some(ns) => ns as f64 / 60e9,
            None => delta.num_milliseconds() as f64 / 60e3,
        }
    }

    /// Absolute offset between this epoch and `time`.
    pub fn distance_to(&self, time: DateTime<Utc>) -> Duration {
        let delta = time - self.0;
        if delta < Duration::zero() {
            -delta
        } else {
            delta
        }
    }
}

impl fmt::Display for EpochTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Resolve the epoch of a TLE line 1 (columns 19-20 year, 21-32 day).
pub fn resolve(line1: &str) -> Result<EpochTime, TleError> {
    checksum::validate_line(line1, 1)?;
    EpochTime::from_fields(&line1[18..20], &line1[20..32])
}

fn fraction_to_nanos(fraction: &str) -> Option<u128> {
    if fraction.is_empty() {
        return Some(0);
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Anything past nanosecond resolution is dropped.
    let digits = &fraction[..fraction.len().min(18)];
    let value: u128 = digits.parse().ok()?;
    Some(value * NANOS_PER_DAY / 10u128.pow(digits.len() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LINE1: &str = "1 44714U 19074B   25208.98798532  .00001543  00000+0  11645-3 0  9991";

    #[test]
    fn resolves_starlink_epoch() {
        let epoch = resolve(LINE1).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 7, 27, 23, 42, 41).unwrap()
            + Duration::microseconds(931_648);
        assert_eq!(epoch.datetime(), expected);

        let nominal = Utc.with_ymd_and_hms(2025, 7, 27, 23, 42, 43).unwrap();
        assert!(epoch.distance_to(nominal) < Duration::seconds(2));
    }

    #[test]
    fn resolve_is_pure() {
        assert_eq!(resolve(LINE1).unwrap(), resolve(LINE1).unwrap());
    }

    #[test]
    fn century_pivot() {
        let old = EpochTime::from_fields("57", "001.0").unwrap();
        assert_eq!(old.datetime(), Utc.with_ymd_and_hms(1957, 1, 1, 0, 0, 0).unwrap());

        let new = EpochTime::from_fields("56", "001.5").unwrap();
        assert_eq!(new.datetime(), Utc.with_ymd_and_hms(2056, 1, 1, 12, 0, 0).unwrap());

        let y2k = EpochTime::from_fields("00", "366.0").unwrap();
        assert_eq!(y2k.datetime(), Utc.with_ymd_and_hms(2000, 12, 31, 0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_unparseable_fields() {
        assert!(matches!(
            EpochTime::from_fields("2x", "100.0"),
            Err(TleError::EpochParse(_))
        ));
        assert!(matches!(
            EpochTime::from_fields("25", "abc.5"),
            Err(TleError::EpochParse(_))
        ));
        assert!(matches!(
            EpochTime::from_fields("25", "0.5"),
            Err(TleError::EpochParse(_))
        ));
        // 2025 is not a leap year.
        assert!(matches!(
            EpochTime::from_fields("25", "366.5"),
            Err(TleError::EpochParse(_))
        ));
    }

    #[test]
    fn unparseable_epoch_in_checksummed_line() {
        let line = crate::tle::checksum::with_checksum(
            "1 44714U 19074B   252X8.98798532  .00001543  00000+0  11645-3 0  9990",
        );
        assert!(matches!(resolve(&line), Err(TleError::EpochParse(_))));
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(resolve(&LINE1[..60]).unwrap_err().is_malformed());
        let bad_checksum = format!("{}5", &LINE1[..68]);
        assert!(matches!(
            resolve(&bad_checksum),
            Err(TleError::Checksum { line: 1, .. })
        ));
    }

    #[test]
    fn minutes_until_is_signed() {
        let epoch = resolve(LINE1).unwrap();
        let later = epoch.datetime() + Duration::seconds(90);
        let earlier = epoch.datetime() - Duration::seconds(30);
        assert!((epoch.minutes_until(later) - 1.5).abs() < 1e-12);
        assert!((epoch.minutes_until(earlier) + 0.5).abs() < 1e-12);
    }
}
