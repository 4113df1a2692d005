use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::tle::checksum;
use crate::tle::epoch::EpochTime;
use crate::tle::error::TleError;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A TLE as handed over by the loading stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TleInput {
    #[serde(default)]
    pub satellite_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub tle_line1: String,
    pub tle_line2: String,
    #[serde(default)]
    pub constellation: Option<String>,
}

/// Mean orbital elements, angles in degrees, mean motion in revolutions/day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrbitalElements {
    pub inclination_deg: f64,
    pub raan_deg: f64,
    pub eccentricity: f64,
    pub argument_of_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
    pub mean_motion_rev_per_day: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DragTerms {
    pub mean_motion_dot: f64,
    pub mean_motion_ddot: f64,
    pub bstar: f64,
}

/// A validated two-line element set. Parsed once per ingest; read-only after.
#[derive(Debug, Clone, Serialize)]
pub struct TleRecord {
    pub satellite_id: String,
    pub name: String,
    pub constellation: Option<String>,
    pub norad_id: u32,
    pub classification: char,
    pub international_designator: String,
    pub epoch_year_field: String,
    pub epoch_day_field: String,
    pub epoch: EpochTime,
    pub elements: OrbitalElements,
    pub drag: DragTerms,
    pub element_number: u32,
    pub revolution_number: u32,
    pub checksums: [u8; 2],
    pub line1: String,
    pub line2: String,
    #[serde(skip)]
    sgp4_elements: sgp4::Elements,
}

impl TleRecord {
    pub fn parse(name: Option<&str>, line1: &str, line2: &str) -> Result<Self, TleError> {
        let line1 = line1.trim_end();
        let line2 = line2.trim_end();
        checksum::validate_line(line1, 1)?;
        checksum::validate_line(line2, 2)?;

        let catalog1 = line1[2..7].trim();
        let catalog2 = line2[2..7].trim();
        if catalog1 != catalog2 {
            return Err(TleError::malformed(
                2,
                format!(
                    "catalog number {} does not match line 1 ({})",
                    catalog2, catalog1
                ),
            ));
        }
        let norad_id: u32 = catalog1
            .parse()
            .map_err(|_| TleError::malformed(1, format!("catalog number {:?}", catalog1)))?;

        let epoch = EpochTime::from_fields(&line1[18..20], &line1[20..32])?;

        let name = name
            .map(|n| n.trim().trim_start_matches("0 ").to_string())
            .filter(|n| !n.is_empty());
        let sgp4_elements = sgp4::Elements::from_tle(name.clone(), line1.as_bytes(), line2.as_bytes())
            .map_err(|e| TleError::Elements(e.to_string()))?;

        let element_number = parse_counter(&line1[64..68], 1, "element set number")?;
        let revolution_number = parse_counter(&line2[63..68], 2, "revolution number")?;

        Ok(TleRecord {
            satellite_id: norad_id.to_string(),
            name: name.unwrap_or_else(|| format!("NORAD {}", norad_id)),
            constellation: None,
            norad_id,
            classification: line1.as_bytes()[7] as char,
            international_designator: line1[9..17].trim().to_string(),
            epoch_year_field: line1[18..20].to_string(),
            epoch_day_field: line1[20..32].to_string(),
            epoch,
            elements: OrbitalElements {
                inclination_deg: sgp4_elements.inclination,
                raan_deg: sgp4_elements.right_ascension,
                eccentricity: sgp4_elements.eccentricity,
                argument_of_perigee_deg: sgp4_elements.argument_of_perigee,
                mean_anomaly_deg: sgp4_elements.mean_anomaly,
                mean_motion_rev_per_day: sgp4_elements.mean_motion,
            },
            drag: DragTerms {
                mean_motion_dot: sgp4_elements.mean_motion_dot,
                mean_motion_ddot: sgp4_elements.mean_motion_ddot,
                bstar: sgp4_elements.drag_term,
            },
            element_number,
            revolution_number,
            checksums: [checksum::compute(line1), checksum::compute(line2)],
            line1: line1.to_string(),
            line2: line2.to_string(),
            sgp4_elements,
        })
    }

    pub fn from_input(input: &TleInput) -> Result<Self, TleError> {
        let mut record = Self::parse(input.name.as_deref(), &input.tle_line1, &input.tle_line2)?;
        if let Some(id) = input.satellite_id.as_ref().filter(|id| !id.trim().is_empty()) {
            record.satellite_id = id.trim().to_string();
        }
        record.constellation = input
            .constellation
            .as_ref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());
        Ok(record)
    }

    /// Orbital period implied by the mean motion, if the mean motion is positive.
    pub fn orbital_period(&self) -> Option<Duration> {
        let mean_motion = self.elements.mean_motion_rev_per_day;
        if !(mean_motion.is_finite() && mean_motion > 0.0) {
            return None;
        }
        let millis = (SECONDS_PER_DAY / mean_motion * 1000.0).round();
        if millis.is_finite() && millis < i64::MAX as f64 {
            Duration::try_milliseconds(millis as i64)
        } else {
            None
        }
    }

    pub(crate) fn sgp4_elements(&self) -> &sgp4::Elements {
        &self.sgp4_elements
    }
}

fn parse_counter(field: &str, line: u8, what: &str) -> Result<u32, TleError> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(0);
    }
    field
        .parse()
        .map_err(|_| TleError::malformed(line, format!("{} {:?}", what, field)))
}
