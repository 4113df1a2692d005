use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::tle::error::TleError;
use crate::tle::record::{TleInput, TleRecord};

/// A TLE that was rejected during ingest, with the reason it was dropped.
#[derive(Debug, Clone, Serialize)]
pub struct DroppedRecord {
    pub source: String,
    pub identifier: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub records: Vec<TleRecord>,
    pub dropped: Vec<DroppedRecord>,
}

impl LoadReport {
    fn merge(&mut self, other: LoadReport) {
        self.records.extend(other.records);
        self.dropped.extend(other.dropped);
    }

    /// Keep one record per satellite id, preferring the newest epoch.
    /// Exact repeats are folded silently; a superseded element set is
    /// reported as dropped.
    pub(crate) fn deduplicate(&mut self) {
        let mut latest: HashMap<String, TleRecord> = HashMap::new();
        for record in std::mem::take(&mut self.records) {
            let (kept, superseded) = match latest.remove(&record.satellite_id) {
                None => (record, None),
                Some(existing) if existing.line1 == record.line1 && existing.line2 == record.line2 => {
                    log::debug!("Ignoring repeated TLE for {}", record.satellite_id);
                    (existing, None)
                }
                Some(existing) if existing.epoch >= record.epoch => (existing, Some(record)),
                Some(existing) => (record, Some(existing)),
            };
            if let Some(old) = superseded {
                log::warn!(
                    "Dropping TLE {} for {} (epoch {}): superseded by epoch {}",
                    old.name,
                    old.satellite_id,
                    old.epoch,
                    kept.epoch
                );
                self.dropped.push(DroppedRecord {
                    source: "deduplication".to_string(),
                    identifier: old.name.clone(),
                    reason: format!(
                        "satellite {} superseded by TLE with epoch {}",
                        old.satellite_id, kept.epoch
                    ),
                });
            }
            latest.insert(kept.satellite_id.clone(), kept);
        }
        let mut records: Vec<_> = latest.into_values().collect();
        records.sort_by(|a, b| a.satellite_id.cmp(&b.satellite_id));
        self.records = records;
    }
}

pub struct TleLoader {
    path: PathBuf,
}

impl TleLoader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load a single file or every `.tle`/`.txt`/`.json` file in a directory.
    pub fn load(&self) -> Result<LoadReport, TleError> {
        let mut report = LoadReport::default();

        if self.path.is_dir() {
            let mut paths: Vec<PathBuf> = fs::read_dir(&self.path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            paths.sort();

            for path in paths {
                let supported = matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("tle") | Some("txt") | Some("json")
                );
                if !supported {
                    continue;
                }
                match load_file(&path) {
                    Ok(file_report) => report.merge(file_report),
                    Err(e) => {
                        log::warn!("Failed to read TLE file {}: {}", path.display(), e);
                        // Continue with other files
                    }
                }
            }
        } else {
            report = load_file(&self.path)?;
        }

        report.deduplicate();
        log::info!(
            "Loaded {} TLE records from {} ({} dropped)",
            report.records.len(),
            self.path.display(),
            report.dropped.len()
        );
        Ok(report)
    }
}

fn load_file(path: &Path) -> Result<LoadReport, TleError> {
    let content = fs::read_to_string(path)?;
    let source = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        parse_json(&content, &source)
    } else {
        Ok(parse_text(&content, &source))
    }
}

/// Parse a JSON array of TLE inputs.
pub fn parse_json(content: &str, source: &str) -> Result<LoadReport, TleError> {
    let inputs: Vec<TleInput> = serde_json::from_str(content)?;
    Ok(parse_inputs(&inputs, source))
}

/// Validate already-structured inputs, dropping the ones that fail.
pub fn parse_inputs(inputs: &[TleInput], source: &str) -> LoadReport {
    let mut report = LoadReport::default();
    for (index, input) in inputs.iter().enumerate() {
        match TleRecord::from_input(input) {
            Ok(record) => report.records.push(record),
            Err(e) => {
                let identifier = input
                    .satellite_id
                    .clone()
                    .or_else(|| input.name.clone())
                    .unwrap_or_else(|| format!("#{}", index));
                report.dropped.push(drop_record(source, identifier, &e));
            }
        }
    }
    report
}

/// Parse 2-line and 3-line TLE text, possibly with many satellites.
pub fn parse_text(content: &str, source: &str) -> LoadReport {
    let mut report = LoadReport::default();

    for group in group_lines(content) {
        match group {
            LineGroup::Tle { name, line1, line2 } => {
                match TleRecord::parse(name.as_deref(), &line1, &line2) {
                    Ok(record) => report.records.push(record),
                    Err(e) => {
                        let identifier = name.unwrap_or_else(|| catalog_field(&line1));
                        report.dropped.push(drop_record(source, identifier, &e));
                    }
                }
            }
            LineGroup::Orphan { line, reason } => {
                report.dropped.push(DroppedRecord {
                    source: source.to_string(),
                    identifier: catalog_field(&line),
                    reason: reason.to_string(),
                });
                log::warn!("Dropping line from {}: {}: {:?}", source, reason, line);
            }
        }
    }

    report
}

fn drop_record(source: &str, identifier: String, err: &TleError) -> DroppedRecord {
    log::warn!("Dropping TLE {} from {}: {}", identifier, source, err);
    DroppedRecord {
        source: source.to_string(),
        identifier,
        reason: err.to_string(),
    }
}

fn catalog_field(line: &str) -> String {
    line.get(2..7).unwrap_or(line).trim().to_string()
}

enum LineGroup {
    Tle {
        name: Option<String>,
        line1: String,
        line2: String,
    },
    Orphan {
        line: String,
        reason: &'static str,
    },
}

fn group_lines(content: &str) -> Vec<LineGroup> {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim_end())
        .filter(|l| !l.trim().is_empty())
        .collect();

    let is_line1 = |l: &str| l.starts_with("1 ");
    let is_line2 = |l: &str| l.starts_with("2 ");

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let current = lines[i];
        if is_line1(current) && i + 1 < lines.len() && is_line2(lines[i + 1]) {
            // 2-line TLE (no name)
            result.push(LineGroup::Tle {
                name: None,
                line1: current.to_string(),
                line2: lines[i + 1].to_string(),
            });
            i += 2;
        } else if !is_line1(current)
            && !is_line2(current)
            && i + 2 < lines.len()
            && is_line1(lines[i + 1])
            && is_line2(lines[i + 2])
        {
            // 3-line TLE (with name)
            result.push(LineGroup::Tle {
                name: Some(current.trim().to_string()),
                line1: lines[i + 1].to_string(),
                line2: lines[i + 2].to_string(),
            });
            i += 3;
        } else {
            let reason = if is_line1(current) || is_line2(current) {
                "unpaired TLE line"
            } else {
                "name line without element lines"
            };
            result.push(LineGroup::Orphan {
                line: current.to_string(),
                reason,
            });
            i += 1;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tle::checksum::with_checksum;
    use crate::tle::fixtures::{
        starlink_variant_lines, ONEWEB_LINE1, ONEWEB_LINE2, STARLINK_LINE1, STARLINK_LINE2,
    };

    #[test]
    fn parses_two_and_three_line_entries() {
        let content = format!(
            "STARLINK-1008\n{}\n{}\n\n{}\n{}\n",
            STARLINK_LINE1, STARLINK_LINE2, ONEWEB_LINE1, ONEWEB_LINE2
        );
        let report = parse_text(&content, "mixed.tle");
        assert_eq!(report.records.len(), 2);
        assert!(report.dropped.is_empty());
        assert_eq!(report.records[0].name, "STARLINK-1008");
        assert_eq!(report.records[1].name, "NORAD 44057");
    }

    #[test]
    fn malformed_entry_is_dropped_not_fatal() {
        let mut content = String::new();
        for i in 0..99u32 {
            let (l1, l2) = starlink_variant_lines(50_000 + i, i as f64 * 3.6);
            content.push_str(&format!("STARLINK-{}\n{}\n{}\n", 50_000 + i, l1, l2));
        }
        let corrupted = format!("{}0", &STARLINK_LINE1[..68]);
        content.push_str(&format!("BROKEN\n{}\n{}\n", corrupted, STARLINK_LINE2));

        let report = parse_text(&content, "batch.tle");
        assert_eq!(report.records.len(), 99);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].identifier, "BROKEN");
        assert!(report.dropped[0].reason.contains("checksum"));
    }

    #[test]
    fn orphan_lines_are_reported() {
        let content = format!("{}\nJUST A NAME\n{}\n{}\n", STARLINK_LINE2, ONEWEB_LINE1, ONEWEB_LINE2);
        let report = parse_text(&content, "orphans.tle");
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].reason, "unpaired TLE line");
    }

    #[test]
    fn json_inputs_carry_identity() {
        let json = format!(
            r#"[
                {{"satellite_id": "sl-1", "name": "STARLINK-1008", "tle_line1": "{}", "tle_line2": "{}", "constellation": "starlink"}},
                {{"name": "BAD", "tle_line1": "1 short", "tle_line2": "2 short"}}
            ]"#,
            STARLINK_LINE1, STARLINK_LINE2
        );
        let report = parse_json(&json, "input.json").unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].satellite_id, "sl-1");
        assert_eq!(report.records[0].constellation.as_deref(), Some("starlink"));
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].identifier, "BAD");
    }

    #[test]
    fn loader_reads_directory_and_deduplicates() {
        let dir = std::env::temp_dir().join(format!("leo-visibility-loader-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("a.tle"),
            format!("{}\n{}\n", STARLINK_LINE1, STARLINK_LINE2),
        )
        .unwrap();
        fs::write(
            dir.join("b.txt"),
            format!("{}\n{}\n{}\n{}\n", STARLINK_LINE1, STARLINK_LINE2, ONEWEB_LINE1, ONEWEB_LINE2),
        )
        .unwrap();
        fs::write(dir.join("ignored.md"), "not a tle").unwrap();

        let report = TleLoader::new(dir.clone()).load().unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(report.records.len(), 2);
        assert!(report.dropped.is_empty());
        let ids: Vec<_> = report.records.iter().map(|r| r.satellite_id.as_str()).collect();
        assert_eq!(ids, vec!["44057", "44714"]);
    }

    #[test]
    fn deduplicate_keeps_newest_epoch_and_reports_the_older() {
        let older = with_checksum(&STARLINK_LINE1.replace("25208.98798532", "25200.00000000"));
        let mut report = parse_text(
            &format!(
                "STARLINK-NEW\n{}\n{}\nSTARLINK-OLD\n{}\n{}\n",
                STARLINK_LINE1, STARLINK_LINE2, older, STARLINK_LINE2
            ),
            "two-epochs.tle",
        );
        report.deduplicate();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].name, "STARLINK-NEW");
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].identifier, "STARLINK-OLD");
        assert!(report.dropped[0].reason.contains("44714"));
    }
}
