//! Metered load ingestion from CSV.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::sim::types::LoadSample;

/// Naive layouts tried after RFC 3339, in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Offset-carrying layouts; the offset is dropped.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parses a timestamp in any of the accepted layouts as naive local time.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.naive_local());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Reads `(timestamp, load)` rows from CSV.
///
/// Header names are matched case-insensitively after trimming; extra
/// columns are ignored. Rows are returned in file order, unsorted.
///
/// # Errors
///
/// Returns a configuration error if a required column is missing or a
/// row's timestamp or load cannot be parsed. Row numbers count the header
/// as line 1.
pub fn read_load_csv<R: Read>(reader: R) -> Result<Vec<LoadSample>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or(Error::MissingColumn(name))
    };
    let ts_col = column("timestamp")?;
    let load_col = column("load")?;

    let mut samples = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = i + 2;
        let ts_raw = record.get(ts_col).unwrap_or_default();
        let timestamp = parse_timestamp(ts_raw).ok_or_else(|| Error::Timestamp {
            row,
            value: ts_raw.to_string(),
        })?;
        let load_raw = record.get(load_col).unwrap_or_default();
        let load_kw = load_raw.parse::<f64>().map_err(|_| Error::LoadValue {
            row,
            value: load_raw.to_string(),
        })?;
        samples.push(LoadSample::new(timestamp, load_kw));
    }

    debug!(rows = samples.len(), "load csv parsed");
    Ok(samples)
}

/// Reads a load CSV from disk. See [`read_load_csv`].
pub fn read_load_file(path: &Path) -> Result<Vec<LoadSample>> {
    let file = File::open(path)?;
    read_load_csv(io::BufReader::new(file))
}

/// Drops duplicate timestamps (first occurrence wins) and sorts ascending.
pub fn prepare_load(mut samples: Vec<LoadSample>) -> Vec<LoadSample> {
    let before = samples.len();
    // stable sort keeps input order among equal timestamps
    samples.sort_by_key(|s| s.timestamp);
    samples.dedup_by_key(|s| s.timestamp);
    let dropped = before - samples.len();
    if dropped > 0 {
        warn!(dropped, "duplicate load timestamps removed");
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("valid time")
    }

    #[test]
    fn reads_required_columns_in_any_case() {
        let csv = " Load , Meter, TIMESTAMP\n5000,a,2025-01-06 00:00:00\n5100.5,b,2025-01-06 00:05:00\n";
        let samples = read_load_csv(csv.as_bytes()).expect("parse");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].timestamp, ts("2025-01-06 00:05:00"));
        assert_eq!(samples[1].load_kw, 5100.5);
    }

    #[test]
    fn missing_column_is_configuration_error() {
        let err = read_load_csv("timestamp,power\n2025-01-06 00:00,1\n".as_bytes())
            .expect_err("missing load");
        assert!(matches!(err, Error::MissingColumn("load")));
        assert!(err.is_configuration());
    }

    #[test]
    fn bad_timestamp_reports_row() {
        let csv = "timestamp,load\n2025-01-06 00:00,1\nyesterday,2\n";
        let err = read_load_csv(csv.as_bytes()).expect_err("bad timestamp");
        assert!(matches!(err, Error::Timestamp { row: 3, ref value } if value == "yesterday"));
    }

    #[test]
    fn bad_load_value_reports_row() {
        let csv = "timestamp,load\n2025-01-06 00:00,n/a\n";
        let err = read_load_csv(csv.as_bytes()).expect_err("bad load");
        assert!(matches!(err, Error::LoadValue { row: 2, .. }));
    }

    #[test]
    fn accepted_timestamp_layouts() {
        let expected = ts("2025-01-06 14:05:00");
        for raw in [
            "2025-01-06T14:05:00",
            "2025-01-06T14:05:00.000",
            "2025-01-06T14:05:00+08:00",
            "2025-01-06 14:05:00",
            "2025-01-06 14:05",
            "06/01/2025 14:05",
            "2025-01-06 14:05:00+0800",
        ] {
            assert_eq!(parse_timestamp(raw), Some(expected), "{raw}");
        }
        assert_eq!(parse_timestamp("2025-01-06"), Some(ts("2025-01-06 00:00:00")));
        assert_eq!(parse_timestamp("14:05"), None);
    }

    #[test]
    fn prepare_sorts_and_keeps_first_duplicate() {
        let samples = vec![
            LoadSample::new(ts("2025-01-06 00:10:00"), 3.0),
            LoadSample::new(ts("2025-01-06 00:00:00"), 1.0),
            LoadSample::new(ts("2025-01-06 00:10:00"), 99.0),
            LoadSample::new(ts("2025-01-06 00:05:00"), 2.0),
        ];
        let prepared = prepare_load(samples);
        let loads: Vec<f64> = prepared.iter().map(|s| s.load_kw).collect();
        assert_eq!(loads, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("load.csv");
        std::fs::write(&path, "timestamp,load\n2025-01-06 00:00:00,4200\n").expect("write");
        let samples = read_load_file(&path).expect("read");
        assert_eq!(samples, vec![LoadSample::new(ts("2025-01-06 00:00:00"), 4200.0)]);
    }
}
