//! CSV report generation.
//!
//! Two reports per session, one per category, written with timestamped
//! filenames (`vehicles_export_20240301_142233.csv`). Row timestamps are
//! RFC 3339 UTC; optional fields serialize as empty cells so the files
//! load cleanly into spreadsheet tools and warehouse ingest jobs.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::store::DetectionStore;
use crate::{ObjectRecord, VehicleRecord};

pub const VEHICLE_CSV_HEADER: [&str; 6] = [
    "detected_at",
    "source",
    "vehicle_type",
    "confidence",
    "color",
    "license_plate",
];

pub const OBJECT_CSV_HEADER: [&str; 6] = [
    "detected_at",
    "source",
    "object_type",
    "confidence",
    "location",
    "size_category",
];

/// Epoch seconds to RFC 3339 UTC (`2024-03-01T14:22:33+00:00`).
pub fn rfc3339_utc(epoch_s: i64) -> Result<String> {
    let stamp = Utc
        .timestamp_opt(epoch_s, 0)
        .single()
        .ok_or_else(|| anyhow!("timestamp {} out of range", epoch_s))?;
    Ok(stamp.to_rfc3339())
}

pub fn write_vehicles_csv<W: Write>(records: &[VehicleRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(VEHICLE_CSV_HEADER)
        .context("write vehicle csv header")?;
    for record in records {
        let detected_at = rfc3339_utc(record.detected_at_s)?;
        let confidence = record.confidence.to_string();
        csv_writer.write_record([
            detected_at.as_str(),
            record.source.as_str(),
            record.vehicle_type.as_str(),
            confidence.as_str(),
            record.color.as_deref().unwrap_or(""),
            record.license_plate.as_deref().unwrap_or(""),
        ])?;
    }
    csv_writer.flush().context("flush vehicle csv")?;
    Ok(())
}

pub fn write_objects_csv<W: Write>(records: &[ObjectRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(OBJECT_CSV_HEADER)
        .context("write object csv header")?;
    for record in records {
        let detected_at = rfc3339_utc(record.detected_at_s)?;
        let confidence = record.confidence.to_string();
        csv_writer.write_record([
            detected_at.as_str(),
            record.source.as_str(),
            record.object_type.as_str(),
            confidence.as_str(),
            record.location.as_deref().unwrap_or(""),
            record.size_category.as_deref().unwrap_or(""),
        ])?;
    }
    csv_writer.flush().context("flush object csv")?;
    Ok(())
}

/// Report filename for one category, stamped like the original dashboard's
/// download buttons.
pub fn report_filename(prefix: &str, stamp: DateTime<Local>) -> String {
    format!("{}_export_{}.csv", prefix, stamp.format("%Y%m%d_%H%M%S"))
}

/// Paths of the two written reports.
#[derive(Clone, Debug)]
pub struct ReportPaths {
    pub vehicles: PathBuf,
    pub objects: PathBuf,
}

/// Write both session reports into `dir` with filenames stamped `stamp`.
///
/// Empty categories still produce a header-only file, so downstream
/// loaders never have to special-case a missing report.
pub fn export_reports_at(
    store: &mut dyn DetectionStore,
    dir: &Path,
    stamp: DateTime<Local>,
) -> Result<ReportPaths> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create export directory {}", dir.display()))?;

    let vehicles = store.vehicles(usize::MAX)?;
    let objects = store.objects(usize::MAX)?;

    let vehicles_path = dir.join(report_filename("vehicles", stamp));
    let file = std::fs::File::create(&vehicles_path)
        .with_context(|| format!("create {}", vehicles_path.display()))?;
    write_vehicles_csv(&vehicles, file)?;

    let objects_path = dir.join(report_filename("objects", stamp));
    let file = std::fs::File::create(&objects_path)
        .with_context(|| format!("create {}", objects_path.display()))?;
    write_objects_csv(&objects, file)?;

    Ok(ReportPaths {
        vehicles: vehicles_path,
        objects: objects_path,
    })
}

/// `export_reports_at` with the current local time.
pub fn export_reports(store: &mut dyn DetectionStore, dir: &Path) -> Result<ReportPaths> {
    export_reports_at(store, dir, Local::now())
}

/// Persist a CSV payload fetched from the inference service's `/export`
/// endpoint. The payload is written verbatim after checking that it
/// parses as headed CSV; returns the path and the data row count.
pub fn write_backend_csv(
    dir: &Path,
    prefix: &str,
    csv_text: &str,
    stamp: DateTime<Local>,
) -> Result<(PathBuf, usize)> {
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    reader
        .headers()
        .with_context(|| format!("{} export payload has no csv header", prefix))?;
    let mut rows = 0usize;
    for record in reader.records() {
        record.with_context(|| format!("{} export payload row {}", prefix, rows + 1))?;
        rows += 1;
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("create export directory {}", dir.display()))?;
    let path = dir.join(report_filename(prefix, stamp));
    std::fs::write(&path, csv_text).with_context(|| format!("write {}", path.display()))?;
    Ok((path, rows))
}

/// The dashboard's per-category headline numbers.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportSummary {
    pub rows: u64,
    pub distinct_types: u64,
    pub mean_confidence: f64,
}

impl ReportSummary {
    pub fn from_vehicles(records: &[VehicleRecord]) -> Self {
        summarize(records.iter().map(|r| (r.vehicle_type.as_str(), r.confidence)))
    }

    pub fn from_objects(records: &[ObjectRecord]) -> Self {
        summarize(records.iter().map(|r| (r.object_type.as_str(), r.confidence)))
    }
}

fn summarize<'a>(entries: impl Iterator<Item = (&'a str, f64)>) -> ReportSummary {
    let mut rows = 0u64;
    let mut types = std::collections::BTreeSet::new();
    let mut confidence_sum = 0.0;
    for (label, confidence) in entries {
        rows += 1;
        types.insert(label.to_string());
        confidence_sum += confidence;
    }
    ReportSummary {
        rows,
        distinct_types: types.len() as u64,
        mean_confidence: if rows > 0 {
            confidence_sum / rows as f64
        } else {
            0.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDetectionStore;
    use crate::DetectionBatch;
    use chrono::TimeZone;

    fn sample_batch() -> DetectionBatch {
        DetectionBatch {
            vehicles: vec![
                VehicleRecord {
                    detected_at_s: 1_709_303_353,
                    source: "ivcam_live".to_string(),
                    vehicle_type: "car".to_string(),
                    confidence: 0.91,
                    color: Some("red".to_string()),
                    license_plate: None,
                },
                VehicleRecord {
                    detected_at_s: 1_709_303_360,
                    source: "ivcam_live".to_string(),
                    vehicle_type: "truck".to_string(),
                    confidence: 0.81,
                    color: None,
                    license_plate: Some("AB123CD".to_string()),
                },
            ],
            others: vec![ObjectRecord {
                detected_at_s: 1_709_303_353,
                source: "ivcam_live".to_string(),
                object_type: "person".to_string(),
                confidence: 0.66,
                location: Some("sidewalk".to_string()),
                size_category: None,
            }],
        }
    }

    #[test]
    fn vehicle_csv_layout() {
        let batch = sample_batch();
        let mut out = Vec::new();
        write_vehicles_csv(&batch.vehicles, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "detected_at,source,vehicle_type,confidence,color,license_plate"
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("2024-03-01T"));
        assert!(first.contains(",car,0.91,red,"));
        let second = lines.next().unwrap();
        assert!(second.ends_with(",truck,0.81,,AB123CD"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn empty_report_is_header_only() {
        let mut out = Vec::new();
        write_objects_csv(&[], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "detected_at,source,object_type,confidence,location,size_category\n"
        );
    }

    #[test]
    fn report_filenames_carry_the_stamp() {
        let stamp = Local.with_ymd_and_hms(2024, 3, 1, 14, 22, 33).unwrap();
        assert_eq!(
            report_filename("vehicles", stamp),
            "vehicles_export_20240301_142233.csv"
        );
    }

    #[test]
    fn export_reports_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = InMemoryDetectionStore::default();
        store.append_batch(&sample_batch()).unwrap();

        let stamp = Local.with_ymd_and_hms(2024, 3, 1, 14, 22, 33).unwrap();
        let paths = export_reports_at(&mut store, dir.path(), stamp).unwrap();
        assert!(paths.vehicles.ends_with("vehicles_export_20240301_142233.csv"));

        let mut reader = csv::Reader::from_path(&paths.vehicles).unwrap();
        assert_eq!(
            reader.headers().unwrap().iter().collect::<Vec<_>>(),
            VEHICLE_CSV_HEADER.to_vec()
        );
        assert_eq!(reader.records().count(), 2);

        let mut reader = csv::Reader::from_path(&paths.objects).unwrap();
        assert_eq!(reader.records().count(), 1);
    }

    #[test]
    fn backend_csv_passthrough_counts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let stamp = Local.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let payload = "vehicle_type,confidence\ncar,0.9\nbus,0.8\n";
        let (path, rows) = write_backend_csv(dir.path(), "vehicles", payload, stamp).unwrap();
        assert_eq!(rows, 2);
        assert_eq!(std::fs::read_to_string(path).unwrap(), payload);
    }

    #[test]
    fn summaries_match_dashboard_metrics() {
        let batch = sample_batch();
        let summary = ReportSummary::from_vehicles(&batch.vehicles);
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.distinct_types, 2);
        assert!((summary.mean_confidence - 0.86).abs() < 1e-9);

        let empty = ReportSummary::from_objects(&[]);
        assert_eq!(empty.rows, 0);
        assert_eq!(empty.mean_confidence, 0.0);
    }
}
