//! Vehicle Analytics Daemon (VAD)
//!
//! This crate implements the capture-and-report core for camera based
//! vehicle analytics:
//!
//! 1. **Ingest**: frames from a phone-camera HTTP stream (MJPEG or
//!    single-JPEG endpoints), decimated to a target rate.
//! 2. **Detect**: sampled frames go to a detection backend (remote HTTP
//!    inference service, or a stub for offline runs).
//! 3. **Split**: results are separated into vehicle records and
//!    other-object records.
//! 4. **Store**: both categories persist into a local SQLite session store
//!    with retention pruning.
//! 5. **Report**: CSV exports and session statistics, served over a local
//!    dashboard API and by CLI tools.
//!
//! # Module Structure
//!
//! - `ingest`: camera sources (HTTP MJPEG/JPEG, synthetic)
//! - `frame`: captured frames and submission sampling
//! - `detect`: detection backend seam (remote, stub)
//! - `transport`: inference-service HTTP client
//! - `store`: session persistence (SQLite, in-memory)
//! - `export`: CSV report generation
//! - `api`: dashboard HTTP API

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod api;
pub mod config;
pub mod detect;
pub mod export;
pub mod frame;
pub mod ingest;
pub mod progress;
pub mod store;
pub mod transport;

pub use detect::{select_backend, DetectionBackend, RemoteBackend, StubBackend};
pub use frame::{CapturedFrame, FrameSampler, SamplerStats};
pub use ingest::{CameraSource, CameraStats};
pub use store::{DetectionStore, InMemoryDetectionStore, SqliteDetectionStore};
pub use transport::{BackendClient, BackendHealth};

/// Labels treated as vehicles when a backend returns an unsplit detection
/// list. Matches the COCO vehicle classes the detection model emits.
pub const VEHICLE_LABELS: [&str; 6] = ["car", "truck", "bus", "motorcycle", "bicycle", "van"];

/// Current wall-clock time as epoch seconds.
pub fn now_s() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| anyhow!("system clock before epoch"))?
        .as_secs())
}

/// A detected vehicle, as reported by the detection backend.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VehicleRecord {
    /// Capture time, epoch seconds.
    pub detected_at_s: i64,
    /// Capture source label (`ivcam_live`, `manual_upload`, ...).
    pub source: String,
    /// Vehicle class label (car, truck, bus, ...).
    pub vehicle_type: String,
    /// Detection confidence in `0.0..=1.0`.
    pub confidence: f64,
    pub color: Option<String>,
    /// Normalized plate string, if the backend read one.
    pub license_plate: Option<String>,
}

/// A detected non-vehicle object.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ObjectRecord {
    /// Capture time, epoch seconds.
    pub detected_at_s: i64,
    pub source: String,
    /// Object class label (person, tree, dog, ...).
    pub object_type: String,
    pub confidence: f64,
    pub location: Option<String>,
    pub size_category: Option<String>,
}

/// Split result of a single detection call.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DetectionBatch {
    pub vehicles: Vec<VehicleRecord>,
    pub others: Vec<ObjectRecord>,
}

impl DetectionBatch {
    pub fn len(&self) -> usize {
        self.vehicles.len() + self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty() && self.others.is_empty()
    }
}

/// The most recent record in a session, either category.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum LatestDetection {
    Vehicle(VehicleRecord),
    OtherObject(ObjectRecord),
}

impl LatestDetection {
    pub fn detected_at_s(&self) -> i64 {
        match self {
            LatestDetection::Vehicle(v) => v.detected_at_s,
            LatestDetection::OtherObject(o) => o.detected_at_s,
        }
    }
}

/// Session-level counters and distributions, the dashboard's headline
/// numbers.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub vehicles: u64,
    pub other_objects: u64,
    /// Total records processed this session (both categories).
    pub detections_processed: u64,
    pub vehicle_types: BTreeMap<String, u64>,
    pub object_types: BTreeMap<String, u64>,
    pub mean_vehicle_confidence: f64,
    pub mean_object_confidence: f64,
}

/// Returns true when a detection label belongs to the vehicle category.
pub fn is_vehicle_label(label: &str) -> bool {
    let label = label.trim();
    VEHICLE_LABELS
        .iter()
        .any(|known| label.eq_ignore_ascii_case(known))
}

fn plate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^[A-Z0-9-]{2,10}$").expect("plate pattern"))
}

/// Normalize a license plate string from the backend.
///
/// Whitespace is stripped and the plate is uppercased. Placeholder values
/// (`Not detected`, `Unknown`, empty) and strings that do not look like a
/// plate map to `None`.
pub fn normalize_plate(raw: &str) -> Option<String> {
    let collapsed: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if collapsed.is_empty() {
        return None;
    }
    let upper = collapsed.to_uppercase();
    if upper == "NOTDETECTED" || upper == "UNKNOWN" || upper == "N/A" || upper == "NONE" {
        return None;
    }
    if plate_pattern().is_match(&upper) {
        Some(upper)
    } else {
        None
    }
}

/// Clamp a backend confidence into `0.0..=1.0`. Non-finite values become 0.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if !confidence.is_finite() {
        return 0.0;
    }
    confidence.clamp(0.0, 1.0)
}

pub(crate) fn validate_type_label(label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(anyhow!("detection record has an empty type label"));
    }
    Ok(())
}

/// Session engine: validates incoming batches and owns the session store.
pub struct Engine {
    store: Box<dyn DetectionStore>,
}

impl Engine {
    /// Open an engine over a SQLite session database.
    pub fn open(db_path: &str) -> Result<Self> {
        Ok(Self {
            store: Box::new(SqliteDetectionStore::open(db_path)?),
        })
    }

    /// Engine over an in-memory store (tests, dry runs).
    pub fn in_memory() -> Self {
        Self {
            store: Box::new(InMemoryDetectionStore::default()),
        }
    }

    /// Validate and append a detection batch.
    ///
    /// Records with empty type labels are rejected before anything is
    /// written, so a partial append cannot skew the session counts.
    /// Confidences are clamped on the way in.
    pub fn record_batch(&mut self, mut batch: DetectionBatch) -> Result<BatchOutcome> {
        for vehicle in &batch.vehicles {
            validate_type_label(&vehicle.vehicle_type)?;
        }
        for object in &batch.others {
            validate_type_label(&object.object_type)?;
        }
        for vehicle in &mut batch.vehicles {
            vehicle.confidence = clamp_confidence(vehicle.confidence);
        }
        for object in &mut batch.others {
            object.confidence = clamp_confidence(object.confidence);
        }
        let outcome = BatchOutcome {
            vehicles_added: batch.vehicles.len(),
            others_added: batch.others.len(),
        };
        self.store.append_batch(&batch)?;
        Ok(outcome)
    }

    pub fn stats(&mut self) -> Result<SessionStats> {
        self.store.stats()
    }

    pub fn latest(&mut self) -> Result<Option<LatestDetection>> {
        self.store.latest()
    }

    pub fn vehicles(&mut self, limit: usize) -> Result<Vec<VehicleRecord>> {
        self.store.vehicles(limit)
    }

    pub fn objects(&mut self, limit: usize) -> Result<Vec<ObjectRecord>> {
        self.store.objects(limit)
    }

    pub fn clear_session(&mut self) -> Result<()> {
        self.store.clear_session()
    }

    /// Delete records captured before `now - retention`.
    pub fn prune_older_than(&mut self, retention: std::time::Duration) -> Result<u64> {
        let cutoff = now_s()? as i64 - retention.as_secs() as i64;
        self.store.prune_before(cutoff)
    }
}

/// What a `record_batch` call added to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchOutcome {
    pub vehicles_added: usize,
    pub others_added: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(vehicle_type: &str, confidence: f64) -> VehicleRecord {
        VehicleRecord {
            detected_at_s: 1_700_000_000,
            source: "ivcam_live".to_string(),
            vehicle_type: vehicle_type.to_string(),
            confidence,
            color: None,
            license_plate: None,
        }
    }

    #[test]
    fn vehicle_labels_match_case_insensitively() {
        assert!(is_vehicle_label("car"));
        assert!(is_vehicle_label("Truck"));
        assert!(is_vehicle_label(" BUS "));
        assert!(!is_vehicle_label("person"));
        assert!(!is_vehicle_label("carriage"));
        assert!(!is_vehicle_label(""));
    }

    #[test]
    fn plate_normalization() {
        assert_eq!(normalize_plate("ab 123 cd"), Some("AB123CD".to_string()));
        assert_eq!(normalize_plate("KA-01-HH"), Some("KA-01-HH".to_string()));
        assert_eq!(normalize_plate("Not detected"), None);
        assert_eq!(normalize_plate("unknown"), None);
        assert_eq!(normalize_plate(""), None);
        // Too short, too long, or outside the plate alphabet.
        assert_eq!(normalize_plate("A"), None);
        assert_eq!(normalize_plate("ABCDEFGHIJK"), None);
        assert_eq!(normalize_plate("AB#123"), None);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(clamp_confidence(0.5), 0.5);
        assert_eq!(clamp_confidence(-0.1), 0.0);
        assert_eq!(clamp_confidence(1.5), 1.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
    }

    #[test]
    fn engine_rejects_empty_type_labels() {
        let mut engine = Engine::in_memory();
        let batch = DetectionBatch {
            vehicles: vec![vehicle("  ", 0.9)],
            others: vec![],
        };
        assert!(engine.record_batch(batch).is_err());
        let stats = engine.stats().unwrap();
        assert_eq!(stats.detections_processed, 0);
    }

    #[test]
    fn engine_clamps_and_counts() {
        let mut engine = Engine::in_memory();
        let batch = DetectionBatch {
            vehicles: vec![vehicle("car", 1.7), vehicle("truck", 0.6)],
            others: vec![ObjectRecord {
                detected_at_s: 1_700_000_000,
                source: "ivcam_live".to_string(),
                object_type: "person".to_string(),
                confidence: 0.4,
                location: None,
                size_category: None,
            }],
        };
        let outcome = engine.record_batch(batch).unwrap();
        assert_eq!(outcome.vehicles_added, 2);
        assert_eq!(outcome.others_added, 1);

        let stats = engine.stats().unwrap();
        assert_eq!(stats.vehicles, 2);
        assert_eq!(stats.other_objects, 1);
        assert_eq!(stats.detections_processed, 3);
        assert_eq!(stats.vehicle_types.get("car"), Some(&1));
        // 1.7 clamps to 1.0, so the mean is (1.0 + 0.6) / 2.
        assert!((stats.mean_vehicle_confidence - 0.8).abs() < 1e-9);
    }
}
