use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::DetectionBackend;
use crate::{is_vehicle_label, now_s, DetectionBatch, ObjectRecord, VehicleRecord};

/// Labels the stub rotates through, split by the same vehicle-category
/// rule the live pipeline applies to unsplit detection lists.
const STUB_LABELS: [&str; 4] = ["car", "truck", "person", "dog"];

/// Stub backend for tests and offline runs.
///
/// Deterministic: the frame hash picks the detection label, so repeated
/// runs over the same input produce the same session.
pub struct StubBackend;

impl StubBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame_jpeg: &[u8], source: &str) -> Result<DetectionBatch> {
        let hash: [u8; 32] = Sha256::digest(frame_jpeg).into();
        let detected_at_s = now_s()? as i64;
        let label = STUB_LABELS[usize::from(hash[0]) % STUB_LABELS.len()];
        let confidence = 0.5 + f64::from(hash[1]) / 512.0;

        let mut batch = DetectionBatch::default();
        if is_vehicle_label(label) {
            batch.vehicles.push(VehicleRecord {
                detected_at_s,
                source: source.to_string(),
                vehicle_type: label.to_string(),
                confidence,
                color: Some("gray".to_string()),
                license_plate: None,
            });
        } else {
            batch.others.push(ObjectRecord {
                detected_at_s,
                source: source.to_string(),
                object_type: label.to_string(),
                confidence,
                location: None,
                size_category: Some("medium".to_string()),
            });
        }
        Ok(batch)
    }
}
