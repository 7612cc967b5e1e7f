//! Remote inference backend.
//!
//! Wraps the inference-service client and converts its wire detections
//! into session records: plates are normalized, confidences clamped, and
//! capture time stamped locally (the service reports none).

use anyhow::Result;

use crate::config::BackendSettings;
use crate::detect::DetectionBackend;
use crate::transport::{BackendClient, WireDetections};
use crate::{
    clamp_confidence, normalize_plate, now_s, DetectionBatch, ObjectRecord, VehicleRecord,
};

pub struct RemoteBackend {
    client: BackendClient,
}

impl RemoteBackend {
    pub fn new(settings: &BackendSettings) -> Self {
        Self {
            client: BackendClient::new(settings),
        }
    }
}

impl DetectionBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn detect(&mut self, frame_jpeg: &[u8], source: &str) -> Result<DetectionBatch> {
        let response = self.client.detect(frame_jpeg, source)?;
        Ok(batch_from_wire(response.detections, source, now_s()? as i64))
    }

    fn warm_up(&mut self) -> Result<()> {
        let health = self.client.health()?;
        log::info!(
            "inference service reachable at {} ({} detections processed)",
            self.client.base_url(),
            health.detections_processed
        );
        Ok(())
    }
}

/// Convert wire detections into records. Entries without a type label are
/// dropped with a warning; one malformed entry must not cost the batch.
pub fn batch_from_wire(wire: WireDetections, source: &str, detected_at_s: i64) -> DetectionBatch {
    let mut batch = DetectionBatch::default();
    for vehicle in wire.vehicles {
        let Some(vehicle_type) = vehicle.vehicle_type.filter(|t| !t.trim().is_empty()) else {
            log::warn!("dropping vehicle detection without a type label");
            continue;
        };
        batch.vehicles.push(VehicleRecord {
            detected_at_s,
            source: source.to_string(),
            vehicle_type: vehicle_type.trim().to_lowercase(),
            confidence: clamp_confidence(vehicle.confidence),
            color: vehicle.color.filter(|c| !c.trim().is_empty()),
            license_plate: vehicle.license_plate.as_deref().and_then(normalize_plate),
        });
    }
    for object in wire.other_objects {
        let Some(object_type) = object.object_type.filter(|t| !t.trim().is_empty()) else {
            log::warn!("dropping object detection without a type label");
            continue;
        };
        batch.others.push(ObjectRecord {
            detected_at_s,
            source: source.to_string(),
            object_type: object_type.trim().to_lowercase(),
            confidence: clamp_confidence(object.confidence),
            location: object.location.filter(|l| !l.trim().is_empty()),
            size_category: object.size_category.filter(|s| !s.trim().is_empty()),
        });
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{WireObject, WireVehicle};

    #[test]
    fn wire_conversion_normalizes_fields() {
        let wire = WireDetections {
            vehicles: vec![
                WireVehicle {
                    vehicle_type: Some(" Car ".to_string()),
                    confidence: 1.4,
                    color: Some("red".to_string()),
                    license_plate: Some("ab 123".to_string()),
                },
                WireVehicle {
                    vehicle_type: None,
                    confidence: 0.8,
                    color: None,
                    license_plate: None,
                },
            ],
            other_objects: vec![WireObject {
                object_type: Some("Person".to_string()),
                confidence: 0.6,
                location: Some("  ".to_string()),
                size_category: Some("large".to_string()),
            }],
        };

        let batch = batch_from_wire(wire, "ivcam_live", 1_700_000_000);
        assert_eq!(batch.vehicles.len(), 1);
        let vehicle = &batch.vehicles[0];
        assert_eq!(vehicle.vehicle_type, "car");
        assert_eq!(vehicle.confidence, 1.0);
        assert_eq!(vehicle.license_plate.as_deref(), Some("AB123"));
        assert_eq!(vehicle.source, "ivcam_live");

        assert_eq!(batch.others.len(), 1);
        let object = &batch.others[0];
        assert_eq!(object.object_type, "person");
        assert_eq!(object.location, None);
        assert_eq!(object.size_category.as_deref(), Some("large"));
    }

    #[test]
    fn placeholder_plate_becomes_none() {
        let wire = WireDetections {
            vehicles: vec![WireVehicle {
                vehicle_type: Some("truck".to_string()),
                confidence: 0.9,
                color: None,
                license_plate: Some("Not detected".to_string()),
            }],
            other_objects: vec![],
        };
        let batch = batch_from_wire(wire, "manual_upload", 0);
        assert_eq!(batch.vehicles[0].license_plate, None);
    }
}
