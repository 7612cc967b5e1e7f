use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};

use crate::{DetectionBatch, LatestDetection, ObjectRecord, SessionStats, VehicleRecord};

/// Session persistence for detection records.
///
/// Two implementations: SQLite for the daemon, in-memory for tests and
/// dry runs. Both keep the two categories in separate tables so the CSV
/// exports and per-category stats stay one query each.
pub trait DetectionStore: Send {
    fn append_batch(&mut self, batch: &DetectionBatch) -> Result<()>;

    /// Oldest-first vehicle records, capped at `limit`.
    fn vehicles(&mut self, limit: usize) -> Result<Vec<VehicleRecord>>;

    /// Oldest-first other-object records, capped at `limit`.
    fn objects(&mut self, limit: usize) -> Result<Vec<ObjectRecord>>;

    /// The most recently appended record, either category.
    fn latest(&mut self) -> Result<Option<LatestDetection>>;

    fn stats(&mut self) -> Result<SessionStats>;

    /// Drop every record in the session.
    fn clear_session(&mut self) -> Result<()>;

    /// Delete records captured before `cutoff_s`. Returns rows deleted.
    fn prune_before(&mut self, cutoff_s: i64) -> Result<u64>;
}

pub struct SqliteDetectionStore {
    conn: Connection,
}

impl SqliteDetectionStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS vehicles (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              detected_at INTEGER NOT NULL,
              source TEXT NOT NULL,
              vehicle_type TEXT NOT NULL,
              confidence REAL NOT NULL,
              color TEXT,
              license_plate TEXT
            );

            CREATE TABLE IF NOT EXISTS other_objects (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              detected_at INTEGER NOT NULL,
              source TEXT NOT NULL,
              object_type TEXT NOT NULL,
              confidence REAL NOT NULL,
              location TEXT,
              size_category TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_vehicles_detected ON vehicles(detected_at);
            CREATE INDEX IF NOT EXISTS idx_objects_detected ON other_objects(detected_at);
            "#,
        )?;
        Ok(())
    }

    fn latest_vehicle(&self) -> Result<Option<VehicleRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT detected_at, source, vehicle_type, confidence, color, license_plate
             FROM vehicles ORDER BY id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(vehicle_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn latest_object(&self) -> Result<Option<ObjectRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT detected_at, source, object_type, confidence, location, size_category
             FROM other_objects ORDER BY id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(object_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn type_counts(&self, table: &str, column: &str) -> Result<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {column}, COUNT(*) FROM {table} GROUP BY {column}"
        ))?;
        let mut rows = stmt.query([])?;
        let mut counts = Vec::new();
        while let Some(row) = rows.next()? {
            let label: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            counts.push((label, count as u64));
        }
        Ok(counts)
    }

    fn count_and_mean(&self, table: &str) -> Result<(u64, f64)> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT COUNT(*), AVG(confidence) FROM {table}"))?;
        let mut rows = stmt.query([])?;
        let row = rows
            .next()?
            .ok_or_else(|| anyhow!("aggregate query returned no row"))?;
        let count: i64 = row.get(0)?;
        let mean: Option<f64> = row.get(1)?;
        Ok((count as u64, mean.unwrap_or(0.0)))
    }
}

fn vehicle_from_row(row: &rusqlite::Row<'_>) -> Result<VehicleRecord> {
    Ok(VehicleRecord {
        detected_at_s: row.get(0)?,
        source: row.get(1)?,
        vehicle_type: row.get(2)?,
        confidence: row.get(3)?,
        color: row.get(4)?,
        license_plate: row.get(5)?,
    })
}

fn object_from_row(row: &rusqlite::Row<'_>) -> Result<ObjectRecord> {
    Ok(ObjectRecord {
        detected_at_s: row.get(0)?,
        source: row.get(1)?,
        object_type: row.get(2)?,
        confidence: row.get(3)?,
        location: row.get(4)?,
        size_category: row.get(5)?,
    })
}

impl DetectionStore for SqliteDetectionStore {
    fn append_batch(&mut self, batch: &DetectionBatch) -> Result<()> {
        let tx = self.conn.transaction()?;
        for vehicle in &batch.vehicles {
            tx.execute(
                r#"
                INSERT INTO vehicles(detected_at, source, vehicle_type, confidence, color, license_plate)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    vehicle.detected_at_s,
                    vehicle.source,
                    vehicle.vehicle_type,
                    vehicle.confidence,
                    vehicle.color,
                    vehicle.license_plate
                ],
            )?;
        }
        for object in &batch.others {
            tx.execute(
                r#"
                INSERT INTO other_objects(detected_at, source, object_type, confidence, location, size_category)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    object.detected_at_s,
                    object.source,
                    object.object_type,
                    object.confidence,
                    object.location,
                    object.size_category
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn vehicles(&mut self, limit: usize) -> Result<Vec<VehicleRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT detected_at, source, vehicle_type, confidence, color, license_plate
             FROM vehicles ORDER BY id ASC LIMIT ?1",
        )?;
        let mut rows = stmt.query(params![limit])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(vehicle_from_row(row)?);
        }
        Ok(out)
    }

    fn objects(&mut self, limit: usize) -> Result<Vec<ObjectRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT detected_at, source, object_type, confidence, location, size_category
             FROM other_objects ORDER BY id ASC LIMIT ?1",
        )?;
        let mut rows = stmt.query(params![limit])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(object_from_row(row)?);
        }
        Ok(out)
    }

    fn latest(&mut self) -> Result<Option<LatestDetection>> {
        let vehicle = self.latest_vehicle()?;
        let object = self.latest_object()?;
        // Batches append vehicles before objects, so on equal capture
        // times the object record is the later one.
        Ok(match (vehicle, object) {
            (Some(v), Some(o)) => {
                if v.detected_at_s > o.detected_at_s {
                    Some(LatestDetection::Vehicle(v))
                } else {
                    Some(LatestDetection::OtherObject(o))
                }
            }
            (Some(v), None) => Some(LatestDetection::Vehicle(v)),
            (None, Some(o)) => Some(LatestDetection::OtherObject(o)),
            (None, None) => None,
        })
    }

    fn stats(&mut self) -> Result<SessionStats> {
        let (vehicles, mean_vehicle_confidence) = self.count_and_mean("vehicles")?;
        let (other_objects, mean_object_confidence) = self.count_and_mean("other_objects")?;
        let vehicle_types = self.type_counts("vehicles", "vehicle_type")?;
        let object_types = self.type_counts("other_objects", "object_type")?;
        Ok(SessionStats {
            vehicles,
            other_objects,
            detections_processed: vehicles + other_objects,
            vehicle_types: vehicle_types.into_iter().collect(),
            object_types: object_types.into_iter().collect(),
            mean_vehicle_confidence,
            mean_object_confidence,
        })
    }

    fn clear_session(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM vehicles", [])?;
        self.conn.execute("DELETE FROM other_objects", [])?;
        Ok(())
    }

    fn prune_before(&mut self, cutoff_s: i64) -> Result<u64> {
        let vehicles = self
            .conn
            .execute("DELETE FROM vehicles WHERE detected_at < ?1", params![cutoff_s])?;
        let objects = self.conn.execute(
            "DELETE FROM other_objects WHERE detected_at < ?1",
            params![cutoff_s],
        )?;
        Ok((vehicles + objects) as u64)
    }
}

/// Vec-backed store with the same semantics as the SQLite store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDetectionStore {
    vehicles: Vec<VehicleRecord>,
    objects: Vec<ObjectRecord>,
    latest: Option<LatestDetection>,
}

impl DetectionStore for InMemoryDetectionStore {
    fn append_batch(&mut self, batch: &DetectionBatch) -> Result<()> {
        self.vehicles.extend(batch.vehicles.iter().cloned());
        self.objects.extend(batch.others.iter().cloned());
        if let Some(object) = batch.others.last() {
            self.latest = Some(LatestDetection::OtherObject(object.clone()));
        } else if let Some(vehicle) = batch.vehicles.last() {
            self.latest = Some(LatestDetection::Vehicle(vehicle.clone()));
        }
        Ok(())
    }

    fn vehicles(&mut self, limit: usize) -> Result<Vec<VehicleRecord>> {
        Ok(self.vehicles.iter().take(limit).cloned().collect())
    }

    fn objects(&mut self, limit: usize) -> Result<Vec<ObjectRecord>> {
        Ok(self.objects.iter().take(limit).cloned().collect())
    }

    fn latest(&mut self) -> Result<Option<LatestDetection>> {
        Ok(self.latest.clone())
    }

    fn stats(&mut self) -> Result<SessionStats> {
        let mut stats = SessionStats {
            vehicles: self.vehicles.len() as u64,
            other_objects: self.objects.len() as u64,
            detections_processed: (self.vehicles.len() + self.objects.len()) as u64,
            ..SessionStats::default()
        };
        for vehicle in &self.vehicles {
            *stats
                .vehicle_types
                .entry(vehicle.vehicle_type.clone())
                .or_insert(0) += 1;
        }
        for object in &self.objects {
            *stats
                .object_types
                .entry(object.object_type.clone())
                .or_insert(0) += 1;
        }
        if !self.vehicles.is_empty() {
            stats.mean_vehicle_confidence = self.vehicles.iter().map(|v| v.confidence).sum::<f64>()
                / self.vehicles.len() as f64;
        }
        if !self.objects.is_empty() {
            stats.mean_object_confidence =
                self.objects.iter().map(|o| o.confidence).sum::<f64>() / self.objects.len() as f64;
        }
        Ok(stats)
    }

    fn clear_session(&mut self) -> Result<()> {
        self.vehicles.clear();
        self.objects.clear();
        self.latest = None;
        Ok(())
    }

    fn prune_before(&mut self, cutoff_s: i64) -> Result<u64> {
        let before = self.vehicles.len() + self.objects.len();
        self.vehicles.retain(|v| v.detected_at_s >= cutoff_s);
        self.objects.retain(|o| o.detected_at_s >= cutoff_s);
        Ok((before - self.vehicles.len() - self.objects.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(detected_at_s: i64) -> DetectionBatch {
        DetectionBatch {
            vehicles: vec![VehicleRecord {
                detected_at_s,
                source: "ivcam_live".to_string(),
                vehicle_type: "car".to_string(),
                confidence: 0.9,
                color: Some("blue".to_string()),
                license_plate: Some("AB123CD".to_string()),
            }],
            others: vec![ObjectRecord {
                detected_at_s,
                source: "ivcam_live".to_string(),
                object_type: "person".to_string(),
                confidence: 0.7,
                location: Some("crosswalk".to_string()),
                size_category: None,
            }],
        }
    }

    fn exercise_store(store: &mut dyn DetectionStore) {
        store.append_batch(&batch(100)).unwrap();
        store.append_batch(&batch(200)).unwrap();

        let vehicles = store.vehicles(10).unwrap();
        assert_eq!(vehicles.len(), 2);
        assert_eq!(vehicles[0].detected_at_s, 100);
        assert_eq!(vehicles[1].detected_at_s, 200);
        assert_eq!(store.vehicles(1).unwrap().len(), 1);

        let stats = store.stats().unwrap();
        assert_eq!(stats.vehicles, 2);
        assert_eq!(stats.other_objects, 2);
        assert_eq!(stats.detections_processed, 4);
        assert_eq!(stats.vehicle_types.get("car"), Some(&2));
        assert!((stats.mean_vehicle_confidence - 0.9).abs() < 1e-9);
        assert!((stats.mean_object_confidence - 0.7).abs() < 1e-9);

        // The object half of the newest batch is the latest record.
        let latest = store.latest().unwrap().expect("latest");
        assert_eq!(latest.detected_at_s(), 200);
        assert!(matches!(latest, LatestDetection::OtherObject(_)));

        assert_eq!(store.prune_before(150).unwrap(), 2);
        let stats = store.stats().unwrap();
        assert_eq!(stats.detections_processed, 2);

        store.clear_session().unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.detections_processed, 0);
        assert!(store.stats().unwrap().vehicle_types.is_empty());
    }

    #[test]
    fn in_memory_store_roundtrip() {
        let mut store = InMemoryDetectionStore::default();
        exercise_store(&mut store);
        assert!(store.latest().unwrap().is_none());
    }

    #[test]
    fn sqlite_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("analytics.db");
        let mut store = SqliteDetectionStore::open(db_path.to_str().unwrap()).unwrap();
        exercise_store(&mut store);

        // Data survives reopen.
        store.append_batch(&batch(300)).unwrap();
        drop(store);
        let mut store = SqliteDetectionStore::open(db_path.to_str().unwrap()).unwrap();
        assert_eq!(store.stats().unwrap().detections_processed, 2);
    }

    #[test]
    fn sqlite_latest_empty_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("analytics.db");
        let mut store = SqliteDetectionStore::open(db_path.to_str().unwrap()).unwrap();
        assert!(store.latest().unwrap().is_none());
    }
}
