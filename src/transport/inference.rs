//! Inference service wire contract.
//!
//! The service exposes three endpoints under one base URL:
//! - `POST /detect`: multipart form with an `image` file part and a
//!   `source` text part; returns the split detection lists.
//! - `GET /export`: returns the accumulated session CSVs.
//! - `GET /health`: returns service counters.
//!
//! Parsing is tolerant: unknown fields are ignored and optional fields
//! default, so the client survives service-side schema additions.

use anyhow::{anyhow, Context, Result};
use rand::RngCore;
use serde::Deserialize;
use std::io::Read;

use crate::config::BackendSettings;

const MAX_RESPONSE_BYTES: u64 = 32 * 1024 * 1024;

/// Response to a `/detect` call.
#[derive(Debug, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub detections: WireDetections,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireDetections {
    #[serde(default)]
    pub vehicles: Vec<WireVehicle>,
    #[serde(default)]
    pub other_objects: Vec<WireObject>,
}

/// One vehicle entry as the service reports it.
#[derive(Debug, Deserialize)]
pub struct WireVehicle {
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub license_plate: Option<String>,
}

/// One non-vehicle entry as the service reports it.
#[derive(Debug, Deserialize)]
pub struct WireObject {
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub size_category: Option<String>,
}

/// Response to a `/export` call. Either CSV may be absent when the
/// service has no data for that category yet.
#[derive(Debug, Deserialize)]
pub struct ExportResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub vehicles_csv: Option<String>,
    #[serde(default)]
    pub other_objects_csv: Option<String>,
}

/// Response to a `/health` probe.
#[derive(Debug, Default, Deserialize)]
pub struct BackendHealth {
    #[serde(default)]
    pub detections_processed: u64,
}

/// HTTP client for the inference service.
pub struct BackendClient {
    agent: ureq::Agent,
    base_url: String,
}

impl BackendClient {
    pub fn new(settings: &BackendSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(settings.timeout)
            .build();
        Self {
            agent,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit one JPEG frame for detection.
    pub fn detect(&self, jpeg: &[u8], source: &str) -> Result<DetectResponse> {
        let boundary = multipart_boundary();
        let body = encode_multipart(&boundary, jpeg, source);
        let url = format!("{}/detect", self.base_url);
        let response = self
            .agent
            .post(&url)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body)
            .with_context(|| format!("submit frame to {}", url))?;
        let parsed: DetectResponse = read_json(response).context("parse /detect response")?;
        if !parsed.success {
            return Err(anyhow!("inference service rejected the frame (/detect)"));
        }
        Ok(parsed)
    }

    /// Fetch the accumulated session CSVs from the service.
    pub fn export(&self) -> Result<ExportResponse> {
        let url = format!("{}/export", self.base_url);
        let response = self
            .agent
            .get(&url)
            .call()
            .with_context(|| format!("fetch export from {}", url))?;
        let parsed: ExportResponse = read_json(response).context("parse /export response")?;
        if !parsed.success {
            return Err(anyhow!("inference service reported no export (/export)"));
        }
        Ok(parsed)
    }

    /// Probe service health.
    pub fn health(&self) -> Result<BackendHealth> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .agent
            .get(&url)
            .call()
            .with_context(|| format!("probe {}", url))?;
        read_json(response).context("parse /health response")
    }
}

fn read_json<T: serde::de::DeserializeOwned>(response: ureq::Response) -> Result<T> {
    let mut body = String::new();
    response
        .into_reader()
        .take(MAX_RESPONSE_BYTES)
        .read_to_string(&mut body)
        .context("read response body")?;
    serde_json::from_str(&body).map_err(|e| anyhow!("unexpected response body: {}", e))
}

fn multipart_boundary() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("vad-{}", hex::encode(bytes))
}

/// Assemble the two-part form body: the `image` file part and the
/// `source` text part, CRLF line endings throughout.
fn encode_multipart(boundary: &str, jpeg: &[u8], source: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(jpeg.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"image\"; filename=\"detection.jpg\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    body.extend_from_slice(jpeg);
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"source\"\r\n\r\n");
    body.extend_from_slice(source.as_bytes());
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
