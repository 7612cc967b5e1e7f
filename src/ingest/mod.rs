//! Camera frame sources.
//!
//! This module provides the sources the daemon can capture from:
//! - Phone camera apps streaming MJPEG or single JPEGs over HTTP (IVCam
//!   and similar apps expose `http://<phone>:8080/video`)
//! - Synthetic frames (`stub://` URLs) for tests and offline runs
//!
//! All sources produce `CapturedFrame` instances. The ingestion layer is
//! responsible for:
//! - Rate limiting / frame decimation to the configured fps
//! - Decoding frame dimensions and hashing content at capture time
//!
//! Detection-interval sampling happens later, in `FrameSampler`; sources
//! deliver every decimated frame so the dashboard can stay live even
//! between detection calls.

mod http;
mod stub;

pub use http::HttpCameraSource;
pub use stub::SyntheticCameraSource;

use anyhow::{anyhow, Result};
use url::Url;

use crate::config::CameraSettings;
use crate::frame::CapturedFrame;

/// Camera source facade. Dispatches on the URL scheme.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Http(HttpCameraSource),
    Synthetic(SyntheticCameraSource),
}

impl CameraSource {
    pub fn new(settings: CameraSettings) -> Result<Self> {
        let url = Url::parse(&settings.url)
            .map_err(|e| anyhow!("invalid camera url '{}': {}", settings.url, e))?;
        let backend = match url.scheme() {
            "http" | "https" => CameraBackend::Http(HttpCameraSource::new(settings)),
            "stub" => CameraBackend::Synthetic(SyntheticCameraSource::new(settings)),
            other => {
                return Err(anyhow!(
                    "unsupported camera scheme '{}'; expected http(s) or stub",
                    other
                ))
            }
        };
        Ok(Self { backend })
    }

    /// Connect to the stream. Can be called again to reconnect.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Http(source) => source.connect(),
            CameraBackend::Synthetic(source) => source.connect(),
        }
    }

    /// Capture the next frame, blocking until one is available.
    pub fn next_frame(&mut self) -> Result<CapturedFrame> {
        match &mut self.backend {
            CameraBackend::Http(source) => source.next_frame(),
            CameraBackend::Synthetic(source) => source.next_frame(),
        }
    }

    /// Check if the source is delivering frames.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Http(source) => source.is_healthy(),
            CameraBackend::Synthetic(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Http(source) => source.stats(),
            CameraBackend::Synthetic(source) => source.stats(),
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub url: String,
}
