//! HTTP camera source.
//!
//! Phone camera apps expose either a `multipart/x-mixed-replace` MJPEG
//! stream or a plain JPEG endpoint that returns one snapshot per request.
//! `connect()` sniffs the Content-Type and picks the matching mode; frames
//! are decimated to the configured fps either way.

use anyhow::{anyhow, Context, Result};
use image::GenericImageView;
use std::io::Read;
use std::time::{Duration, Instant};

use crate::config::CameraSettings;
use crate::frame::CapturedFrame;
use crate::ingest::CameraStats;
use crate::now_s;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

pub struct HttpCameraSource {
    settings: CameraSettings,
    stream: Option<StreamMode>,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    frame_count: u64,
}

enum StreamMode {
    Mjpeg(MjpegStream),
    Snapshot,
}

impl HttpCameraSource {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            settings,
            stream: None,
            last_frame_at: None,
            connected_at: None,
            frame_count: 0,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        let response = ureq::get(&self.settings.url)
            .call()
            .with_context(|| format!("connect to camera stream {}", self.settings.url))?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            self.stream = Some(StreamMode::Mjpeg(MjpegStream::new(response.into_reader())));
        } else {
            self.stream = Some(StreamMode::Snapshot);
        }
        self.connected_at = Some(Instant::now());
        self.last_frame_at = None;
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<CapturedFrame> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("camera source not connected; call connect() first"))?;
        let min_interval = frame_interval(self.settings.target_fps);
        loop {
            let jpeg = match stream {
                StreamMode::Mjpeg(stream) => stream.read_next_jpeg(),
                StreamMode::Snapshot => fetch_snapshot(&self.settings.url),
            }?;

            let now = Instant::now();
            if let Some(last) = self.last_frame_at {
                if now.duration_since(last) < min_interval {
                    continue;
                }
            }

            // Frames that fail to decode are skipped, not fatal: phone
            // streams drop partial JPEGs on network hiccups.
            let (width, height) = match jpeg_dimensions(&jpeg) {
                Ok(dims) => dims,
                Err(e) => {
                    log::warn!("skipping undecodable frame: {}", e);
                    continue;
                }
            };

            self.frame_count += 1;
            self.last_frame_at = Some(now);

            return Ok(CapturedFrame::new(
                jpeg,
                width,
                height,
                now_s()? as i64,
                self.frame_count,
            ));
        }
    }

    pub fn is_healthy(&self) -> bool {
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= health_grace(self.settings.target_fps)
    }

    pub fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.settings.url.clone(),
        }
    }
}

/// Incremental scanner over a multipart MJPEG byte stream.
///
/// Part headers and boundaries are ignored; frames are located by their
/// JPEG SOI/EOI markers, which survives the boundary-format differences
/// between camera apps.
struct MjpegStream {
    reader: Box<dyn Read + Send + Sync + 'static>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send + Sync + 'static>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            // A buffer that grows past two max-size frames without a
            // complete frame is garbage; keep only the tail.
            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let drain_len = self.buffer.len() - MAX_JPEG_BYTES;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

fn fetch_snapshot(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64 + 1)
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    if bytes.len() > MAX_JPEG_BYTES {
        return Err(anyhow!("jpeg snapshot exceeds {} bytes", MAX_JPEG_BYTES));
    }
    Ok(bytes)
}

fn jpeg_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let image = image::load_from_memory(bytes).context("decode jpeg")?;
    Ok(image.dimensions())
}

/// Locate one complete JPEG (SOI..EOI) in `buffer`.
fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?;
    Some((start, start + 2 + end + 2))
}

fn frame_interval(target_fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(target_fps.max(1)))
}

fn health_grace(target_fps: u32) -> Duration {
    let interval = frame_interval(target_fps);
    (interval * 4).max(Duration::from_secs(2))
}
