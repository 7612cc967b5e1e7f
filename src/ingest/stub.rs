//! Synthetic camera source for `stub://` URLs.
//!
//! Produces gradient frames encoded as real JPEGs so the rest of the
//! pipeline (dimension decode, content hashing, backend upload) exercises
//! the same code paths as a live camera. The gradient shifts every frame,
//! so consecutive frames never hash equal.

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use std::io::Cursor;
use std::time::{Duration, Instant};

use crate::config::CameraSettings;
use crate::frame::CapturedFrame;
use crate::ingest::CameraStats;
use crate::now_s;

const FRAME_WIDTH: u32 = 640;
const FRAME_HEIGHT: u32 = 480;

pub struct SyntheticCameraSource {
    settings: CameraSettings,
    connected: bool,
    last_frame_at: Option<Instant>,
    frame_count: u64,
}

impl SyntheticCameraSource {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            settings,
            connected: false,
            last_frame_at: None,
            frame_count: 0,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<CapturedFrame> {
        if !self.connected {
            self.connect()?;
        }
        // Pace to the configured fps like a real stream would.
        let interval = Duration::from_secs_f64(1.0 / f64::from(self.settings.target_fps.max(1)));
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        let jpeg = synthetic_jpeg(self.frame_count)?;
        Ok(CapturedFrame::new(
            jpeg,
            FRAME_WIDTH,
            FRAME_HEIGHT,
            now_s()? as i64,
            self.frame_count,
        ))
    }

    pub fn is_healthy(&self) -> bool {
        self.connected
    }

    pub fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.settings.url.clone(),
        }
    }
}

fn synthetic_jpeg(sequence: u64) -> Result<Vec<u8>> {
    let shift = (sequence % 256) as u8;
    let image = RgbImage::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
        Rgb([
            (x % 256) as u8,
            (y % 256) as u8,
            (x % 256) as u8 ^ shift,
        ])
    });
    let mut bytes = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, image::ImageFormat::Jpeg)
        .context("encode synthetic jpeg")?;
    Ok(bytes.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CameraSettings {
        CameraSettings {
            url: "stub://camera".to_string(),
            target_fps: 30,
            detect_interval: Duration::from_secs(1),
        }
    }

    #[test]
    fn frames_decode_and_differ() {
        let mut source = SyntheticCameraSource::new(settings());
        source.connect().unwrap();
        let a = source.next_frame().unwrap();
        let b = source.next_frame().unwrap();
        assert_eq!(a.width, FRAME_WIDTH);
        assert_eq!(a.height, FRAME_HEIGHT);
        assert_ne!(a.content_hash, b.content_hash);
        assert!(image::load_from_memory(&a.jpeg).is_ok());
    }

    #[test]
    fn sequence_counts_up() {
        let mut source = SyntheticCameraSource::new(settings());
        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(source.stats().frames_captured, 2);
    }
}
