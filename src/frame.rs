//! Captured frames and submission sampling.
//!
//! Every frame a camera source yields is a `CapturedFrame`: the encoded
//! JPEG plus dimensions, capture time, and a content hash computed at
//! capture. The `FrameSampler` decides which of those frames are actually
//! submitted to the detection backend: one per configured interval, and
//! never the same content twice in a row.

use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

/// A single frame captured from a camera source.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    /// Encoded JPEG bytes, as received from (or re-encoded for) the wire.
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Capture time, epoch seconds.
    pub captured_at_s: i64,
    /// Monotonic frame counter within the source.
    pub sequence: u64,
    /// SHA-256 of the JPEG bytes, computed at capture time.
    pub content_hash: [u8; 32],
}

impl CapturedFrame {
    pub fn new(jpeg: Vec<u8>, width: u32, height: u32, captured_at_s: i64, sequence: u64) -> Self {
        let content_hash: [u8; 32] = Sha256::digest(&jpeg).into();
        Self {
            jpeg,
            width,
            height,
            captured_at_s,
            sequence,
            content_hash,
        }
    }
}

/// Decides which captured frames are submitted for detection.
///
/// Two gates, both of which must pass:
/// - at least `interval` has elapsed since the last submission;
/// - the frame content differs from the last submitted frame (a stalled
///   camera repeating one image is not resubmitted).
///
/// The first frame always passes.
pub struct FrameSampler {
    interval: Duration,
    last_submitted_at: Option<Instant>,
    last_submitted_hash: Option<[u8; 32]>,
    submitted: u64,
    skipped_interval: u64,
    skipped_duplicate: u64,
}

/// Sampler counters for the periodic health log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub submitted: u64,
    pub skipped_interval: u64,
    pub skipped_duplicate: u64,
}

impl FrameSampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_submitted_at: None,
            last_submitted_hash: None,
            submitted: 0,
            skipped_interval: 0,
            skipped_duplicate: 0,
        }
    }

    /// Returns true when `frame` should be submitted, and marks it as the
    /// latest submission if so.
    pub fn should_submit(&mut self, frame: &CapturedFrame) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_submitted_at {
            if now.duration_since(last) < self.interval {
                self.skipped_interval += 1;
                return false;
            }
        }
        if self.last_submitted_hash == Some(frame.content_hash) {
            self.skipped_duplicate += 1;
            return false;
        }
        self.last_submitted_at = Some(now);
        self.last_submitted_hash = Some(frame.content_hash);
        self.submitted += 1;
        true
    }

    pub fn stats(&self) -> SamplerStats {
        SamplerStats {
            submitted: self.submitted,
            skipped_interval: self.skipped_interval,
            skipped_duplicate: self.skipped_duplicate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(bytes: &[u8], sequence: u64) -> CapturedFrame {
        CapturedFrame::new(bytes.to_vec(), 640, 480, 1_700_000_000, sequence)
    }

    #[test]
    fn first_frame_always_passes() {
        let mut sampler = FrameSampler::new(Duration::from_secs(3));
        assert!(sampler.should_submit(&frame(b"a", 0)));
        assert_eq!(sampler.stats().submitted, 1);
    }

    #[test]
    fn interval_gate_blocks_rapid_frames() {
        let mut sampler = FrameSampler::new(Duration::from_secs(3));
        assert!(sampler.should_submit(&frame(b"a", 0)));
        assert!(!sampler.should_submit(&frame(b"b", 1)));
        assert_eq!(sampler.stats().skipped_interval, 1);
    }

    #[test]
    fn duplicate_content_is_not_resubmitted() {
        // Zero interval isolates the duplicate gate.
        let mut sampler = FrameSampler::new(Duration::from_secs(0));
        assert!(sampler.should_submit(&frame(b"same", 0)));
        assert!(!sampler.should_submit(&frame(b"same", 1)));
        assert!(sampler.should_submit(&frame(b"different", 2)));
        let stats = sampler.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.skipped_duplicate, 1);
    }

    #[test]
    fn content_hash_tracks_bytes() {
        let a = frame(b"a", 0);
        let b = frame(b"a", 1);
        let c = frame(b"c", 2);
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
    }
}
