use anyhow::Result;

use crate::DetectionBatch;

/// Detection backend trait.
///
/// Implementations receive the encoded JPEG for one sampled frame and
/// return the split detection batch. They must not retain the frame bytes
/// beyond the `detect` call.
pub trait DetectionBackend: Send {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Run detection on one frame.
    ///
    /// `source` is the capture source label recorded on every result
    /// (`ivcam_live`, `manual_upload`, ...).
    fn detect(&mut self, frame_jpeg: &[u8], source: &str) -> Result<DetectionBatch>;

    /// Optional startup probe. A failure is reported but not fatal; the
    /// daemon retries detection per frame regardless.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
