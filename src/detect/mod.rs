//! Detection backend seam.
//!
//! The daemon never runs a model locally: frames go to a backend selected
//! by the configured URL scheme. `http(s)` URLs get the remote inference
//! service; `stub` URLs get a deterministic offline backend for tests and
//! demos.

mod backend;
pub mod backends;

pub use backend::DetectionBackend;
pub use backends::remote::RemoteBackend;
pub use backends::stub::StubBackend;

use anyhow::{anyhow, Result};
use url::Url;

use crate::config::BackendSettings;

/// Pick the backend matching the configured base URL.
pub fn select_backend(settings: &BackendSettings) -> Result<Box<dyn DetectionBackend>> {
    let url = Url::parse(&settings.base_url)
        .map_err(|e| anyhow!("invalid backend url '{}': {}", settings.base_url, e))?;
    match url.scheme() {
        "http" | "https" => Ok(Box::new(RemoteBackend::new(settings))),
        "stub" => Ok(Box::new(StubBackend::new())),
        other => Err(anyhow!(
            "unsupported backend scheme '{}'; expected http(s) or stub",
            other
        )),
    }
}
