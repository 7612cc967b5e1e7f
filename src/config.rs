use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "analytics.db";
const DEFAULT_API_ADDR: &str = "127.0.0.1:8791";
const DEFAULT_CAMERA_URL: &str = "http://192.168.1.5:8080/video";
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_DETECT_INTERVAL_S: u64 = 3;
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_BACKEND_TIMEOUT_S: u64 = 30;
const DEFAULT_SOURCE_TAG: &str = "ivcam_live";
const DEFAULT_EXPORT_DIR: &str = "reports";
const DEFAULT_RETENTION_SECS: u64 = 60 * 60 * 24 * 7;

/// The original dashboard exposed the detection frequency as a 1..=10
/// second slider; the daemon enforces the same range.
pub const MIN_DETECT_INTERVAL_S: u64 = 1;
pub const MAX_DETECT_INTERVAL_S: u64 = 10;

#[derive(Debug, Deserialize, Default)]
struct AnalyticsdConfigFile {
    db_path: Option<String>,
    api: Option<ApiConfigFile>,
    camera: Option<CameraConfigFile>,
    backend: Option<BackendConfigFile>,
    export_dir: Option<String>,
    retention: Option<RetentionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
    token_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    detect_interval_s: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct BackendConfigFile {
    url: Option<String>,
    timeout_s: Option<u64>,
    source_tag: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RetentionConfigFile {
    seconds: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AnalyticsdConfig {
    pub db_path: String,
    pub api_addr: String,
    pub api_token_path: Option<PathBuf>,
    pub camera: CameraSettings,
    pub backend: BackendSettings,
    pub export_dir: PathBuf,
    pub retention: Duration,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub target_fps: u32,
    /// Minimum spacing between frames submitted for detection.
    pub detect_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub timeout: Duration,
    /// Source label attached to frames this daemon submits.
    pub source_tag: String,
}

impl AnalyticsdConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("VEHICLE_ANALYTICS_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AnalyticsdConfigFile) -> Self {
        let db_path = file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let api_addr = file
            .api
            .as_ref()
            .and_then(|api| api.addr.clone())
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let api_token_path = file.api.and_then(|api| api.token_path);
        let camera = CameraSettings {
            url: file
                .camera
                .as_ref()
                .and_then(|camera| camera.url.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
            detect_interval: Duration::from_secs(
                file.camera
                    .as_ref()
                    .and_then(|camera| camera.detect_interval_s)
                    .unwrap_or(DEFAULT_DETECT_INTERVAL_S),
            ),
        };
        let backend = BackendSettings {
            base_url: file
                .backend
                .as_ref()
                .and_then(|backend| backend.url.clone())
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            timeout: Duration::from_secs(
                file.backend
                    .as_ref()
                    .and_then(|backend| backend.timeout_s)
                    .unwrap_or(DEFAULT_BACKEND_TIMEOUT_S),
            ),
            source_tag: file
                .backend
                .and_then(|backend| backend.source_tag)
                .unwrap_or_else(|| DEFAULT_SOURCE_TAG.to_string()),
        };
        let export_dir = PathBuf::from(
            file.export_dir
                .unwrap_or_else(|| DEFAULT_EXPORT_DIR.to_string()),
        );
        let retention = Duration::from_secs(
            file.retention
                .and_then(|retention| retention.seconds)
                .unwrap_or(DEFAULT_RETENTION_SECS),
        );
        Self {
            db_path,
            api_addr,
            api_token_path,
            camera,
            backend,
            export_dir,
            retention,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("VA_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(addr) = std::env::var("VA_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(path) = std::env::var("VA_API_TOKEN_PATH") {
            if !path.trim().is_empty() {
                self.api_token_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(url) = std::env::var("VA_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(url) = std::env::var("VA_BACKEND_URL") {
            if !url.trim().is_empty() {
                self.backend.base_url = url;
            }
        }
        if let Ok(interval) = std::env::var("VA_DETECT_INTERVAL_S") {
            if !interval.trim().is_empty() {
                let seconds: u64 = interval.parse().map_err(|_| {
                    anyhow!("VA_DETECT_INTERVAL_S must be an integer number of seconds")
                })?;
                self.camera.detect_interval = Duration::from_secs(seconds);
            }
        }
        if let Ok(dir) = std::env::var("VA_EXPORT_DIR") {
            if !dir.trim().is_empty() {
                self.export_dir = PathBuf::from(dir);
            }
        }
        if let Ok(retention) = std::env::var("VA_RETENTION_SECS") {
            if !retention.trim().is_empty() {
                let seconds: u64 = retention
                    .parse()
                    .map_err(|_| anyhow!("VA_RETENTION_SECS must be an integer number of seconds"))?;
                self.retention = Duration::from_secs(seconds);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        validate_stream_url(&self.camera.url, "camera")?;
        validate_stream_url(&self.backend.base_url, "backend")?;

        let interval = self.camera.detect_interval.as_secs();
        if !(MIN_DETECT_INTERVAL_S..=MAX_DETECT_INTERVAL_S).contains(&interval) {
            return Err(anyhow!(
                "detect interval must be between {} and {} seconds, got {}",
                MIN_DETECT_INTERVAL_S,
                MAX_DETECT_INTERVAL_S,
                interval
            ));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be greater than zero"));
        }
        if self.backend.timeout.as_secs() == 0 {
            return Err(anyhow!("backend timeout must be greater than zero"));
        }
        if self.retention.as_secs() == 0 {
            return Err(anyhow!("retention must be greater than zero"));
        }
        Ok(())
    }
}

/// Configuration for the API-only service (`analytics_api`), which serves
/// an existing session database without ingesting a stream.
#[derive(Debug, Clone)]
pub struct AnalyticsApiConfig {
    pub db_path: String,
    pub api_addr: String,
    pub api_token_path: Option<PathBuf>,
}

impl AnalyticsApiConfig {
    pub fn load() -> Result<Self> {
        let full = AnalyticsdConfig::load()?;
        Ok(Self {
            db_path: full.db_path,
            api_addr: full.api_addr,
            api_token_path: full.api_token_path,
        })
    }
}

/// Accepts `http(s)` endpoints and the `stub` scheme used for synthetic
/// sources and the offline detection backend.
pub fn validate_stream_url(raw: &str, what: &str) -> Result<()> {
    let url = url::Url::parse(raw).map_err(|e| anyhow!("invalid {} url '{}': {}", what, raw, e))?;
    match url.scheme() {
        "http" | "https" | "stub" => Ok(()),
        other => Err(anyhow!(
            "unsupported {} url scheme '{}'; expected http(s) or stub",
            what,
            other
        )),
    }
}

fn read_config_file(path: &Path) -> Result<AnalyticsdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
