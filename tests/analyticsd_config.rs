use std::sync::Mutex;

use tempfile::NamedTempFile;

use vehicle_analytics::config::AnalyticsdConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "VEHICLE_ANALYTICS_CONFIG",
        "VA_DB_PATH",
        "VA_API_ADDR",
        "VA_API_TOKEN_PATH",
        "VA_CAMERA_URL",
        "VA_BACKEND_URL",
        "VA_DETECT_INTERVAL_S",
        "VA_EXPORT_DIR",
        "VA_RETENTION_SECS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_defaults_without_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AnalyticsdConfig::load().expect("load config");
    assert_eq!(cfg.db_path, "analytics.db");
    assert_eq!(cfg.api_addr, "127.0.0.1:8791");
    assert_eq!(cfg.camera.url, "http://192.168.1.5:8080/video");
    assert_eq!(cfg.camera.detect_interval.as_secs(), 3);
    assert_eq!(cfg.backend.base_url, "http://127.0.0.1:5000");
    assert_eq!(cfg.backend.timeout.as_secs(), 30);
    assert_eq!(cfg.backend.source_tag, "ivcam_live");
    assert_eq!(cfg.retention.as_secs(), 60 * 60 * 24 * 7);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let token_path = file.path().with_extension("token");
    let json = format!(
        r#"{{
            "db_path": "analytics_prod.db",
            "api": {{
                "addr": "0.0.0.0:9100",
                "token_path": "{}"
            }},
            "camera": {{
                "url": "http://10.0.0.7:8080/video",
                "target_fps": 12,
                "detect_interval_s": 5
            }},
            "backend": {{
                "url": "https://dbc-484c2988-d6e6.cloud.example.com/driver-proxy-api/o/0/5000",
                "timeout_s": 20,
                "source_tag": "garage_cam"
            }},
            "export_dir": "prod_reports",
            "retention": {{
                "seconds": 43200
            }}
        }}"#,
        token_path.display()
    );
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("VEHICLE_ANALYTICS_CONFIG", file.path());
    std::env::set_var("VA_CAMERA_URL", "http://10.0.0.9:8080/video");
    std::env::set_var("VA_DETECT_INTERVAL_S", "2");
    std::env::set_var("VA_RETENTION_SECS", "86400");
    // Blank values must not override the file.
    std::env::set_var("VA_BACKEND_URL", "  ");

    let cfg = AnalyticsdConfig::load().expect("load config");
    clear_env();

    assert_eq!(cfg.db_path, "analytics_prod.db");
    assert_eq!(cfg.api_addr, "0.0.0.0:9100");
    assert_eq!(cfg.api_token_path.as_deref(), Some(token_path.as_path()));
    // Env wins over the file.
    assert_eq!(cfg.camera.url, "http://10.0.0.9:8080/video");
    assert_eq!(cfg.camera.detect_interval.as_secs(), 2);
    assert_eq!(cfg.retention.as_secs(), 86400);
    // File values survive where env is absent or blank.
    assert_eq!(cfg.camera.target_fps, 12);
    assert!(cfg.backend.base_url.starts_with("https://dbc-"));
    assert_eq!(cfg.backend.timeout.as_secs(), 20);
    assert_eq!(cfg.backend.source_tag, "garage_cam");
    assert_eq!(cfg.export_dir.to_str(), Some("prod_reports"));
}

#[test]
fn rejects_out_of_range_detect_interval() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("VA_DETECT_INTERVAL_S", "0");
    let err = AnalyticsdConfig::load().expect_err("interval 0 must be rejected");
    assert!(err.to_string().contains("detect interval"));

    std::env::set_var("VA_DETECT_INTERVAL_S", "11");
    let err = AnalyticsdConfig::load().expect_err("interval 11 must be rejected");
    assert!(err.to_string().contains("detect interval"));

    std::env::set_var("VA_DETECT_INTERVAL_S", "soon");
    assert!(AnalyticsdConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_unsupported_url_schemes() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("VA_CAMERA_URL", "rtsp://camera-1/stream");
    let err = AnalyticsdConfig::load().expect_err("rtsp camera must be rejected");
    assert!(err.to_string().contains("scheme"));
    clear_env();

    std::env::set_var("VA_BACKEND_URL", "ftp://backend");
    assert!(AnalyticsdConfig::load().is_err());
    clear_env();
}

#[test]
fn stub_schemes_are_accepted() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("VA_CAMERA_URL", "stub://front_camera");
    std::env::set_var("VA_BACKEND_URL", "stub://offline");
    let cfg = AnalyticsdConfig::load().expect("stub urls are valid");
    clear_env();

    assert_eq!(cfg.camera.url, "stub://front_camera");
    assert_eq!(cfg.backend.base_url, "stub://offline");
}
