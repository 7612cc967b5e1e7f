//! analyticsd - Vehicle Analytics Daemon
//!
//! This daemon:
//! 1. Connects to the configured camera stream (phone app over HTTP)
//! 2. Samples frames on the detection interval, skipping duplicates
//! 3. Submits sampled frames to the detection backend
//! 4. Splits results into vehicle / other-object records
//! 5. Persists both categories into the session store
//! 6. Serves the dashboard API and enforces retention

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use vehicle_analytics::{
    api::{ApiConfig, ApiServer},
    config::AnalyticsdConfig,
    select_backend, CameraSource, Engine, FrameSampler,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = AnalyticsdConfig::load()?;
    let mut engine = Engine::open(&cfg.db_path)?;

    let api_config = ApiConfig {
        addr: cfg.api_addr.clone(),
        token_path: cfg.api_token_path.clone(),
    };
    let api_handle = ApiServer::new(api_config, cfg.db_path.clone()).spawn()?;
    log::info!("dashboard api listening on {}", api_handle.addr);
    if let Some(path) = &api_handle.token_path {
        log::info!("dashboard api token written to {}", path.display());
    } else {
        log::warn!(
            "dashboard api token (handle securely): {}",
            api_handle.token
        );
    }

    let mut backend = select_backend(&cfg.backend)?;
    if let Err(e) = backend.warm_up() {
        log::warn!("detection backend '{}' not ready: {}", backend.name(), e);
    }

    let mut camera = CameraSource::new(cfg.camera.clone())?;
    camera.connect()?;
    log::info!("camera stream connected: {}", cfg.camera.url);

    let mut sampler = FrameSampler::new(cfg.camera.detect_interval);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let mut last_health_log = Instant::now();
    let mut last_prune = Instant::now();
    let mut batch_count = 0u64;

    log::info!("analyticsd running. writing to {}", cfg.db_path);
    log::info!(
        "backend={} source_tag={} detect_interval={}s",
        backend.name(),
        cfg.backend.source_tag,
        cfg.camera.detect_interval.as_secs()
    );

    while !shutdown.load(Ordering::SeqCst) {
        let frame = match camera.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("camera stream error: {}; reconnecting", e);
                std::thread::sleep(Duration::from_secs(1));
                if let Err(e) = camera.connect() {
                    log::warn!("camera reconnect failed: {}", e);
                }
                continue;
            }
        };

        if sampler.should_submit(&frame) {
            match backend.detect(&frame.jpeg, &cfg.backend.source_tag) {
                Ok(batch) if !batch.is_empty() => match engine.record_batch(batch) {
                    Ok(outcome) => {
                        batch_count += 1;
                        log::info!(
                            "batch #{}: {} vehicles, {} other objects (frame seq={})",
                            batch_count,
                            outcome.vehicles_added,
                            outcome.others_added,
                            frame.sequence
                        );
                    }
                    Err(e) => log::warn!("batch rejected: {}", e),
                },
                Ok(_) => log::debug!("frame seq={} produced no detections", frame.sequence),
                Err(e) => log::warn!("detection failed for frame seq={}: {}", frame.sequence, e),
            }
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let camera_stats = camera.stats();
            let sampler_stats = sampler.stats();
            log::info!(
                "camera health={} frames={} submitted={} skipped_interval={} skipped_duplicate={} url={}",
                camera.is_healthy(),
                camera_stats.frames_captured,
                sampler_stats.submitted,
                sampler_stats.skipped_interval,
                sampler_stats.skipped_duplicate,
                camera_stats.url
            );
            last_health_log = Instant::now();
        }

        if last_prune.elapsed() >= Duration::from_secs(60) {
            match engine.prune_older_than(cfg.retention) {
                Ok(0) => {}
                Ok(pruned) => log::debug!("retention pruned {} records", pruned),
                Err(e) => log::warn!("retention pruning failed: {}", e),
            }
            last_prune = Instant::now();
        }
    }

    log::info!("shutdown signal received, stopping dashboard api...");
    api_handle.stop()?;
    let stats = engine.stats()?;
    log::info!(
        "session closed: {} vehicles, {} other objects recorded",
        stats.vehicles,
        stats.other_objects
    );
    Ok(())
}
