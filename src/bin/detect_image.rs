//! detect_image - one-shot detection for an uploaded image
//!
//! Reads an image file, submits it to the detection backend, prints the
//! split results, and optionally records them into a session database.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use vehicle_analytics::config::BackendSettings;
use vehicle_analytics::{select_backend, Engine};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image file to submit (JPEG or PNG; PNG is re-encoded).
    #[arg(long)]
    image: PathBuf,
    /// Detection backend base URL (`stub://local` runs offline).
    #[arg(long, env = "VA_BACKEND_URL", default_value = "http://127.0.0.1:5000")]
    backend_url: String,
    /// Source label recorded on the results.
    #[arg(long, default_value = "manual_upload")]
    source: String,
    /// Also record the results into this session database.
    #[arg(long)]
    db_path: Option<String>,
    /// Request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_s: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let raw = std::fs::read(&args.image)
        .with_context(|| format!("read image file {}", args.image.display()))?;
    let jpeg = ensure_jpeg(raw)?;

    let settings = BackendSettings {
        base_url: args.backend_url.clone(),
        timeout: Duration::from_secs(args.timeout_s),
        source_tag: args.source.clone(),
    };
    let mut backend = select_backend(&settings)?;
    let batch = backend.detect(&jpeg, &args.source)?;

    println!(
        "detected {} vehicles, {} other objects",
        batch.vehicles.len(),
        batch.others.len()
    );
    for vehicle in &batch.vehicles {
        println!(
            "  vehicle: type={} confidence={:.2} color={} plate={}",
            vehicle.vehicle_type,
            vehicle.confidence,
            vehicle.color.as_deref().unwrap_or("-"),
            vehicle.license_plate.as_deref().unwrap_or("-")
        );
    }
    for object in &batch.others {
        println!(
            "  object: type={} confidence={:.2} location={} size={}",
            object.object_type,
            object.confidence,
            object.location.as_deref().unwrap_or("-"),
            object.size_category.as_deref().unwrap_or("-")
        );
    }

    if let Some(db_path) = &args.db_path {
        let mut engine = Engine::open(db_path)?;
        let outcome = engine.record_batch(batch)?;
        println!(
            "recorded {} vehicles, {} other objects into {}",
            outcome.vehicles_added, outcome.others_added, db_path
        );
    }
    Ok(())
}

/// Pass JPEG bytes through unchanged; re-encode anything else the image
/// crate can decode.
fn ensure_jpeg(raw: Vec<u8>) -> Result<Vec<u8>> {
    let format = image::guess_format(&raw).context("unrecognized image format")?;
    if format == image::ImageFormat::Jpeg {
        return Ok(raw);
    }
    let decoded = image::load_from_memory(&raw).context("decode image")?;
    // JPEG has no alpha channel; flatten before encoding.
    let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());
    let mut bytes = Cursor::new(Vec::new());
    rgb.write_to(&mut bytes, image::ImageFormat::Jpeg)
        .context("re-encode image as jpeg")?;
    Ok(bytes.into_inner())
}
