//! export_reports - write the session CSV reports
//!
//! Local mode reads the session database; `--from-backend` instead pulls
//! the inference service's accumulated CSVs and persists them verbatim.

use anyhow::{anyhow, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use vehicle_analytics::config::BackendSettings;
use vehicle_analytics::export::{
    export_reports_at, write_backend_csv, ReportSummary,
};
use vehicle_analytics::progress::Progress;
use vehicle_analytics::{BackendClient, DetectionStore, SqliteDetectionStore};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the session database.
    #[arg(long, default_value = "analytics.db")]
    db_path: String,
    /// Directory the reports are written into.
    #[arg(long, default_value = "reports")]
    out_dir: PathBuf,
    /// Pull the CSVs from the inference service instead of the local store.
    #[arg(long)]
    from_backend: bool,
    /// Inference service base URL (backend mode).
    #[arg(long, env = "VA_BACKEND_URL", default_value = "http://127.0.0.1:5000")]
    backend_url: String,
    /// Request timeout in seconds (backend mode).
    #[arg(long, default_value_t = 30)]
    timeout_s: u64,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let progress = Progress::from_flag(&args.ui);
    if args.from_backend {
        export_from_backend(&args, &progress)
    } else {
        export_from_store(&args, &progress)
    }
}

fn export_from_store(args: &Args, progress: &Progress) -> Result<()> {
    let mut store = {
        let _stage = progress.stage("Open session store");
        SqliteDetectionStore::open(&args.db_path)?
    };

    let stamp = Local::now();
    let (paths, vehicles, objects) = {
        let _stage = progress.stage("Write reports");
        let vehicles = store.vehicles(usize::MAX)?;
        let objects = store.objects(usize::MAX)?;
        let paths = export_reports_at(&mut store, &args.out_dir, stamp)?;
        (paths, vehicles, objects)
    };

    let vehicle_summary = ReportSummary::from_vehicles(&vehicles);
    let object_summary = ReportSummary::from_objects(&objects);
    println!(
        "vehicles: {} rows, {} types, mean confidence {:.2} -> {}",
        vehicle_summary.rows,
        vehicle_summary.distinct_types,
        vehicle_summary.mean_confidence,
        paths.vehicles.display()
    );
    println!(
        "other objects: {} rows, {} types, mean confidence {:.2} -> {}",
        object_summary.rows,
        object_summary.distinct_types,
        object_summary.mean_confidence,
        paths.objects.display()
    );
    Ok(())
}

fn export_from_backend(args: &Args, progress: &Progress) -> Result<()> {
    let settings = BackendSettings {
        base_url: args.backend_url.clone(),
        timeout: Duration::from_secs(args.timeout_s),
        source_tag: String::new(),
    };
    let client = BackendClient::new(&settings);

    let export = {
        let _stage = progress.stage("Fetch backend export");
        client.export()?
    };

    let stamp = Local::now();
    let mut wrote_any = false;
    if let Some(csv_text) = export.vehicles_csv.as_deref().filter(|c| !c.is_empty()) {
        let _stage = progress.stage("Write vehicles report");
        let (path, rows) = write_backend_csv(&args.out_dir, "vehicles", csv_text, stamp)?;
        println!("vehicles: {} rows -> {}", rows, path.display());
        wrote_any = true;
    }
    if let Some(csv_text) = export
        .other_objects_csv
        .as_deref()
        .filter(|c| !c.is_empty())
    {
        let _stage = progress.stage("Write objects report");
        let (path, rows) = write_backend_csv(&args.out_dir, "objects", csv_text, stamp)?;
        println!("other objects: {} rows -> {}", rows, path.display());
        wrote_any = true;
    }
    if !wrote_any {
        return Err(anyhow!(
            "inference service has no export data yet; process some frames first"
        ));
    }
    Ok(())
}
