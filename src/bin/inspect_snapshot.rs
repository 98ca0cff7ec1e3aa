//! Offline snapshot inspector
//!
//! Prints a saved station snapshot and a per-sensor analysis of the stored
//! values without touching the network.
//!
//! Usage:
//!   cargo run --bin inspect_snapshot -- <file>           # relative to storage.save_dir
//!   cargo run --bin inspect_snapshot -- --path <file>    # any path

use aqmon_service::analysis::{reconcile, stats};
use aqmon_service::cache;
use aqmon_service::config;
use aqmon_service::logging;
use chrono::Utc;
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging("warn");

    let args: Vec<String> = env::args().collect();
    let path = match args.as_slice() {
        [_, flag, path] if flag == "--path" => PathBuf::from(path),
        [_, name] => {
            let config = config::load_config()?;
            cache::snapshot_path(&config.storage.save_dir, name)
        }
        _ => {
            eprintln!("Usage: {} <file> | --path <file>", args[0]);
            std::process::exit(1);
        }
    };

    let contents = fs::read_to_string(&path)?;
    let snapshot = cache::decode_snapshot(&contents)?;
    let station = &snapshot.station;

    println!("📂 {}", path.display());
    println!("====================================");
    println!("Station {}: {}", station.id, station.name);
    println!("   City:     {}", station.city);
    println!("   Region:   {}", station.region);
    match station.map_url() {
        Some(url) => println!("   Position: {:.6}, {:.6}  ({})", station.latitude, station.longitude, url),
        None => println!("   Position: unknown"),
    }
    println!("   Aggregate history: {} points, latest {:.2}", station.history.len(), station.latest());
    println!("   Dates logged: {}", snapshot.dates.len());
    if let (Some(first), Some(last)) = (snapshot.dates.first(), snapshot.dates.last()) {
        println!("   Logged range: {} .. {}", first, last);
    }
    println!();

    let now = Utc::now();
    for (sensor_id, values) in &station.sensor_history {
        let name = station
            .sensor_names
            .get(sensor_id)
            .map(String::as_str)
            .unwrap_or("(unnamed)");

        if values.is_empty() {
            println!("   {:>6}  {:<30} no stored values", sensor_id, name);
            continue;
        }

        let analysis = stats::analyze(&reconcile::replay_history(values, now));
        println!(
            "   {:>6}  {:<30} n={:<3} min {:>8.2}  max {:>8.2}  avg {:>8.2}  trend {:>+8.3}",
            sensor_id,
            name,
            values.len(),
            analysis.min,
            analysis.max,
            analysis.avg,
            analysis.trend
        );
    }

    Ok(())
}
