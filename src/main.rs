//! Air Quality Monitor - interactive console
//!
//! Browses GIOS monitoring stations, their sensors and recent measurements,
//! with local snapshots for working offline.
//!
//! Station-list fetches run in the background. Input is read on its own
//! thread so the main loop can report a finished fetch while the prompt is
//! still waiting for a command. Sensor, history and snapshot commands run
//! in the foreground.
//!
//! Usage:
//!   cargo run --release                 # Start in the mode the probe reports
//!   cargo run --release -- --offline    # Start offline regardless of the probe
//!   cargo run --release -- --log-level debug
//!
//! Environment:
//!   AQMON_CONFIG - path to the TOML configuration (default: aqmon.toml)
//!   RUST_LOG     - overrides --log-level

use aqmon_service::config;
use aqmon_service::logging;
use aqmon_service::model::Station;
use aqmon_service::session::{SeriesOrigin, SeriesView, Session, StationQuery};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

const HELP: &str = "\
Commands:
  all                              fetch every station (background)
  city <name>                      fetch stations in a city (background)
  near <radius_km> <address>       fetch stations around an address (background)
  list                             show the stations in memory
  sensors <station_id>             list a station's sensors
  history <station_id> <sensor_id> fetch, reconcile and analyse a sensor
  save <station_id> [file]         write a station snapshot
  load <file>                      read a station snapshot
  files                            list saved snapshots
  mode [online|offline]            show or force the connection mode
  help                             show this text
  quit                             leave";

fn main() {
    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let mut force_offline = false;
    let mut log_level = "info".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--offline" => {
                force_offline = true;
                i += 1;
            }
            "--log-level" => {
                if i + 1 < args.len() {
                    log_level = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("Error: --log-level requires a value");
                    std::process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Usage: {} [--offline] [--log-level LEVEL]", args[0]);
                std::process::exit(1);
            }
        }
    }

    logging::init_logging(&log_level);

    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let session = match Session::from_config(config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("❌ Failed to start session: {}", e);
            std::process::exit(1);
        }
    };
    if force_offline {
        session.set_online(false);
    }

    println!("🌫  Air Quality Monitor");
    println!("======================");
    println!("Mode: {}", mode_label(&session));
    println!("Type 'help' for commands.\n");

    let lines = spawn_input_reader();
    prompt(&session);

    loop {
        if report_station_fetch(&session) {
            prompt(&session);
        }

        let line = match lines.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                eprintln!("❌ Failed to read input: {}", e);
                break;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if !run_command(&session, line.trim()) {
            break;
        }
        prompt(&session);
    }

    println!("Bye.");
}

fn mode_label(session: &Session) -> &'static str {
    if session.is_online() { "online" } else { "offline" }
}

/// Forwards stdin lines to the main loop. The channel closes at end of input.
fn spawn_input_reader() -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let failed = line.is_err();
            if tx.send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}

fn prompt(session: &Session) {
    print!("{}> ", if session.is_fetching() { "[fetching] " } else { "" });
    io::stdout().flush().ok();
}

/// Prints a finished station fetch. Returns `true` if there was one.
fn report_station_fetch(session: &Session) -> bool {
    match session.poll_station_fetch() {
        Some(Ok(count)) => {
            println!("\n✓ Station list updated: {} stations", count);
            true
        }
        Some(Err(e)) => {
            eprintln!("\n✗ Station fetch failed: {}", e);
            println!("   Mode: {}", mode_label(session));
            true
        }
        None => false,
    }
}

/// Executes one command line. Returns `false` when the loop should end.
fn run_command(session: &Session, line: &str) -> bool {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "quit" | "exit" => return false,
        "help" => println!("{}", HELP),
        "all" => dispatch(session, StationQuery::All),
        "city" => {
            if rest.is_empty() {
                eprintln!("Usage: city <name>");
            } else {
                dispatch(session, StationQuery::City(rest.to_string()));
            }
        }
        "near" => match rest.split_once(char::is_whitespace) {
            Some((radius, address)) => match radius.parse::<f64>() {
                Ok(radius_km) if radius_km >= 0.0 => dispatch(
                    session,
                    StationQuery::Radius {
                        address: address.trim().to_string(),
                        radius_km,
                    },
                ),
                _ => eprintln!("Radius must be a non-negative number of kilometres"),
            },
            None => eprintln!("Usage: near <radius_km> <address>"),
        },
        "list" => print_stations(session),
        "sensors" => match parse_ids::<1>(rest) {
            Some([station_id]) => print_sensors(session, station_id),
            None => eprintln!("Usage: sensors <station_id>"),
        },
        "history" => match parse_ids::<2>(rest) {
            Some([station_id, sensor_id]) => print_history(session, station_id, sensor_id),
            None => eprintln!("Usage: history <station_id> <sensor_id>"),
        },
        "save" => {
            let mut parts = rest.split_whitespace();
            match parts.next().and_then(|id| id.parse::<i64>().ok()) {
                Some(station_id) => match session.save_snapshot(station_id, parts.next()) {
                    Ok(path) => println!("💾 Saved to {}", path.display()),
                    Err(e) => eprintln!("✗ Save failed: {}", e),
                },
                None => eprintln!("Usage: save <station_id> [file]"),
            }
        }
        "load" => {
            if rest.is_empty() {
                eprintln!("Usage: load <file>");
            } else {
                match session.load_snapshot(rest) {
                    Some(station_id) => {
                        println!("📂 Loaded station {} ({} dates logged)", station_id, session.dates().len())
                    }
                    None => eprintln!("✗ No readable snapshot named {}", rest),
                }
            }
        }
        "files" => match session.list_snapshots() {
            Ok(files) if files.is_empty() => println!("No snapshots saved yet"),
            Ok(files) => {
                for file in files {
                    println!("   {}", file);
                }
            }
            Err(e) => eprintln!("✗ {}", e),
        },
        "mode" => {
            match rest {
                "online" => session.set_online(true),
                "offline" => session.set_online(false),
                "" => {}
                other => eprintln!("Unknown mode: {}", other),
            }
            println!("Mode: {}", mode_label(session));
        }
        other => eprintln!("Unknown command: {} (try 'help')", other),
    }
    true
}

fn parse_ids<const N: usize>(rest: &str) -> Option<[i64; N]> {
    let parts: Vec<&str> = rest.split_whitespace().collect();
    if parts.len() != N {
        return None;
    }
    let mut ids = [0i64; N];
    for (slot, part) in ids.iter_mut().zip(parts) {
        *slot = part.parse().ok()?;
    }
    Some(ids)
}

fn dispatch(session: &Session, query: StationQuery) {
    if session.request_station_fetch(query) {
        println!("⏳ Fetching stations in the background...");
    } else {
        println!("A station fetch is already running; request ignored");
    }
}

fn print_stations(session: &Session) {
    session.stations().with_stations(|stations: &[Station]| {
        if stations.is_empty() {
            println!("No stations in memory (try 'all', 'city' or 'load')");
            return;
        }
        for station in stations {
            let location = if station.region.is_empty() {
                station.city.clone()
            } else {
                format!("{}, {}", station.city, station.region)
            };
            println!(
                "   {:>6}  {:<45} {:<35} latest {:.2}",
                station.id,
                station.name,
                location,
                station.latest()
            );
        }
        println!("   {} stations", stations.len());
    });
}

fn print_sensors(session: &Session, station_id: i64) {
    match session.fetch_sensors(station_id) {
        Ok(sensors) => {
            if let Some(url) = session.stations().get(station_id).and_then(|s| s.map_url()) {
                println!("   Map: {}", url);
            }
            for sensor in sensors {
                println!("   {:>6}  {}", sensor.id, sensor.name);
            }
        }
        Err(e) => {
            eprintln!("✗ Sensors unavailable: {}", e);
            println!("   Mode: {}", mode_label(session));
        }
    }
}

fn print_history(session: &Session, station_id: i64, sensor_id: i64) {
    let view: SeriesView = match session.fetch_history(station_id, sensor_id) {
        Ok(view) => view,
        Err(e) => {
            eprintln!("✗ History unavailable: {}", e);
            println!("   Mode: {}", mode_label(session));
            return;
        }
    };

    if view.origin == SeriesOrigin::Cached {
        println!("   (offline: stored values, timestamps are approximate)");
    }
    for point in &view.points {
        println!("   {}  {:>8.2}", point.timestamp.format("%Y-%m-%d %H:%M"), point.value);
    }

    let a = &view.analysis;
    println!("   ─────────────────────────────");
    println!("   min   {:>8.2}  at {}", a.min, a.min_time);
    println!("   max   {:>8.2}  at {}", a.max, a.max_time);
    println!("   avg   {:>8.2}", a.avg);
    println!("   trend {:>+8.3} per sample", a.trend);
}
