#!/usr/bin/env rust
//! Historical Flood Zone Snapshots
//!
//! For every historical flood crest in nws.flood_events, captures the state
//! of all seven hydrological zones at the crest time and classifies the
//! event (backwater, upstream pulse, local tributary, compound).
//!
//! The batch report (snapshots, failed events, summary counts) is written
//! as JSON. Progress goes to stderr so stdout can carry the report.
//!
//! Usage:
//!   cargo run --bin generate_flood_zone_snapshots
//!
//! Options:
//!   --zones PATH     Zone registry (default: zones_path from config, zones.toml)
//!   --config PATH    Run configuration (default: snapshots.toml, optional)
//!   --output PATH    Write the JSON report here instead of stdout
//!
//! Environment:
//!   DATABASE_URL        PostgreSQL connection string (.env is honored)
//!   FLOMON_LOG          tracing filter, e.g. "debug" (default: info)
//!   FLOMON_LOG_FORMAT   "json" for newline-delimited JSON logs

use flomon_snapshots::config::{self, DEFAULT_CONFIG_PATH};
use flomon_snapshots::db::{self, ConnectionPool, REQUIRED_SCHEMAS};
use flomon_snapshots::events::{EventStore, PgEventStore};
use flomon_snapshots::obs;
use flomon_snapshots::resolver::Resolver;
use flomon_snapshots::snapshots::SnapshotGenerator;
use flomon_snapshots::store::pg::PgStore;
use flomon_snapshots::zones;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn fatal(context: &str, err: &dyn std::fmt::Display) -> ! {
    eprintln!("\n✗ {}\n\n{}\n", context, err);
    process::exit(1);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    obs::init_logging();

    eprintln!("🌊 Historical Flood Zone Snapshots");
    eprintln!("==================================\n");

    let args: Vec<String> = env::args().collect();
    let config_path = arg_value(&args, "--config").unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let output_path = arg_value(&args, "--output").map(PathBuf::from);

    // Configuration
    let settings = config::load_config(&config_path)
        .unwrap_or_else(|e| fatal("Invalid run configuration", &e));
    let zones_path = arg_value(&args, "--zones")
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.zones_path.clone());

    eprintln!("⚙️  Loading zones from {}...", zones_path.display());
    let topology = zones::load_zones(&zones_path)
        .unwrap_or_else(|e| fatal("Invalid zone configuration", &e));
    eprintln!(
        "✓ {} zones, {} sensors (window ±{}h, timeout {}s)\n",
        topology.zones().len(),
        topology.sensor_count(),
        settings.window_hours,
        settings.query_timeout_secs
    );

    // Database
    eprintln!("📊 Connecting to database...");
    let db_url = db::database_url().unwrap_or_else(|e| fatal("Database configuration", &e));
    let pool = ConnectionPool::open(&db_url, settings.pool_size, settings.query_timeout())
        .unwrap_or_else(|e| fatal("Database unreachable", &e));
    pool.verify_schemas(REQUIRED_SCHEMAS)
        .unwrap_or_else(|e| fatal("Database schema check failed", &e));
    let pool = Arc::new(pool);
    eprintln!("✓ Connected ({} pooled connections)\n", pool.idle_count());

    // Events
    eprintln!("📋 Loading historical flood events...");
    let events = PgEventStore::new(Arc::clone(&pool))
        .historical_events(&settings.severities)
        .unwrap_or_else(|e| fatal("Could not read nws.flood_events", &e));
    eprintln!("✓ Found {} events ({})\n", events.len(), settings.severities.join(", "));

    // Snapshots
    let store = Arc::new(PgStore::new(Arc::clone(&pool)));
    let resolver = Resolver::with_store(settings.window_hours, settings.query_timeout(), store);
    let generator = SnapshotGenerator::new(Arc::new(topology), Arc::new(resolver))
        .with_worker_threads(settings.worker_threads);

    eprintln!("🔍 Generating snapshots ({} workers)...", settings.worker_threads);
    let report = generator.generate_all(&events);

    let json = serde_json::to_string_pretty(&report)?;
    match &output_path {
        Some(path) => {
            fs::write(path, json)?;
            eprintln!("✓ Report saved to {}", path.display());
        }
        None => println!("{}", json),
    }

    // Summary
    eprintln!("\n{}", "=".repeat(50));
    eprintln!(
        "Events: {}  Succeeded: {}  Failed: {}",
        report.summary.total, report.summary.succeeded, report.summary.failed
    );
    for (event_type, count) in &report.summary.event_types {
        let pct = *count as f64 / report.summary.succeeded.max(1) as f64 * 100.0;
        eprintln!("  {:<16} {:>4}  ({:.1}%)", event_type.as_str(), count, pct);
    }
    for failure in &report.failures {
        eprintln!("  ✗ event {} ({}): {}", failure.event_id, failure.site_code, failure.reason);
    }

    Ok(())
}
