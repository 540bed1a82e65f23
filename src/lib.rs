/// flomon_snapshots: historical flood crest zone snapshots for the Peoria
/// Illinois River basin.
///
/// # Module structure
///
/// ```text
/// flomon_snapshots
/// ├── model       — shared data types (SensorReading, FloodEvent, ZoneSnapshot, …)
/// ├── config      — run configuration loader (snapshots.toml)
/// ├── zones       — hydrological zone topology and sensor thresholds (zones.toml)
/// ├── db          — DATABASE_URL validation, schema checks, connection pool
/// ├── store
/// │   ├── pg      — Postgres gauge / CWMS / ASOS stores
/// │   └── memory  — in-memory stores for offline replays and tests
/// ├── events      — historical flood events (nws.flood_events)
/// ├── resolver    — nearest reading per sensor around a target time
/// ├── evaluator   — zone status from threshold and coverage rules
/// ├── classifier  — event type from zone activity
/// ├── snapshots   — per-event and batch snapshot orchestration
/// └── obs         — tracing setup and structured log events
/// ```

/// Public modules
pub mod classifier;
pub mod config;
pub mod db;
pub mod evaluator;
pub mod events;
pub mod model;
pub mod obs;
pub mod resolver;
pub mod snapshots;
pub mod store;
pub mod zones;
