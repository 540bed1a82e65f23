/// Shared data types for the crest snapshot engine.
///
/// Everything here is a plain value: built once by the resolver, evaluator,
/// or orchestrator and never mutated afterwards. All types serialize with
/// serde so a finished batch can be handed to reporting as JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// USGS parameter codes
// ---------------------------------------------------------------------------

/// USGS parameter code for discharge (cubic feet per second).
pub const PARAM_DISCHARGE: &str = "00060";
/// USGS parameter code for gage height / stage (feet).
pub const PARAM_STAGE: &str = "00065";

/// Unit reported for every ASOS precipitation reading.
pub const PRECIP_UNIT: &str = "inches";

// ---------------------------------------------------------------------------
// Sensor classification
// ---------------------------------------------------------------------------

/// Which backing store carries a sensor's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceKind {
    /// USGS NWIS gauges, parameter-coded time series.
    Usgs,
    /// USACE CWMS locations, location-keyed time series.
    Cwms,
    /// IEM/ASOS weather stations, fixed-field observations.
    Asos,
    Unknown,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Usgs => "USGS",
            SourceKind::Cwms => "CWMS",
            SourceKind::Asos => "ASOS",
            SourceKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measured quantity a sensor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Stage,
    Discharge,
    PoolElevation,
    Precipitation,
    Tailwater,
    Other,
}

impl SensorType {
    /// Parses the `type` string used in zones.toml. Anything unrecognised
    /// (temperature, wind, …) maps to `Other`.
    pub fn from_config(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "stage" => SensorType::Stage,
            "discharge" | "flow" => SensorType::Discharge,
            "pool_elevation" | "pool" => SensorType::PoolElevation,
            "precipitation" | "precip" => SensorType::Precipitation,
            "tailwater" => SensorType::Tailwater,
            _ => SensorType::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SensorType::Stage => "stage",
            SensorType::Discharge => "discharge",
            SensorType::PoolElevation => "pool_elevation",
            SensorType::Precipitation => "precipitation",
            SensorType::Tailwater => "tailwater",
            SensorType::Other => "other",
        }
    }

    /// Water-level types are the only ones compared against action/flood stage.
    pub fn is_level(self) -> bool {
        matches!(self, SensorType::Stage | SensorType::PoolElevation)
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Readings and events
// ---------------------------------------------------------------------------

/// One normalized observation, regardless of which store it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    pub source: SourceKind,
}

/// Historical flood event from `nws.flood_events`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloodEvent {
    pub event_id: i32,
    pub site_code: String,
    pub crest_time: DateTime<Utc>,
    pub peak_stage_ft: f64,
    pub severity: String,
    pub event_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Zone topology
// ---------------------------------------------------------------------------

/// Hydrological role a zone plays relative to the property zone.
///
/// The classifier reasons over roles, never over raw zone ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneRole {
    /// Outlet river whose stage can push water back up the basin (zone 0).
    BackwaterSource,
    /// Lock/pool where backwater meets the basin (zone 1).
    BackwaterInterface,
    /// The location whose flooding is being explained (zone 2).
    Property,
    /// Tributaries entering near the property (zone 3).
    LocalTributary,
    /// Main-stem basin further upstream (zones 4–6).
    Upstream,
}

impl ZoneRole {
    /// Fixed basin topology: 0 outlet, 1 interface, 2 property,
    /// 3 local tributaries, 4..=6 upstream.
    pub fn for_zone(zone_id: usize) -> Option<Self> {
        match zone_id {
            0 => Some(ZoneRole::BackwaterSource),
            1 => Some(ZoneRole::BackwaterInterface),
            2 => Some(ZoneRole::Property),
            3 => Some(ZoneRole::LocalTributary),
            4..=6 => Some(ZoneRole::Upstream),
            _ => None,
        }
    }

    pub fn is_backwater(self) -> bool {
        matches!(self, ZoneRole::BackwaterSource | ZoneRole::BackwaterInterface)
    }
}

/// Status of a whole zone at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneStatus {
    Normal,
    Warning,
    Critical,
    /// No strict majority of the zone's sensors reported; normalcy can't be asserted.
    Degraded,
}

impl ZoneStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ZoneStatus::Normal => "NORMAL",
            ZoneStatus::Warning => "WARNING",
            ZoneStatus::Critical => "CRITICAL",
            ZoneStatus::Degraded => "DEGRADED",
        }
    }

    /// WARNING and CRITICAL count as activity for classification.
    pub fn is_active(self) -> bool {
        matches!(self, ZoneStatus::Warning | ZoneStatus::Critical)
    }
}

impl fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Causal pattern of a flood event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    TopDown,
    BottomUp,
    LocalTributary,
    Compound,
    Unknown,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::TopDown => "TOP_DOWN",
            EventType::BottomUp => "BOTTOM_UP",
            EventType::LocalTributary => "LOCAL_TRIBUTARY",
            EventType::Compound => "COMPOUND",
            EventType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// State of one zone at an event's crest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneSnapshot {
    pub zone_id: usize,
    pub zone_name: String,
    pub zone_role: ZoneRole,
    pub snapshot_time: DateTime<Utc>,
    /// (sensor id, reading) in zones.toml order.
    pub sensors: Vec<(String, Option<SensorReading>)>,
    pub zone_status: ZoneStatus,
}

/// How many of a zone's sensors produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneCoverage {
    pub present: usize,
    pub total: usize,
}

impl ZoneCoverage {
    /// Percentage of sensors reporting; 0 for a zone with no sensors.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.present as f64 / self.total as f64 * 100.0
        }
    }
}

impl ZoneSnapshot {
    pub fn coverage(&self) -> ZoneCoverage {
        ZoneCoverage {
            present: self.sensors.iter().filter(|(_, r)| r.is_some()).count(),
            total: self.sensors.len(),
        }
    }

    /// Reading for a given sensor id, if that sensor reported.
    pub fn reading(&self, sensor_id: &str) -> Option<&SensorReading> {
        self.sensors
            .iter()
            .find(|(id, _)| id == sensor_id)
            .and_then(|(_, r)| r.as_ref())
    }
}

/// Basin-wide picture for one historical flood crest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloodEventSnapshot {
    pub event: FloodEvent,
    /// All seven zones, sorted by zone id.
    pub zones: Vec<ZoneSnapshot>,
    pub event_classification: EventType,
    pub backwater_active: bool,
    pub upstream_pulse_detected: bool,
    pub local_tributary_active: bool,
}

impl FloodEventSnapshot {
    pub fn zone(&self, zone_id: usize) -> Option<&ZoneSnapshot> {
        self.zones.iter().find(|z| z.zone_id == zone_id)
    }

    /// Count of each event type across a batch of snapshots.
    pub fn event_type_distribution(snapshots: &[FloodEventSnapshot]) -> BTreeMap<EventType, usize> {
        let mut counts = BTreeMap::new();
        for snapshot in snapshots {
            *counts.entry(snapshot.event_classification).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading(value: f64) -> SensorReading {
        SensorReading {
            sensor_id: "05568500".to_string(),
            sensor_type: SensorType::Stage,
            value,
            unit: "ft".to_string(),
            timestamp: Utc.with_ymd_and_hms(2013, 4, 21, 12, 0, 0).unwrap(),
            source: SourceKind::Usgs,
        }
    }

    #[test]
    fn test_sensor_type_from_config_strings() {
        assert_eq!(SensorType::from_config("stage"), SensorType::Stage);
        assert_eq!(SensorType::from_config("pool_elevation"), SensorType::PoolElevation);
        assert_eq!(SensorType::from_config("Precipitation"), SensorType::Precipitation);
        assert_eq!(SensorType::from_config("tailwater"), SensorType::Tailwater);
        assert_eq!(SensorType::from_config("wind_speed"), SensorType::Other);
        assert!(SensorType::PoolElevation.is_level());
        assert!(!SensorType::Tailwater.is_level());
    }

    #[test]
    fn test_zone_roles_follow_fixed_topology() {
        assert_eq!(ZoneRole::for_zone(0), Some(ZoneRole::BackwaterSource));
        assert_eq!(ZoneRole::for_zone(2), Some(ZoneRole::Property));
        assert_eq!(ZoneRole::for_zone(6), Some(ZoneRole::Upstream));
        assert_eq!(ZoneRole::for_zone(7), None);
        assert!(ZoneRole::BackwaterInterface.is_backwater());
        assert!(!ZoneRole::Property.is_backwater());
    }

    #[test]
    fn test_zone_coverage_counts_present_readings() {
        let snapshot = ZoneSnapshot {
            zone_id: 2,
            zone_name: "Upper Peoria Lake".to_string(),
            zone_role: ZoneRole::Property,
            snapshot_time: Utc.with_ymd_and_hms(2013, 4, 21, 12, 0, 0).unwrap(),
            sensors: vec![
                ("05568500".to_string(), Some(reading(24.6))),
                ("IL07P".to_string(), None),
                ("KPIA".to_string(), None),
                ("05567500".to_string(), Some(reading(18.8))),
            ],
            zone_status: ZoneStatus::Critical,
        };

        let coverage = snapshot.coverage();
        assert_eq!(coverage, ZoneCoverage { present: 2, total: 4 });
        assert_eq!(coverage.percent(), 50.0);
        assert!(snapshot.reading("05568500").is_some());
        assert!(snapshot.reading("IL07P").is_none());
    }

    #[test]
    fn test_event_type_distribution_counts_batch() {
        let snapshot = |event_type: EventType| FloodEventSnapshot {
            event: FloodEvent {
                event_id: 1,
                site_code: "05568500".to_string(),
                crest_time: Utc.with_ymd_and_hms(2013, 4, 23, 6, 0, 0).unwrap(),
                peak_stage_ft: 24.6,
                severity: "major".to_string(),
                event_name: None,
            },
            zones: vec![],
            event_classification: event_type,
            backwater_active: false,
            upstream_pulse_detected: false,
            local_tributary_active: false,
        };
        let batch = vec![
            snapshot(EventType::TopDown),
            snapshot(EventType::BottomUp),
            snapshot(EventType::TopDown),
        ];

        let counts = FloodEventSnapshot::event_type_distribution(&batch);
        assert_eq!(counts.get(&EventType::TopDown), Some(&2));
        assert_eq!(counts.get(&EventType::BottomUp), Some(&1));
        assert_eq!(counts.get(&EventType::Compound), None);
        assert!(FloodEventSnapshot::event_type_distribution(&[]).is_empty());
    }

    #[test]
    fn test_status_and_event_type_serialize_as_tags() {
        assert_eq!(serde_json::to_string(&ZoneStatus::Degraded).unwrap(), "\"DEGRADED\"");
        assert_eq!(serde_json::to_string(&EventType::LocalTributary).unwrap(), "\"LOCAL_TRIBUTARY\"");
        assert_eq!(serde_json::to_string(&SourceKind::Cwms).unwrap(), "\"CWMS\"");
        assert_eq!(serde_json::to_string(&SensorType::PoolElevation).unwrap(), "\"pool_elevation\"");
    }
}
