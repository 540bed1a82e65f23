/// Zone-based sensor grouping from zones.toml
///
/// Parses the seven hydrological zones and their sensors, works out which
/// backing store each sensor lives in, validates thresholds, and exposes the
/// result as an immutable `ZoneTopology` that the snapshot engine shares
/// across worker threads.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::config::ConfigError;
use crate::model::{SensorType, SourceKind, ZoneRole};

/// Number of zones in the basin topology.
pub const ZONE_COUNT: usize = 7;

// ============================================================================
// TOML Configuration Structures
// ============================================================================

/// Root zones configuration
#[derive(Debug, Deserialize)]
pub struct ZonesConfig {
    pub zones: ZoneCollection,
}

/// Collection of all zones
#[derive(Debug, Deserialize)]
pub struct ZoneCollection {
    pub zone_0: Zone,
    pub zone_1: Zone,
    pub zone_2: Zone,
    pub zone_3: Zone,
    pub zone_4: Zone,
    pub zone_5: Zone,
    pub zone_6: Zone,
}

/// Single zone with sensors
#[derive(Debug, Deserialize, Clone)]
pub struct Zone {
    pub name: String,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
}

/// Individual sensor within a zone
#[derive(Debug, Deserialize, Clone)]
pub struct Sensor {
    #[serde(rename = "id")]
    pub sensor_id: Option<String>,         // SHEF ID or custom ID
    pub usgs_id: Option<String>,           // USGS site code
    pub station_id: Option<String>,        // ASOS station ID
    pub cwms_location: Option<String>,     // CWMS location ID
    pub shef_id: Option<String>,           // SHEF ID (legacy)
    #[serde(rename = "type", alias = "sensor_type")]
    pub sensor_type: String,               // "stage", "discharge", "pool_elevation", ...

    pub flood_stage_ft: Option<f64>,
    pub action_stage_ft: Option<f64>,
}

impl Sensor {
    /// Store and identity for this sensor: USGS id first, then CWMS
    /// location, then ASOS station. Anything else has no store.
    pub fn resolve_source(&self) -> (SourceKind, String) {
        if let Some(id) = &self.usgs_id {
            (SourceKind::Usgs, id.clone())
        } else if let Some(loc) = &self.cwms_location {
            (SourceKind::Cwms, loc.clone())
        } else if let Some(station) = &self.station_id {
            (SourceKind::Asos, station.clone())
        } else {
            let id = self
                .shef_id
                .clone()
                .or_else(|| self.sensor_id.clone())
                .unwrap_or_else(|| "UNKNOWN".to_string());
            (SourceKind::Unknown, id)
        }
    }
}

// ============================================================================
// Runtime Topology
// ============================================================================

/// Flood thresholds for a level sensor. `action_ft <= flood_ft` whenever
/// both are present.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorThresholds {
    pub action_ft: Option<f64>,
    pub flood_ft: Option<f64>,
}

/// A configured sensor, ready to be resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSpec {
    pub sensor_id: String,
    pub source: SourceKind,
    pub sensor_type: SensorType,
    pub thresholds: SensorThresholds,
}

impl SensorSpec {
    pub fn new(sensor_id: &str, source: SourceKind, sensor_type: SensorType) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            source,
            sensor_type,
            thresholds: SensorThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, action_ft: Option<f64>, flood_ft: Option<f64>) -> Self {
        self.thresholds = SensorThresholds { action_ft, flood_ft };
        self
    }
}

/// Lead time and alert context for a zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneMetadata {
    pub lead_time_hours_min: Option<i64>,
    pub lead_time_hours_max: Option<i64>,
    pub primary_alert_condition: &'static str,
}

impl ZoneMetadata {
    /// Lead-time window for a zone id
    pub fn for_zone(zone_id: usize) -> Self {
        let (min, max, condition) = match zone_id {
            0 => (Some(12), Some(120), "Grafton stage > 20 ft"),
            1 => (Some(6), Some(24), "LaGrange TW → pool diff < 1 ft"),
            2 => (Some(0), Some(6), "Peoria pool > 447.5 ft / Kingston Mines stage > 14 ft"),
            3 => (Some(6), Some(18), "Mackinaw rate-of-rise > 1 ft/hr"),
            4 => (Some(18), Some(48), "Henry stage > 15 ft"),
            5 => (Some(36), Some(72), "Dresden pool elevated + Kankakee rising"),
            6 => (Some(72), Some(120), "O'Hare 6hr precip > 1.5 in + CSSC discharge spike"),
            _ => (None, None, "N/A"),
        };
        ZoneMetadata {
            lead_time_hours_min: min,
            lead_time_hours_max: max,
            primary_alert_condition: condition,
        }
    }
}

/// A validated zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneConfig {
    pub zone_id: usize,
    pub name: String,
    pub role: ZoneRole,
    pub metadata: ZoneMetadata,
    pub sensors: Vec<SensorSpec>,
}

impl ZoneConfig {
    /// Builds a zone with the role implied by its id.
    pub fn new(zone_id: usize, name: &str, sensors: Vec<SensorSpec>) -> Result<Self, ConfigError> {
        let role = ZoneRole::for_zone(zone_id).ok_or_else(|| ConfigError::Invalid {
            field: "zone_id",
            reason: format!("zone {} is outside 0..{}", zone_id, ZONE_COUNT),
        })?;

        for spec in &sensors {
            if let (Some(action), Some(flood)) = (spec.thresholds.action_ft, spec.thresholds.flood_ft) {
                if action > flood {
                    return Err(ConfigError::ThresholdOrder {
                        zone_id,
                        sensor_id: spec.sensor_id.clone(),
                        action_ft: action,
                        flood_ft: flood,
                    });
                }
            }
        }

        Ok(ZoneConfig {
            zone_id,
            name: name.to_string(),
            role,
            metadata: ZoneMetadata::for_zone(zone_id),
            sensors,
        })
    }
}

/// All seven zones, indexed by zone id. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTopology {
    zones: Vec<ZoneConfig>,
}

impl ZoneTopology {
    /// Requires exactly one zone per id 0..6, in any order.
    pub fn new(mut zones: Vec<ZoneConfig>) -> Result<Self, ConfigError> {
        zones.sort_by_key(|z| z.zone_id);
        let ids: Vec<usize> = zones.iter().map(|z| z.zone_id).collect();
        if ids != (0..ZONE_COUNT).collect::<Vec<_>>() {
            return Err(ConfigError::Invalid {
                field: "zones",
                reason: format!("expected zone ids 0..{}, got {:?}", ZONE_COUNT, ids),
            });
        }
        Ok(Self { zones })
    }

    pub fn from_config(config: &ZonesConfig) -> Result<Self, ConfigError> {
        let zones = get_all_zones(config)
            .into_iter()
            .map(|(zone_id, zone)| {
                let sensors = zone
                    .sensors
                    .iter()
                    .map(|s| {
                        let (source, sensor_id) = s.resolve_source();
                        SensorSpec {
                            sensor_id,
                            source,
                            sensor_type: SensorType::from_config(&s.sensor_type),
                            thresholds: SensorThresholds {
                                action_ft: s.action_stage_ft,
                                flood_ft: s.flood_stage_ft,
                            },
                        }
                    })
                    .collect();
                ZoneConfig::new(zone_id, &zone.name, sensors)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(zones)
    }

    pub fn zones(&self) -> &[ZoneConfig] {
        &self.zones
    }

    pub fn zone(&self, zone_id: usize) -> Option<&ZoneConfig> {
        self.zones.get(zone_id)
    }

    /// First zone (lowest id) carrying a sensor with this identity.
    pub fn zone_of_site(&self, site_code: &str) -> Option<&ZoneConfig> {
        self.zones
            .iter()
            .find(|z| z.sensors.iter().any(|s| s.sensor_id == site_code))
    }

    pub fn sensor_count(&self) -> usize {
        self.zones.iter().map(|z| z.sensors.len()).sum()
    }
}

// ============================================================================
// Loading Functions
// ============================================================================

/// Parse zones.toml contents into a validated topology
pub fn parse_zones(contents: &str, path: &Path) -> Result<ZoneTopology, ConfigError> {
    let config: ZonesConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    ZoneTopology::from_config(&config)
}

/// Load zones configuration from TOML file
pub fn load_zones<P: AsRef<Path>>(path: P) -> Result<ZoneTopology, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_zones(&contents, path)
}

/// Get all zones as a vector (in order 0-6)
pub fn get_all_zones(config: &ZonesConfig) -> Vec<(usize, &Zone)> {
    vec![
        (0, &config.zones.zone_0),
        (1, &config.zones.zone_1),
        (2, &config.zones.zone_2),
        (3, &config.zones.zone_3),
        (4, &config.zones.zone_4),
        (5, &config.zones.zone_5),
        (6, &config.zones.zone_6),
    ]
}

// ============================================================================
// Tests
// ============================================================================
