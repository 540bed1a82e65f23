/// Run configuration loader - parses snapshots.toml
///
/// Keeps the resolver window, per-sensor deadline, and worker pool sizing
/// out of the code so a rerun against a different history doesn't need a
/// rebuild. Every field has a default; a missing file means "use defaults".

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "snapshots.toml";

/// Widest accepted search window either side of a crest (one year).
pub const MAX_WINDOW_HOURS: i64 = 8760;

/// Startup-time configuration failures. These abort the run before any
/// snapshot work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("zone {zone_id} sensor {sensor_id}: action stage {action_ft} ft is above flood stage {flood_ft} ft")]
    ThresholdOrder {
        zone_id: usize,
        sensor_id: String,
        action_ft: f64,
        flood_ft: f64,
    },

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Snapshot run settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Half-width of the search window around the crest (hours).
    pub window_hours: i64,

    /// Per-sensor query deadline (seconds).
    pub query_timeout_secs: u64,

    /// Worker threads resolving (event, zone) units.
    pub worker_threads: usize,

    /// Postgres connections kept open for the run.
    pub pool_size: usize,

    /// Path to the zone registry.
    pub zones_path: PathBuf,

    /// Event severities pulled from the event store.
    pub severities: Vec<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            window_hours: 6,
            query_timeout_secs: 5,
            worker_threads: 4,
            pool_size: 4,
            zones_path: PathBuf::from("zones.toml"),
            severities: vec!["flood".to_string(), "moderate".to_string(), "major".to_string()],
        }
    }
}

impl SnapshotConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.window_hours <= 0 || self.window_hours > MAX_WINDOW_HOURS {
            return Err(ConfigError::Invalid {
                field: "window_hours",
                reason: format!("must be between 1 and {}, got {}", MAX_WINDOW_HOURS, self.window_hours),
            });
        }
        if self.query_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "query_timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.worker_threads == 0 || self.pool_size == 0 {
            return Err(ConfigError::Invalid {
                field: "worker_threads/pool_size",
                reason: "must be at least 1".to_string(),
            });
        }
        // every worker holds at most one connection at a time
        if self.worker_threads > self.pool_size {
            return Err(ConfigError::Invalid {
                field: "worker_threads",
                reason: format!(
                    "{} workers would wait on {} pooled connections",
                    self.worker_threads, self.pool_size
                ),
            });
        }
        if self.severities.is_empty() {
            return Err(ConfigError::Invalid {
                field: "severities",
                reason: "at least one severity is required".to_string(),
            });
        }
        Ok(self)
    }
}

/// Parses and validates a config document.
pub fn parse_config(contents: &str, path: &Path) -> Result<SnapshotConfig, ConfigError> {
    let config: SnapshotConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()
}

/// Loads snapshots.toml from `path`. A missing file yields the defaults;
/// any other read or parse failure is fatal.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SnapshotConfig, ConfigError> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents, path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(SnapshotConfig::default()),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = SnapshotConfig::default();
        assert_eq!(config.window_hours, 6);
        assert_eq!(config.query_timeout(), Duration::from_secs(5));
        assert_eq!(config.zones_path, PathBuf::from("zones.toml"));
        assert_eq!(config.severities, vec!["flood", "moderate", "major"]);
    }

    #[test]
    fn test_partial_file_keeps_remaining_defaults() {
        let config = parse_config("window_hours = 12\nworker_threads = 3\n", Path::new("t.toml"))
            .expect("partial config should parse");
        assert_eq!(config.window_hours, 12);
        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.pool_size, 4);
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let err = parse_config("window_hours = 0\n", Path::new("t.toml")).unwrap_err();
        assert!(err.to_string().contains("window_hours"));
    }

    #[test]
    fn test_huge_window_is_rejected_at_load() {
        let err = parse_config("window_hours = 100000000000\n", Path::new("t.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "window_hours", .. }));

        let config = parse_config("window_hours = 8760\n", Path::new("t.toml")).expect("one year is allowed");
        assert_eq!(config.window_hours, MAX_WINDOW_HOURS);
    }

    #[test]
    fn test_more_workers_than_connections_is_rejected() {
        let err = parse_config("worker_threads = 8\npool_size = 2\n", Path::new("t.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "worker_threads", .. }));

        let config = parse_config("worker_threads = 2\npool_size = 4\n", Path::new("t.toml"))
            .expect("spare connections are fine");
        assert_eq!(config.worker_threads, 2);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let err = parse_config("window_hours = \"six\"\n", Path::new("t.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config("definitely/not/here/snapshots.toml").expect("defaults");
        assert_eq!(config, SnapshotConfig::default());
    }

    #[test]
    fn test_repository_config_spells_out_defaults() {
        let config = load_config(DEFAULT_CONFIG_PATH).expect("snapshots.toml should load");
        assert_eq!(config, SnapshotConfig::default());
    }
}
