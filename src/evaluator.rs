/// Zone status evaluation.
///
/// Rules, first match wins:
///   1. Any level sensor (stage or pool elevation) at or above flood stage → CRITICAL
///   2. Any level sensor at or above action stage → WARNING
///   3. No strict majority of the zone's sensors reported → DEGRADED
///   4. Otherwise → NORMAL
///
/// Discharge, precipitation and tailwater readings count toward coverage
/// but never toward thresholds.

use crate::model::{SensorReading, ZoneStatus};
use crate::zones::ZoneConfig;

/// Per-zone counts that drive the status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThresholdTally {
    pub critical: usize,
    pub elevated: usize,
    pub present: usize,
    pub total: usize,
}

impl ThresholdTally {
    pub fn status(&self) -> ZoneStatus {
        if self.critical > 0 {
            ZoneStatus::Critical
        } else if self.elevated > 0 {
            ZoneStatus::Warning
        } else if self.total > 0 && self.present * 2 <= self.total {
            ZoneStatus::Degraded
        } else {
            ZoneStatus::Normal
        }
    }
}

/// Counts threshold exceedances and coverage for one zone.
///
/// `readings` pairs up with `zone.sensors` by position (configuration
/// order), so a site listed twice, e.g. as stage and as discharge, keeps
/// each entry's own type and thresholds. Whether a sensor is a level
/// sensor comes from its configured type.
pub fn tally(zone: &ZoneConfig, readings: &[(String, Option<SensorReading>)]) -> ThresholdTally {
    let mut tally = ThresholdTally {
        total: zone.sensors.len(),
        ..Default::default()
    };

    for (spec, (_, reading)) in zone.sensors.iter().zip(readings) {
        let Some(reading) = reading else {
            continue;
        };
        tally.present += 1;

        if !spec.sensor_type.is_level() {
            continue;
        }
        let limits = &spec.thresholds;
        if limits.flood_ft.is_some_and(|flood| reading.value >= flood) {
            tally.critical += 1;
        } else if limits.action_ft.is_some_and(|action| reading.value >= action) {
            tally.elevated += 1;
        }
    }

    tally
}

/// Status of a zone given its sensors' readings at the snapshot time.
pub fn evaluate(zone: &ZoneConfig, readings: &[(String, Option<SensorReading>)]) -> ZoneStatus {
    tally(zone, readings).status()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SensorType, SourceKind};
    use crate::zones::SensorSpec;
    use chrono::{TimeZone, Utc};

    fn zone(sensors: Vec<SensorSpec>) -> ZoneConfig {
        ZoneConfig::new(2, "Peoria Lake", sensors).unwrap()
    }

    fn stage(id: &str) -> SensorSpec {
        SensorSpec::new(id, SourceKind::Usgs, SensorType::Stage).with_thresholds(Some(14.0), Some(16.0))
    }

    fn reading(id: &str, sensor_type: SensorType, value: f64) -> Option<SensorReading> {
        Some(SensorReading {
            sensor_id: id.to_string(),
            sensor_type,
            value,
            unit: "ft".to_string(),
            timestamp: Utc.with_ymd_and_hms(2013, 4, 23, 6, 0, 0).unwrap(),
            source: SourceKind::Usgs,
        })
    }

    fn four_stage_zone() -> ZoneConfig {
        zone(vec![stage("A"), stage("B"), stage("C"), stage("D")])
    }

    #[test]
    fn test_critical_beats_sparsity() {
        let readings = vec![
            ("A".to_string(), reading("A", SensorType::Stage, 17.0)),
            ("B".to_string(), None),
            ("C".to_string(), None),
            ("D".to_string(), None),
        ];
        assert_eq!(evaluate(&four_stage_zone(), &readings), ZoneStatus::Critical);
    }

    #[test]
    fn test_flood_stage_is_inclusive() {
        let readings = vec![("A".to_string(), reading("A", SensorType::Stage, 16.0))];
        assert_eq!(evaluate(&zone(vec![stage("A")]), &readings), ZoneStatus::Critical);

        let readings = vec![("A".to_string(), reading("A", SensorType::Stage, 14.0))];
        assert_eq!(evaluate(&zone(vec![stage("A")]), &readings), ZoneStatus::Warning);
    }

    #[test]
    fn test_warning_beats_sparsity() {
        let readings = vec![
            ("A".to_string(), reading("A", SensorType::Stage, 15.0)),
            ("B".to_string(), None),
            ("C".to_string(), None),
            ("D".to_string(), None),
        ];
        assert_eq!(evaluate(&four_stage_zone(), &readings), ZoneStatus::Warning);
    }

    #[test]
    fn test_half_present_is_degraded_three_quarters_is_normal() {
        let two_of_four = vec![
            ("A".to_string(), reading("A", SensorType::Stage, 10.0)),
            ("B".to_string(), reading("B", SensorType::Stage, 10.0)),
            ("C".to_string(), None),
            ("D".to_string(), None),
        ];
        assert_eq!(evaluate(&four_stage_zone(), &two_of_four), ZoneStatus::Degraded);

        let one_of_four = vec![
            ("A".to_string(), reading("A", SensorType::Stage, 10.0)),
            ("B".to_string(), None),
            ("C".to_string(), None),
            ("D".to_string(), None),
        ];
        assert_eq!(evaluate(&four_stage_zone(), &one_of_four), ZoneStatus::Degraded);

        let three_of_four = vec![
            ("A".to_string(), reading("A", SensorType::Stage, 10.0)),
            ("B".to_string(), reading("B", SensorType::Stage, 10.0)),
            ("C".to_string(), reading("C", SensorType::Stage, 10.0)),
            ("D".to_string(), None),
        ];
        assert_eq!(evaluate(&four_stage_zone(), &three_of_four), ZoneStatus::Normal);
    }

    #[test]
    fn test_non_level_sensors_never_trip_thresholds() {
        let z = zone(vec![
            SensorSpec::new("Q", SourceKind::Usgs, SensorType::Discharge).with_thresholds(Some(1.0), Some(2.0)),
            SensorSpec::new("KPIA", SourceKind::Asos, SensorType::Precipitation),
        ]);
        let readings = vec![
            ("Q".to_string(), reading("Q", SensorType::Discharge, 85_000.0)),
            ("KPIA".to_string(), reading("KPIA", SensorType::Precipitation, 3.2)),
        ];
        assert_eq!(evaluate(&z, &readings), ZoneStatus::Normal);
    }

    #[test]
    fn test_site_listed_twice_keeps_each_entry_thresholds() {
        let z = zone(vec![
            SensorSpec::new("05568500", SourceKind::Usgs, SensorType::Discharge),
            SensorSpec::new("05568500", SourceKind::Usgs, SensorType::Stage).with_thresholds(Some(14.0), Some(16.0)),
        ]);
        let readings = vec![
            ("05568500".to_string(), reading("05568500", SensorType::Discharge, 85_000.0)),
            ("05568500".to_string(), reading("05568500", SensorType::Stage, 17.0)),
        ];
        assert_eq!(evaluate(&z, &readings), ZoneStatus::Critical);
    }

    #[test]
    fn test_configured_type_decides_level_check() {
        // the reading's own tag is ignored
        let z = zone(vec![stage("A")]);
        let readings = vec![("A".to_string(), reading("A", SensorType::Other, 17.0))];
        assert_eq!(evaluate(&z, &readings), ZoneStatus::Critical);
    }

    #[test]
    fn test_pool_elevation_uses_thresholds() {
        let z = zone(vec![SensorSpec::new("Peoria-Pool", SourceKind::Cwms, SensorType::PoolElevation)
            .with_thresholds(Some(446.0), Some(447.5))]);
        let readings = vec![(
            "Peoria-Pool".to_string(),
            reading("Peoria-Pool", SensorType::PoolElevation, 448.1),
        )];
        assert_eq!(evaluate(&z, &readings), ZoneStatus::Critical);
    }

    #[test]
    fn test_missing_thresholds_are_skipped() {
        let z = zone(vec![SensorSpec::new("A", SourceKind::Usgs, SensorType::Stage)]);
        let readings = vec![("A".to_string(), reading("A", SensorType::Stage, 99.0))];
        assert_eq!(evaluate(&z, &readings), ZoneStatus::Normal);
    }

    #[test]
    fn test_zone_without_sensors_is_normal() {
        let z = zone(vec![]);
        assert_eq!(evaluate(&z, &[]), ZoneStatus::Normal);
        assert_eq!(tally(&z, &[]).total, 0);
    }
}
