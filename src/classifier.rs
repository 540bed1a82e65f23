/// Event classification from zone statuses.
///
/// A zone is "active" when it is at WARNING or CRITICAL. Activity is
/// grouped by zone role:
///
/// - backwater: the outlet river or the lock/pool interface
/// - local tributary: tributaries entering near the property
/// - upstream pulse: any main-stem zone further up the basin
///
/// The property zone is what is being explained and never participates.
///
/// Precedence (first match wins):
///   backwater ∧ upstream → COMPOUND
///   backwater            → BOTTOM_UP
///   tributary ∧ ¬upstream → LOCAL_TRIBUTARY
///   upstream             → TOP_DOWN
///   otherwise            → UNKNOWN
///
/// Backwater dominates: a backwater event with an active tributary is
/// BOTTOM_UP, not LOCAL_TRIBUTARY. That ordering is kept exactly as
/// hydrologists specified it and is open for review.

use serde::Serialize;

use crate::model::{EventType, ZoneRole, ZoneSnapshot};

/// Activity flags and the resulting event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub event_type: EventType,
    pub backwater_active: bool,
    pub upstream_pulse_detected: bool,
    pub local_tributary_active: bool,
}

impl Classification {
    /// Maps the three group flags to an event type.
    pub fn from_flags(backwater: bool, upstream: bool, tributary: bool) -> Self {
        let event_type = if backwater && upstream {
            EventType::Compound
        } else if backwater {
            EventType::BottomUp
        } else if tributary && !upstream {
            EventType::LocalTributary
        } else if upstream {
            EventType::TopDown
        } else {
            EventType::Unknown
        };

        Self {
            event_type,
            backwater_active: backwater,
            upstream_pulse_detected: upstream,
            local_tributary_active: tributary,
        }
    }
}

fn any_active<F>(zones: &[ZoneSnapshot], pick: F) -> bool
where
    F: Fn(ZoneRole) -> bool,
{
    zones
        .iter()
        .any(|z| pick(z.zone_role) && z.zone_status.is_active())
}

/// Classifies an event from its zone snapshots (any order).
pub fn classify(zones: &[ZoneSnapshot]) -> Classification {
    let backwater = any_active(zones, ZoneRole::is_backwater);
    let tributary = any_active(zones, |role| role == ZoneRole::LocalTributary);
    let upstream = any_active(zones, |role| role == ZoneRole::Upstream);

    Classification::from_flags(backwater, upstream, tributary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ZoneStatus::{self, Critical, Degraded, Normal, Warning};
    use chrono::{TimeZone, Utc};

    fn zones(statuses: [ZoneStatus; 7]) -> Vec<ZoneSnapshot> {
        statuses
            .iter()
            .enumerate()
            .map(|(zone_id, &zone_status)| ZoneSnapshot {
                zone_id,
                zone_name: format!("Zone {}", zone_id),
                zone_role: ZoneRole::for_zone(zone_id).unwrap(),
                snapshot_time: Utc.with_ymd_and_hms(2013, 4, 23, 6, 0, 0).unwrap(),
                sensors: vec![],
                zone_status,
            })
            .collect()
    }

    #[test]
    fn test_backwater_only_is_bottom_up() {
        let c = classify(&zones([Critical, Critical, Critical, Normal, Normal, Normal, Normal]));
        assert_eq!(c.event_type, EventType::BottomUp);
        assert!(c.backwater_active);
        assert!(!c.upstream_pulse_detected);
        assert!(!c.local_tributary_active);
    }

    #[test]
    fn test_upstream_checked_before_tributary() {
        let c = classify(&zones([Normal, Normal, Critical, Warning, Warning, Normal, Normal]));
        assert_eq!(c.event_type, EventType::TopDown);
        assert!(!c.backwater_active);
        assert!(c.upstream_pulse_detected);
        assert!(c.local_tributary_active);
    }

    #[test]
    fn test_all_normal_is_unknown() {
        let c = classify(&zones([Normal; 7]));
        assert_eq!(c.event_type, EventType::Unknown);
        assert!(!c.backwater_active && !c.upstream_pulse_detected && !c.local_tributary_active);
    }

    #[test]
    fn test_backwater_and_upstream_is_compound() {
        let c = classify(&zones([Normal, Warning, Normal, Normal, Normal, Normal, Critical]));
        assert_eq!(c.event_type, EventType::Compound);
    }

    #[test]
    fn test_tributary_alone_is_local() {
        let c = classify(&zones([Normal, Normal, Warning, Critical, Normal, Normal, Normal]));
        assert_eq!(c.event_type, EventType::LocalTributary);
    }

    #[test]
    fn test_backwater_masks_tributary() {
        let c = classify(&zones([Warning, Normal, Normal, Critical, Normal, Normal, Normal]));
        assert_eq!(c.event_type, EventType::BottomUp);
        assert!(c.local_tributary_active);
    }

    #[test]
    fn test_property_zone_and_degraded_do_not_count() {
        let c = classify(&zones([Degraded, Degraded, Critical, Degraded, Degraded, Degraded, Degraded]));
        assert_eq!(c.event_type, EventType::Unknown);
    }

    #[test]
    fn test_zone_order_does_not_matter() {
        let mut z = zones([Normal, Critical, Normal, Normal, Normal, Warning, Normal]);
        z.reverse();
        assert_eq!(classify(&z).event_type, EventType::Compound);
    }
}
