/// Flood crest snapshot orchestration.
///
/// For each historical flood event, every sensor in all seven zones is
/// resolved at the crest time, each zone's status is evaluated, and the
/// event is classified from the resulting zone pattern.
///
/// Batches fan out over a bounded thread pool, one job per (event, zone).
/// Jobs report back over a channel and are joined by zone id within an
/// event and by input position across the batch, so output order never
/// depends on scheduling.
///
/// Failures are layered:
/// - a sensor that cannot be read becomes `None` and is logged
/// - an event whose site is in no zone, or whose every zone failed hard,
///   is recorded in the report and skipped
/// - nothing a single event does stops the batch

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use threadpool::ThreadPool;

use crate::classifier;
use crate::evaluator;
use crate::model::{EventType, FloodEvent, FloodEventSnapshot, ZoneSnapshot};
use crate::obs;
use crate::resolver::{Resolution, Resolver};
use crate::zones::{ZoneConfig, ZoneTopology, ZONE_COUNT};

/// Default size of the batch worker pool.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Why one event produced no snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("event {event_id}: site {site_code} is not configured in any zone")]
    UnknownSite { event_id: i32, site_code: String },

    #[error("event {event_id}: all {failed_sensors} sensor lookups failed")]
    AllZonesFailed { event_id: i32, failed_sensors: usize },

    #[error("event {event_id}: worker for zone {zone_id} exited without a result")]
    WorkerLost { event_id: i32, zone_id: usize },
}

// ---------------------------------------------------------------------------
// Batch report
// ---------------------------------------------------------------------------

/// An event that could not be snapshotted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventFailure {
    /// Position of the event in the batch input.
    pub index: usize,
    pub event_id: i32,
    pub site_code: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub event_types: BTreeMap<EventType, usize>,
}

/// Everything a batch produced, handed to reporting as one value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// Successful snapshots, in input order.
    pub snapshots: Vec<FloodEventSnapshot>,
    pub failures: Vec<EventFailure>,
    pub summary: BatchSummary,
}

impl BatchReport {
    /// Splits per-event results (in input order) into snapshots and failures.
    pub fn from_results(
        events: &[FloodEvent],
        results: Vec<Result<FloodEventSnapshot, SnapshotError>>,
    ) -> Self {
        let total = results.len();
        let mut snapshots = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for (index, (event, result)) in events.iter().zip(results).enumerate() {
            match result {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => failures.push(EventFailure {
                    index,
                    event_id: event.event_id,
                    site_code: event.site_code.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        let summary = BatchSummary {
            total,
            succeeded: snapshots.len(),
            failed: failures.len(),
            event_types: FloodEventSnapshot::event_type_distribution(&snapshots),
        };

        Self {
            snapshots,
            failures,
            summary,
        }
    }
}

// ---------------------------------------------------------------------------
// Zone jobs
// ---------------------------------------------------------------------------

/// One zone's snapshot plus how many of its lookups failed hard.
#[derive(Debug, Clone)]
struct ZoneOutcome {
    snapshot: ZoneSnapshot,
    failed: usize,
}

impl ZoneOutcome {
    fn hard_failed(&self) -> bool {
        !self.snapshot.sensors.is_empty() && self.failed == self.snapshot.sensors.len()
    }
}

fn snapshot_zone(resolver: &Resolver, zone: &ZoneConfig, event: &FloodEvent) -> ZoneOutcome {
    let mut sensors = Vec::with_capacity(zone.sensors.len());
    let mut failed = 0;

    for spec in &zone.sensors {
        let reading = match resolver.resolve_spec(spec, event.crest_time) {
            Resolution::Found(reading) => Some(reading),
            Resolution::Missing => {
                obs::emit_sensor_missing(&spec.sensor_id, spec.source);
                None
            }
            Resolution::Failed(e) => {
                failed += 1;
                obs::emit_sensor_failed(Some(event.event_id), Some(zone.zone_id), &spec.sensor_id, spec.source, &e);
                None
            }
        };
        sensors.push((spec.sensor_id.clone(), reading));
    }

    let zone_status = evaluator::evaluate(zone, &sensors);

    ZoneOutcome {
        snapshot: ZoneSnapshot {
            zone_id: zone.zone_id,
            zone_name: zone.name.clone(),
            zone_role: zone.role,
            snapshot_time: event.crest_time,
            sensors,
            zone_status,
        },
        failed,
    }
}

/// Joins zone outcomes (any order) into the event snapshot.
fn assemble(event: &FloodEvent, mut outcomes: Vec<ZoneOutcome>) -> Result<FloodEventSnapshot, SnapshotError> {
    outcomes.sort_by_key(|o| o.snapshot.zone_id);

    for (expected, outcome) in outcomes.iter().enumerate() {
        if outcome.snapshot.zone_id != expected {
            return Err(SnapshotError::WorkerLost {
                event_id: event.event_id,
                zone_id: expected,
            });
        }
    }
    if outcomes.len() < ZONE_COUNT {
        return Err(SnapshotError::WorkerLost {
            event_id: event.event_id,
            zone_id: outcomes.len(),
        });
    }

    if outcomes.iter().all(ZoneOutcome::hard_failed) {
        return Err(SnapshotError::AllZonesFailed {
            event_id: event.event_id,
            failed_sensors: outcomes.iter().map(|o| o.failed).sum(),
        });
    }

    let failed_sensors: usize = outcomes.iter().map(|o| o.failed).sum();
    let zones: Vec<ZoneSnapshot> = outcomes.into_iter().map(|o| o.snapshot).collect();
    let classification = classifier::classify(&zones);
    obs::emit_event_classified(event.event_id, classification.event_type.as_str(), failed_sensors);

    Ok(FloodEventSnapshot {
        event: event.clone(),
        zones,
        event_classification: classification.event_type,
        backwater_active: classification.backwater_active,
        upstream_pulse_detected: classification.upstream_pulse_detected,
        local_tributary_active: classification.local_tributary_active,
    })
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

pub struct SnapshotGenerator {
    topology: Arc<ZoneTopology>,
    resolver: Arc<Resolver>,
    worker_threads: usize,
}

impl SnapshotGenerator {
    pub fn new(topology: Arc<ZoneTopology>, resolver: Arc<Resolver>) -> Self {
        Self {
            topology,
            resolver,
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads.max(1);
        self
    }

    fn check_site(&self, event: &FloodEvent) -> Result<(), SnapshotError> {
        match self.topology.zone_of_site(&event.site_code) {
            Some(_) => Ok(()),
            None => Err(SnapshotError::UnknownSite {
                event_id: event.event_id,
                site_code: event.site_code.clone(),
            }),
        }
    }

    /// Snapshot for a single event, zones resolved on the calling thread.
    pub fn generate(&self, event: &FloodEvent) -> Result<FloodEventSnapshot, SnapshotError> {
        let _span = obs::EventSpan::enter(event.event_id, &event.site_code);
        self.check_site(event)?;

        let outcomes = self
            .topology
            .zones()
            .iter()
            .map(|zone| snapshot_zone(&self.resolver, zone, event))
            .collect();
        assemble(event, outcomes)
    }

    /// Snapshots for a batch of events. Never fails as a whole; per-event
    /// failures are listed in the report in input order.
    pub fn generate_all(&self, events: &[FloodEvent]) -> BatchReport {
        let started = Instant::now();
        let pool = ThreadPool::new(self.worker_threads);
        let (tx, rx) = mpsc::channel();

        let mut early: Vec<Option<SnapshotError>> = Vec::with_capacity(events.len());
        for (index, event) in events.iter().enumerate() {
            if let Err(e) = self.check_site(event) {
                early.push(Some(e));
                continue;
            }
            early.push(None);

            for zone_id in 0..self.topology.zones().len() {
                let tx = tx.clone();
                let topology = Arc::clone(&self.topology);
                let resolver = Arc::clone(&self.resolver);
                let event = event.clone();

                pool.execute(move || {
                    let _span = obs::EventSpan::enter(event.event_id, &event.site_code);
                    if let Some(zone) = topology.zone(zone_id) {
                        let outcome = snapshot_zone(&resolver, zone, &event);
                        // receiver outlives every job
                        let _ = tx.send((index, outcome));
                    }
                });
            }
        }
        drop(tx);

        // A job that panics drops its sender, so this ends once every job is done.
        let mut outcomes: Vec<Vec<ZoneOutcome>> = vec![Vec::new(); events.len()];
        for (index, outcome) in rx {
            outcomes[index].push(outcome);
        }
        pool.join();

        let results: Vec<Result<FloodEventSnapshot, SnapshotError>> = events
            .iter()
            .zip(early)
            .zip(outcomes)
            .map(|((event, early), outcomes)| {
                let _span = obs::EventSpan::enter(event.event_id, &event.site_code);
                let result = match early {
                    Some(e) => Err(e),
                    None => assemble(event, outcomes),
                };
                if let Err(e) = &result {
                    obs::emit_event_failed(event.event_id, &event.site_code, e);
                }
                result
            })
            .collect();

        let report = BatchReport::from_results(events, results);
        obs::emit_batch_finished(
            report.summary.total,
            report.summary.succeeded,
            report.summary.failed,
            started.elapsed().as_millis() as u64,
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SensorType, SourceKind, ZoneStatus};
    use crate::store::memory::MemoryStore;
    use crate::store::GaugeRow;
    use crate::zones::SensorSpec;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::time::Duration;

    fn crest() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 4, 23, 6, 0, 0).unwrap()
    }

    fn topology() -> ZoneTopology {
        let zones = (0..ZONE_COUNT)
            .map(|zone_id| {
                let site = format!("0556{:04}", zone_id);
                let spec = SensorSpec::new(&site, SourceKind::Usgs, SensorType::Stage)
                    .with_thresholds(Some(14.0), Some(16.0));
                ZoneConfig::new(zone_id, &format!("Zone {}", zone_id), vec![spec]).unwrap()
            })
            .collect();
        ZoneTopology::new(zones).unwrap()
    }

    fn stage(site: &str, value: i64) -> GaugeRow {
        GaugeRow {
            site_code: site.to_string(),
            parameter_code: "00065".to_string(),
            value: Decimal::new(value, 0),
            unit: "ft".to_string(),
            reading_time: crest(),
        }
    }

    fn generator(store: MemoryStore) -> SnapshotGenerator {
        let resolver = Resolver::with_store(6, Duration::from_secs(5), Arc::new(store));
        SnapshotGenerator::new(Arc::new(topology()), Arc::new(resolver)).with_worker_threads(3)
    }

    fn event(id: i32, site: &str) -> FloodEvent {
        FloodEvent {
            event_id: id,
            site_code: site.to_string(),
            crest_time: crest(),
            peak_stage_ft: 24.6,
            severity: "major".to_string(),
            event_name: None,
        }
    }

    #[test]
    fn test_generate_covers_all_zones_in_order() {
        let store = MemoryStore::new().with_gauge_rows((0..ZONE_COUNT).map(|z| stage(&format!("0556{:04}", z), 10)));
        let snapshot = generator(store).generate(&event(1, "05560002")).unwrap();

        let ids: Vec<usize> = snapshot.zones.iter().map(|z| z.zone_id).collect();
        assert_eq!(ids, (0..ZONE_COUNT).collect::<Vec<_>>());
        assert!(snapshot.zones.iter().all(|z| z.zone_status == ZoneStatus::Normal));
        assert!(snapshot.zones.iter().all(|z| z.snapshot_time == crest()));
        assert_eq!(snapshot.event_classification, EventType::Unknown);
    }

    #[test]
    fn test_missing_data_is_degraded_not_failed() {
        let snapshot = generator(MemoryStore::new()).generate(&event(1, "05560002")).unwrap();
        assert!(snapshot.zones.iter().all(|z| z.zone_status == ZoneStatus::Degraded));
    }

    #[test]
    fn test_unknown_site_fails_event() {
        let err = generator(MemoryStore::new()).generate(&event(9, "99999999")).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::UnknownSite {
                event_id: 9,
                site_code: "99999999".to_string()
            }
        );
    }

    #[test]
    fn test_total_outage_fails_event() {
        let err = generator(MemoryStore::new().with_outage_at(crest()))
            .generate(&event(4, "05560002"))
            .unwrap_err();
        assert!(matches!(err, SnapshotError::AllZonesFailed { event_id: 4, failed_sensors: 7 }));
    }

    #[test]
    fn test_generate_all_matches_generate() {
        let store = MemoryStore::new().with_gauge_rows(vec![stage("05560000", 17), stage("05560004", 15)]);
        let generator = generator(store);
        let events = vec![event(1, "05560002"), event(2, "05560003")];

        let report = generator.generate_all(&events);
        assert_eq!(report.summary.succeeded, 2);
        assert_eq!(report.snapshots[0], generator.generate(&events[0]).unwrap());
        assert_eq!(report.snapshots[0].event_classification, EventType::Compound);
        assert_eq!(report.summary.event_types.get(&EventType::Compound), Some(&2));
    }

    #[test]
    fn test_assemble_reports_missing_zone() {
        let err = assemble(&event(3, "05560002"), vec![]).unwrap_err();
        assert_eq!(err, SnapshotError::WorkerLost { event_id: 3, zone_id: 0 });
    }
}
