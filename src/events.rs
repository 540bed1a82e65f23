/// Historical flood event source.
///
/// Snapshots are generated for every crest recorded in `nws.flood_events`
/// whose severity is one of the configured levels, newest first.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::db::ConnectionPool;
use crate::model::FloodEvent;
use crate::store::StoreError;

/// Supplies the events a batch is run over.
pub trait EventStore {
    fn historical_events(&self, severities: &[String]) -> Result<Vec<FloodEvent>, StoreError>;
}

/// Reads `nws.flood_events`.
pub struct PgEventStore {
    pool: Arc<ConnectionPool>,
}

impl PgEventStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

impl EventStore for PgEventStore {
    fn historical_events(&self, severities: &[String]) -> Result<Vec<FloodEvent>, StoreError> {
        let mut client = self.pool.checkout()?;
        let rows = client.query(
            "SELECT id, site_code, crest_time, peak_stage_ft, severity, event_name
             FROM nws.flood_events
             WHERE crest_time IS NOT NULL
               AND peak_stage_ft IS NOT NULL
               AND severity = ANY($1)
             ORDER BY crest_time DESC",
            &[&severities],
        )?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_id: i32 = row.get(0);
            let peak: Decimal = row.get(3);
            let peak_stage_ft = peak.to_f64().ok_or_else(|| {
                StoreError::MalformedRow(format!("event {}: peak stage {} out of range", event_id, peak))
            })?;

            events.push(FloodEvent {
                event_id,
                site_code: row.get(1),
                crest_time: row.get(2),
                peak_stage_ft,
                severity: row.get(4),
                event_name: row.get(5),
            });
        }

        Ok(events)
    }
}

/// Fixed list of events, filtered by severity the same way as the database.
#[derive(Debug, Default, Clone)]
pub struct MemoryEventStore {
    events: Vec<FloodEvent>,
}

impl MemoryEventStore {
    pub fn new(events: Vec<FloodEvent>) -> Self {
        Self { events }
    }
}

impl EventStore for MemoryEventStore {
    fn historical_events(&self, severities: &[String]) -> Result<Vec<FloodEvent>, StoreError> {
        let mut events: Vec<FloodEvent> = self
            .events
            .iter()
            .filter(|e| severities.iter().any(|s| s.eq_ignore_ascii_case(&e.severity)))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.crest_time.cmp(&a.crest_time));
        Ok(events)
    }
}
