/// In-memory backing store.
///
/// Holds rows for all three source kinds and answers window queries the
/// same way the Postgres store does. Used for offline replays of exported
/// history and throughout the test suite. A store can be told to fail every
/// query whose window covers a given instant, which is how tests simulate an
/// outage during one event.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{AsosRow, AsosStore, CwmsRow, CwmsStore, GaugeRow, GaugeStore, StoreError, TimeWindow};

#[derive(Debug, Default)]
pub struct MemoryStore {
    gauges: Vec<GaugeRow>,
    cwms: Vec<CwmsRow>,
    asos: Vec<AsosRow>,
    outages: Vec<DateTime<Utc>>,
    queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gauge_rows(mut self, rows: impl IntoIterator<Item = GaugeRow>) -> Self {
        self.gauges.extend(rows);
        self
    }

    pub fn with_cwms_rows(mut self, rows: impl IntoIterator<Item = CwmsRow>) -> Self {
        self.cwms.extend(rows);
        self
    }

    pub fn with_asos_rows(mut self, rows: impl IntoIterator<Item = AsosRow>) -> Self {
        self.asos.extend(rows);
        self
    }

    /// Every query whose window contains `at` fails as if the store were down.
    pub fn with_outage_at(mut self, at: DateTime<Utc>) -> Self {
        self.outages.push(at);
        self
    }

    /// Total queries answered or refused so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    fn check_outage(&self, window: &TimeWindow) -> Result<(), StoreError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        if self.outages.iter().any(|t| window.contains(*t)) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

impl GaugeStore for MemoryStore {
    fn gauge_rows(
        &self,
        site_code: &str,
        parameter_code: &str,
        window: &TimeWindow,
    ) -> Result<Vec<GaugeRow>, StoreError> {
        self.check_outage(window)?;
        Ok(self
            .gauges
            .iter()
            .filter(|r| r.site_code == site_code && r.parameter_code == parameter_code)
            .filter(|r| window.contains(r.reading_time))
            .cloned()
            .collect())
    }
}

impl CwmsStore for MemoryStore {
    fn cwms_rows(&self, location: &str, window: &TimeWindow) -> Result<Vec<CwmsRow>, StoreError> {
        self.check_outage(window)?;
        Ok(self
            .cwms
            .iter()
            .filter(|r| r.location_id.contains(location))
            .filter(|r| window.contains(r.timestamp))
            .cloned()
            .collect())
    }
}

impl AsosStore for MemoryStore {
    fn asos_rows(&self, station_id: &str, window: &TimeWindow) -> Result<Vec<AsosRow>, StoreError> {
        self.check_outage(window)?;
        Ok(self
            .asos
            .iter()
            .filter(|r| r.station_id == station_id)
            .filter(|r| window.contains(r.observation_time))
            .cloned()
            .collect())
    }
}
