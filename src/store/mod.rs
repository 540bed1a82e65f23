/// Backing stores queried by the resolver.
///
/// Each store keeps its own native row shape:
/// - `GaugeRow`: USGS parameter-coded time series (`usgs_raw.gauge_readings`)
/// - `CwmsRow`: USACE location-keyed time series (`usace.cwms_timeseries`)
/// - `AsosRow`: IEM/ASOS fixed-field observations (`asos_observations`)
///
/// All three expose one primitive: rows for a sensor inside a closed time
/// window. Normalizing rows into `SensorReading` is the resolver's job.
///
/// Submodules:
/// - `pg`: pooled Postgres implementation
/// - `memory`: in-memory implementation for offline replays and tests

pub mod memory;
pub mod pg;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A store could not answer a query. Always scoped to one sensor query;
/// the resolver turns it into "no reading".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query exceeded deadline after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    #[error("search window of {hours} h is out of range")]
    WindowOutOfRange { hours: i64 },

    #[error("malformed row: {0}")]
    MalformedRow(String),

    #[error("query failed: {0}")]
    Query(#[from] postgres::Error),
}

impl StoreError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout { .. })
    }
}

// ---------------------------------------------------------------------------
// Query window
// ---------------------------------------------------------------------------

/// Closed interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Symmetric window of `hours` either side of `target`. Fails when
    /// either end falls outside the representable date range.
    pub fn around(target: DateTime<Utc>, hours: i64) -> Result<Self, StoreError> {
        let out_of_range = || StoreError::WindowOutOfRange { hours };
        let half = Duration::try_hours(hours).ok_or_else(out_of_range)?;
        Ok(Self {
            start: target.checked_sub_signed(half).ok_or_else(out_of_range)?,
            end: target.checked_add_signed(half).ok_or_else(out_of_range)?,
        })
    }

    /// Both ends inclusive.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

// ---------------------------------------------------------------------------
// Native row shapes
// ---------------------------------------------------------------------------

/// Row from `usgs_raw.gauge_readings`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeRow {
    pub site_code: String,
    pub parameter_code: String,
    pub value: Decimal,
    pub unit: String,
    pub reading_time: DateTime<Utc>,
}

/// Row from `usace.cwms_timeseries`.
#[derive(Debug, Clone, PartialEq)]
pub struct CwmsRow {
    pub location_id: String,
    pub value: Decimal,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

/// Row from `asos_observations`. Only the 6-hour precipitation field is
/// carried; it is null for observations that didn't report it.
#[derive(Debug, Clone, PartialEq)]
pub struct AsosRow {
    pub station_id: String,
    pub precip_6hr_in: Option<f64>,
    pub observation_time: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Store traits
// ---------------------------------------------------------------------------

/// USGS gauge readings keyed by site code and parameter code.
pub trait GaugeStore: Send + Sync {
    fn gauge_rows(
        &self,
        site_code: &str,
        parameter_code: &str,
        window: &TimeWindow,
    ) -> Result<Vec<GaugeRow>, StoreError>;
}

/// CWMS time series keyed by location. `location` matches any stored
/// location id that contains it.
pub trait CwmsStore: Send + Sync {
    fn cwms_rows(&self, location: &str, window: &TimeWindow) -> Result<Vec<CwmsRow>, StoreError>;
}

/// ASOS observations keyed by station id.
pub trait AsosStore: Send + Sync {
    fn asos_rows(&self, station_id: &str, window: &TimeWindow) -> Result<Vec<AsosRow>, StoreError>;
}
