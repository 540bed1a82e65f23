/// Sensor reading resolver.
///
/// Finds the one reading for a sensor closest to a target instant, within a
/// symmetric window, from whichever store carries that sensor's source kind.
///
/// Each source kind is a `ReadingSource` that turns its store's native rows
/// into `SensorReading`s:
///
/// | kind | store rows            | normalization                                   |
/// |------|-----------------------|-------------------------------------------------|
/// | USGS | parameter-coded gauge | stage → `00065`, everything else → `00060`       |
/// | CWMS | location-keyed series | value and unit as stored                         |
/// | ASOS | station observations  | 6-hr precip only; type `precipitation`, `inches` |
///
/// Selection is nearest-in-time with ties going to the earlier reading.
/// Store errors, timeouts, and malformed rows all come back as
/// `Resolution::Failed`; `resolve` flattens that to `None` after logging.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::model::{SensorReading, SensorType, SourceKind, PARAM_DISCHARGE, PARAM_STAGE, PRECIP_UNIT};
use crate::obs;
use crate::store::{AsosStore, CwmsStore, GaugeStore, StoreError, TimeWindow};
use crate::zones::SensorSpec;

/// Default half-width of the search window (hours).
pub const DEFAULT_WINDOW_HOURS: i64 = 6;

/// Default per-sensor deadline.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Fetches normalized readings for one source kind.
pub trait ReadingSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn fetch(
        &self,
        sensor_id: &str,
        sensor_type: SensorType,
        window: &TimeWindow,
    ) -> Result<Vec<SensorReading>, StoreError>;
}

fn finite(sensor_id: &str, value: f64) -> Result<f64, StoreError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(StoreError::MalformedRow(format!("{}: non-finite value {}", sensor_id, value)))
    }
}

/// NUMERIC column value as a finite f64.
fn numeric(sensor_id: &str, value: Decimal) -> Result<f64, StoreError> {
    let converted = value.to_f64().ok_or_else(|| {
        StoreError::MalformedRow(format!("{}: value {} out of range", sensor_id, value))
    })?;
    finite(sensor_id, converted)
}

/// USGS NWIS gauges.
pub struct UsgsSource {
    store: Arc<dyn GaugeStore>,
}

impl UsgsSource {
    pub fn new(store: Arc<dyn GaugeStore>) -> Self {
        Self { store }
    }

    /// Stage requests read gage height; every other type reads discharge.
    pub fn parameter_code(sensor_type: SensorType) -> &'static str {
        if sensor_type == SensorType::Stage {
            PARAM_STAGE
        } else {
            PARAM_DISCHARGE
        }
    }
}

impl ReadingSource for UsgsSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Usgs
    }

    fn fetch(
        &self,
        sensor_id: &str,
        sensor_type: SensorType,
        window: &TimeWindow,
    ) -> Result<Vec<SensorReading>, StoreError> {
        let rows = self
            .store
            .gauge_rows(sensor_id, Self::parameter_code(sensor_type), window)?;

        rows.into_iter()
            .map(|row| {
                Ok(SensorReading {
                    sensor_id: sensor_id.to_string(),
                    sensor_type,
                    value: numeric(sensor_id, row.value)?,
                    unit: row.unit,
                    timestamp: row.reading_time,
                    source: SourceKind::Usgs,
                })
            })
            .collect()
    }
}

/// USACE CWMS locations.
pub struct CwmsSource {
    store: Arc<dyn CwmsStore>,
}

impl CwmsSource {
    pub fn new(store: Arc<dyn CwmsStore>) -> Self {
        Self { store }
    }
}

impl ReadingSource for CwmsSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Cwms
    }

    fn fetch(
        &self,
        sensor_id: &str,
        sensor_type: SensorType,
        window: &TimeWindow,
    ) -> Result<Vec<SensorReading>, StoreError> {
        self.store
            .cwms_rows(sensor_id, window)?
            .into_iter()
            .map(|row| {
                Ok(SensorReading {
                    sensor_id: sensor_id.to_string(),
                    sensor_type,
                    value: numeric(sensor_id, row.value)?,
                    unit: row.unit,
                    timestamp: row.timestamp,
                    source: SourceKind::Cwms,
                })
            })
            .collect()
    }
}

/// IEM/ASOS stations. The store only carries precipitation, so the
/// requested sensor type is ignored.
pub struct AsosSource {
    store: Arc<dyn AsosStore>,
}

impl AsosSource {
    pub fn new(store: Arc<dyn AsosStore>) -> Self {
        Self { store }
    }
}

impl ReadingSource for AsosSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Asos
    }

    fn fetch(
        &self,
        sensor_id: &str,
        _sensor_type: SensorType,
        window: &TimeWindow,
    ) -> Result<Vec<SensorReading>, StoreError> {
        self.store
            .asos_rows(sensor_id, window)?
            .into_iter()
            .filter_map(|row| row.precip_6hr_in.map(|precip| (precip, row.observation_time)))
            .map(|(precip, observed)| {
                Ok(SensorReading {
                    sensor_id: sensor_id.to_string(),
                    sensor_type: SensorType::Precipitation,
                    value: finite(sensor_id, precip)?,
                    unit: PRECIP_UNIT.to_string(),
                    timestamp: observed,
                    source: SourceKind::Asos,
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Reading closest to `target` inside `window`; ties go to the earlier one.
pub fn nearest_reading(
    readings: Vec<SensorReading>,
    target: DateTime<Utc>,
    window: &TimeWindow,
) -> Option<SensorReading> {
    readings
        .into_iter()
        .filter(|r| window.contains(r.timestamp))
        .min_by_key(|r| ((r.timestamp - target).abs(), r.timestamp))
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Outcome of resolving one sensor.
#[derive(Debug)]
pub enum Resolution {
    Found(SensorReading),
    /// No rows in the window, or no store for this source kind.
    Missing,
    /// Store failure, timeout, or malformed row.
    Failed(StoreError),
}

impl Resolution {
    pub fn is_failed(&self) -> bool {
        matches!(self, Resolution::Failed(_))
    }
}

/// Routes each sensor to its source and picks the nearest reading.
pub struct Resolver {
    sources: HashMap<SourceKind, Arc<dyn ReadingSource>>,
    window_hours: i64,
    query_timeout: Duration,
}

impl Resolver {
    pub fn new(window_hours: i64, query_timeout: Duration) -> Self {
        Self {
            sources: HashMap::new(),
            window_hours,
            query_timeout,
        }
    }

    /// Registers a source, replacing any previous one for the same kind.
    pub fn with_source(mut self, source: Arc<dyn ReadingSource>) -> Self {
        self.sources.insert(source.kind(), source);
        self
    }

    /// USGS, CWMS, and ASOS sources all backed by one store handle.
    pub fn with_store<S>(window_hours: i64, query_timeout: Duration, store: Arc<S>) -> Self
    where
        S: GaugeStore + CwmsStore + AsosStore + 'static,
    {
        Self::new(window_hours, query_timeout)
            .with_source(Arc::new(UsgsSource::new(store.clone())))
            .with_source(Arc::new(CwmsSource::new(store.clone())))
            .with_source(Arc::new(AsosSource::new(store)))
    }

    /// Resolves a sensor and keeps the failure detail. Does not log.
    pub fn resolve_outcome(
        &self,
        sensor_id: &str,
        sensor_type: SensorType,
        source_kind: SourceKind,
        target: DateTime<Utc>,
        window_hours: i64,
    ) -> Resolution {
        let Some(source) = self.sources.get(&source_kind) else {
            return Resolution::Missing;
        };

        let window = match TimeWindow::around(target, window_hours) {
            Ok(window) => window,
            Err(e) => return Resolution::Failed(e),
        };
        let started = Instant::now();
        let fetched = source.fetch(sensor_id, sensor_type, &window);

        let elapsed = started.elapsed();
        if elapsed > self.query_timeout {
            return Resolution::Failed(StoreError::Timeout {
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }

        match fetched {
            Ok(readings) => match nearest_reading(readings, target, &window) {
                Some(reading) => Resolution::Found(reading),
                None => Resolution::Missing,
            },
            Err(e) => Resolution::Failed(e),
        }
    }

    /// Resolves a configured sensor with the resolver's own window.
    pub fn resolve_spec(&self, spec: &SensorSpec, target: DateTime<Utc>) -> Resolution {
        self.resolve_outcome(&spec.sensor_id, spec.sensor_type, spec.source, target, self.window_hours)
    }

    /// Nearest reading or `None`. Failures are logged, never returned.
    pub fn resolve(
        &self,
        sensor_id: &str,
        sensor_type: SensorType,
        source_kind: SourceKind,
        target: DateTime<Utc>,
        window_hours: i64,
    ) -> Option<SensorReading> {
        match self.resolve_outcome(sensor_id, sensor_type, source_kind, target, window_hours) {
            Resolution::Found(reading) => Some(reading),
            Resolution::Missing => {
                obs::emit_sensor_missing(sensor_id, source_kind);
                None
            }
            Resolution::Failed(e) => {
                obs::emit_sensor_failed(None, None, sensor_id, source_kind, &e);
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
