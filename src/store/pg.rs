/// Postgres-backed stores.
///
/// One `PgStore` serves all three source kinds off a shared connection
/// pool. Each query checks out a connection for its own duration only.
/// A query cancelled by the server-side `statement_timeout` surfaces as
/// `StoreError::Timeout`.

use postgres::error::SqlState;
use postgres::Row;
use std::sync::Arc;
use std::time::Instant;

use super::{AsosRow, AsosStore, CwmsRow, CwmsStore, GaugeRow, GaugeStore, StoreError, TimeWindow};
use crate::db::ConnectionPool;

pub struct PgStore {
    pool: Arc<ConnectionPool>,
}

impl PgStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    fn query(
        &self,
        sql: &str,
        params: &[&(dyn postgres::types::ToSql + Sync)],
    ) -> Result<Vec<Row>, StoreError> {
        let started = Instant::now();
        let mut client = self.pool.checkout()?;
        client.query(sql, params).map_err(|e| {
            if e.code() == Some(&SqlState::QUERY_CANCELED) {
                StoreError::Timeout {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                }
            } else {
                StoreError::Query(e)
            }
        })
    }
}

fn malformed(column: &str, e: postgres::Error) -> StoreError {
    StoreError::MalformedRow(format!("column {}: {}", column, e))
}

impl GaugeStore for PgStore {
    fn gauge_rows(
        &self,
        site_code: &str,
        parameter_code: &str,
        window: &TimeWindow,
    ) -> Result<Vec<GaugeRow>, StoreError> {
        let rows = self.query(
            "SELECT site_code, parameter_code, value, unit, reading_time
             FROM usgs_raw.gauge_readings
             WHERE site_code = $1
               AND parameter_code = $2
               AND reading_time BETWEEN $3 AND $4
             ORDER BY reading_time",
            &[&site_code, &parameter_code, &window.start, &window.end],
        )?;

        rows.iter()
            .map(|row| {
                Ok(GaugeRow {
                    site_code: row.try_get(0).map_err(|e| malformed("site_code", e))?,
                    parameter_code: row.try_get(1).map_err(|e| malformed("parameter_code", e))?,
                    value: row.try_get(2).map_err(|e| malformed("value", e))?,
                    unit: row.try_get(3).map_err(|e| malformed("unit", e))?,
                    reading_time: row.try_get(4).map_err(|e| malformed("reading_time", e))?,
                })
            })
            .collect()
    }
}

impl CwmsStore for PgStore {
    fn cwms_rows(&self, location: &str, window: &TimeWindow) -> Result<Vec<CwmsRow>, StoreError> {
        let pattern = format!("%{}%", location);
        let rows = self.query(
            "SELECT location_id, value, unit, timestamp
             FROM usace.cwms_timeseries
             WHERE location_id LIKE $1
               AND timestamp BETWEEN $2 AND $3
             ORDER BY timestamp",
            &[&pattern, &window.start, &window.end],
        )?;

        rows.iter()
            .map(|row| {
                Ok(CwmsRow {
                    location_id: row.try_get(0).map_err(|e| malformed("location_id", e))?,
                    value: row.try_get(1).map_err(|e| malformed("value", e))?,
                    unit: row.try_get(2).map_err(|e| malformed("unit", e))?,
                    timestamp: row.try_get(3).map_err(|e| malformed("timestamp", e))?,
                })
            })
            .collect()
    }
}

impl AsosStore for PgStore {
    fn asos_rows(&self, station_id: &str, window: &TimeWindow) -> Result<Vec<AsosRow>, StoreError> {
        let rows = self.query(
            "SELECT station_id, precip_6hr_in, observation_time
             FROM asos_observations
             WHERE station_id = $1
               AND observation_time BETWEEN $2 AND $3
             ORDER BY observation_time",
            &[&station_id, &window.start, &window.end],
        )?;

        rows.iter()
            .map(|row| {
                Ok(AsosRow {
                    station_id: row.try_get(0).map_err(|e| malformed("station_id", e))?,
                    precip_6hr_in: row.try_get(1).map_err(|e| malformed("precip_6hr_in", e))?,
                    observation_time: row.try_get(2).map_err(|e| malformed("observation_time", e))?,
                })
            })
            .collect()
    }
}
