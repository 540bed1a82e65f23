//! Structured logging for snapshot runs.
//!
//! Per-sensor failures never become engine errors; they are emitted here as
//! `tracing` events tagged with the sensor, its source kind, and the flood
//! event being reconstructed, so an operator can see which gauges went dark
//! for which crest.
//!
//! Verbosity comes from `FLOMON_LOG` (an `EnvFilter` directive, default
//! `info`). Set `FLOMON_LOG_FORMAT=json` for newline-delimited JSON.

use std::env;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::model::SourceKind;
use crate::store::StoreError;

/// Installs the global subscriber. Only the first call takes effect.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_env("FLOMON_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("FLOMON_LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

/// RAII guard tagging everything logged inside it with the flood event.
pub struct EventSpan {
    _span: tracing::span::EnteredSpan,
}

impl EventSpan {
    pub fn enter(event_id: i32, site_code: &str) -> Self {
        let span = tracing::info_span!("flomon.event", event_id = event_id, site_code = %site_code);
        Self {
            _span: span.entered(),
        }
    }
}

/// A sensor query failed or ran past its deadline; the sensor is reported
/// as having no reading.
pub fn emit_sensor_failed(event_id: Option<i32>, zone_id: Option<usize>, sensor_id: &str, source: SourceKind, error: &StoreError) {
    let kind = if error.is_timeout() { "sensor.timeout" } else { "sensor.resolve_failed" };
    warn!(
        event = kind,
        event_id = ?event_id,
        zone_id = ?zone_id,
        sensor_id = %sensor_id,
        source = %source,
        error = %error,
    );
}

/// No rows inside the window. Expected for sparse history.
pub fn emit_sensor_missing(sensor_id: &str, source: SourceKind) {
    debug!(event = "sensor.no_reading", sensor_id = %sensor_id, source = %source);
}

pub fn emit_event_failed(event_id: i32, site_code: &str, error: &dyn std::fmt::Display) {
    warn!(event = "event.failed", event_id = event_id, site_code = %site_code, error = %error);
}

pub fn emit_event_classified(event_id: i32, classification: &str, failed_sensors: usize) {
    debug!(
        event = "event.classified",
        event_id = event_id,
        classification = %classification,
        failed_sensors = failed_sensors,
    );
}

pub fn emit_batch_finished(total: usize, succeeded: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "batch.finished",
        total = total,
        succeeded = succeeded,
        failed = failed,
        duration_ms = duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        let _span = EventSpan::enter(42, "05568500");
        emit_sensor_failed(Some(42), Some(2), "05568500", SourceKind::Usgs, &StoreError::Timeout { elapsed_ms: 5100 });
        emit_sensor_missing("KPIA", SourceKind::Asos);
        emit_event_failed(42, "05568500", &"no zone configured");
        emit_event_classified(42, "COMPOUND", 0);
        emit_batch_finished(5, 4, 1, 1200);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
