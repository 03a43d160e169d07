//! Ingestion Handler: validate one station payload and append it.
//!
//! No idempotency key exists; resubmitting a payload stores a second reading.

use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

use crate::{
    Coordinates, IngestAck, IngestionError, Reading, ReadingPayload, ReadingStore,
    ValidationError,
};

// ---

/// Validate `payload` and turn it into a storable [`Reading`].
///
/// `now` stamps `receivedAt`, and `timestamp` too when the station sent none.
/// Both are truncated to microseconds, the precision of a `TIMESTAMPTZ`
/// column, so the acknowledged and stored timestamps are identical.
pub fn validate(payload: ReadingPayload, now: DateTime<Utc>) -> Result<Reading, ValidationError> {
    // ---
    let station_id = payload
        .station_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ValidationError::new("stationId is required and must be non-empty"))?
        .to_string();

    for (name, value) in payload.measurements.fields() {
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(ValidationError::new(format!(
                    "{name} must be a finite number"
                )));
            }
        }
    }

    if let Some(coordinates) = payload.coordinates {
        validate_coordinates(coordinates)?;
    }

    let location = payload
        .location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    Ok(Reading {
        id: Uuid::new_v4(),
        station_id,
        location,
        coordinates: payload.coordinates,
        timestamp: payload.timestamp.unwrap_or(now).trunc_subsecs(6),
        received_at: now.trunc_subsecs(6),
        measurements: payload.measurements,
    })
}

fn validate_coordinates(c: Coordinates) -> Result<(), ValidationError> {
    // ---
    if !c.lat.is_finite() || !(-90.0..=90.0).contains(&c.lat) {
        return Err(ValidationError::new("coordinates.lat must be within [-90, 90]"));
    }
    if !c.lng.is_finite() || !(-180.0..=180.0).contains(&c.lng) {
        return Err(ValidationError::new("coordinates.lng must be within [-180, 180]"));
    }
    Ok(())
}

/// Validate and append one reading, returning the acknowledgment.
pub async fn ingest(
    store: &dyn ReadingStore,
    payload: ReadingPayload,
    now: DateTime<Utc>,
) -> Result<IngestAck, IngestionError> {
    // ---
    let reading = validate(payload, now)?;
    store.append(&reading).await?;

    tracing::info!(
        "Stored reading {} for station {} at {}",
        reading.id,
        reading.station_id,
        reading.timestamp
    );
    Ok(IngestAck::from(&reading))
}
