use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::ReadingStore;
use crate::{Coordinates, Measurements, Reading, StoreError};

// ---

const READING_COLUMNS: &str = r#"
    id, station_id, location, lat, lng, recorded_at, received_at,
    temperature, humidity, precipitation, wind_speed, wind_direction,
    pressure, battery_voltage
"#;

/// PostgreSQL-backed store over the flat `readings` table (see `schema.rs`).
#[derive(Debug, Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        PgReadingStore { pool }
    }
}

/// Row shape of the `readings` table.
#[derive(Debug, sqlx::FromRow)]
struct ReadingRow {
    // ---
    id: Uuid,
    station_id: String,
    location: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    recorded_at: DateTime<Utc>,
    received_at: DateTime<Utc>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    precipitation: Option<f64>,
    wind_speed: Option<f64>,
    wind_direction: Option<f64>,
    pressure: Option<f64>,
    battery_voltage: Option<f64>,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        // ---
        let coordinates = match (row.lat, row.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        };

        Reading {
            id: row.id,
            station_id: row.station_id,
            location: row.location,
            coordinates,
            timestamp: row.recorded_at,
            received_at: row.received_at,
            measurements: Measurements {
                temperature: row.temperature,
                humidity: row.humidity,
                precipitation: row.precipitation,
                wind_speed: row.wind_speed,
                wind_direction: row.wind_direction,
                pressure: row.pressure,
                battery_voltage: row.battery_voltage,
            },
        }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    // ---
    async fn append(&self, reading: &Reading) -> Result<(), StoreError> {
        // ---
        let m = &reading.measurements;
        sqlx::query(
            r#"
            INSERT INTO readings (
                id, station_id, location, lat, lng, recorded_at, received_at,
                temperature, humidity, precipitation, wind_speed, wind_direction,
                pressure, battery_voltage
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(reading.id)
        .bind(&reading.station_id)
        .bind(&reading.location)
        .bind(reading.coordinates.map(|c| c.lat))
        .bind(reading.coordinates.map(|c| c.lng))
        .bind(reading.timestamp)
        .bind(reading.received_at)
        .bind(m.temperature)
        .bind(m.humidity)
        .bind(m.precipitation)
        .bind(m.wind_speed)
        .bind(m.wind_direction)
        .bind(m.pressure)
        .bind(m.battery_voltage)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query_range(
        &self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError> {
        // ---
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM readings
            WHERE station_id = $1 AND recorded_at >= $2 AND recorded_at <= $3
            ORDER BY recorded_at ASC, seq ASC
            "#
        );
        let rows: Vec<ReadingRow> = sqlx::query_as(&sql)
            .bind(station_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Reading::from).collect())
    }

    async fn latest_per_station(&self) -> Result<Vec<Reading>, StoreError> {
        // ---
        let sql = format!(
            r#"
            SELECT DISTINCT ON (station_id) {READING_COLUMNS}
            FROM readings
            ORDER BY station_id, recorded_at DESC, seq DESC
            "#
        );
        let rows: Vec<ReadingRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(Reading::from).collect())
    }

    async fn latest_for(&self, station_id: &str) -> Result<Option<Reading>, StoreError> {
        // ---
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM readings
            WHERE station_id = $1
            ORDER BY recorded_at DESC, seq DESC
            LIMIT 1
            "#
        );
        let row: Option<ReadingRow> = sqlx::query_as(&sql)
            .bind(station_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Reading::from))
    }

    async fn recent(&self, station_id: &str, limit: u32) -> Result<Vec<Reading>, StoreError> {
        // ---
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM readings
            WHERE station_id = $1
            ORDER BY recorded_at DESC, seq DESC
            LIMIT $2
            "#
        );
        let rows: Vec<ReadingRow> = sqlx::query_as(&sql)
            .bind(station_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        // newest-first from the query, oldest-first for charting
        Ok(rows.into_iter().rev().map(Reading::from).collect())
    }
}
