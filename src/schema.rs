//! Database schema management for `weatherflow`.
//!
//! Ensures the readings table and its indexes exist before serving requests.
//! Applied once on startup from `main.rs` when the postgres backend is selected.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the database schema (idempotent).
///
/// One flat `readings` table holds every station sample. `seq` records
/// insertion order and breaks timestamp ties; `id` is the identity handed
/// back to the station. Safe to call on every startup.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            seq             BIGSERIAL PRIMARY KEY,
            id              UUID             NOT NULL UNIQUE,
            station_id      TEXT             NOT NULL,
            location        TEXT,
            lat             DOUBLE PRECISION,
            lng             DOUBLE PRECISION,
            recorded_at     TIMESTAMPTZ      NOT NULL,
            received_at     TIMESTAMPTZ      NOT NULL,
            temperature     DOUBLE PRECISION,
            humidity        DOUBLE PRECISION,
            precipitation   DOUBLE PRECISION,
            wind_speed      DOUBLE PRECISION,
            wind_direction  DOUBLE PRECISION,
            pressure        DOUBLE PRECISION,
            battery_voltage DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Range scans and latest-per-station both walk this index
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_station_recorded
            ON readings (station_id, recorded_at, seq);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
