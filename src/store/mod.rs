//! Reading Store: durable, append-only collection of station readings.
//!
//! The rest of the crate only talks to [`ReadingStore`]; `main.rs` picks the
//! backend from [`StoreBackend`](crate::config::StoreBackend).
//!
//! Ordering contract shared by every backend:
//! - ranges and recent windows are ordered by `timestamp`, ties by insertion order;
//! - "latest" is the max-`timestamp` reading, ties won by the later insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Reading, StoreError};

mod memory;
mod postgres;

pub use memory::MemoryReadingStore;
pub use postgres::PgReadingStore;

// ---

#[async_trait]
pub trait ReadingStore: Send + Sync {
    // ---
    /// Persist one reading. Either the whole record is stored or nothing is.
    async fn append(&self, reading: &Reading) -> Result<(), StoreError>;

    /// Readings for `station_id` with `start <= timestamp <= end`, ascending.
    async fn query_range(
        &self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError>;

    /// The latest reading of every station ever ingested, ordered by station id.
    async fn latest_per_station(&self) -> Result<Vec<Reading>, StoreError>;

    /// The latest reading of one station, `None` if it has never reported.
    async fn latest_for(&self, station_id: &str) -> Result<Option<Reading>, StoreError>;

    /// The `limit` most recent readings of a station, returned oldest first.
    async fn recent(&self, station_id: &str, limit: u32) -> Result<Vec<Reading>, StoreError>;
}
